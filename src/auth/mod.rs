// Authentication & authorization module

pub mod api_key;
pub mod audit_logger;
pub mod auth_middleware;
pub mod key_registry;
