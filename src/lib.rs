// Library root for the MCP gateway

pub mod api;
pub mod auth;
pub mod config;
pub mod core;
pub mod engine;
pub mod metrics;
pub mod state;
pub mod utils;
