// Request routing and model handlers

pub mod handlers;
pub mod router;
pub mod templates;
