// Core domain: errors, envelopes, capabilities, resilience helpers

pub mod capabilities;
pub mod errors;
pub mod models;
pub mod resilience;
