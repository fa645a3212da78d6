// Unit tests organized by module

#[path = "../common/mod.rs"]
mod common;

pub mod config;
pub mod engine;
pub mod state;
