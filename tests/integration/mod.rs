// Integration tests organized by surface

#[path = "../common/mod.rs"]
mod common;

pub mod key_file;
pub mod rate_limit;
