// Wall clock helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, fractional
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
