// Security event logging

use tracing::{info, warn};

/// Authentication event type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    AuthSuccess,
    AuthFailure { reason: String },
    PermissionDenied { permission: String },
}

/// Audit logger for security events
///
/// Events go to the structured log only; the key is identified by its
/// obfuscated preview, never the raw value.
#[derive(Debug, Default, Clone)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    /// Log an authentication event
    pub fn log_auth_event(
        &self,
        event: &AuthEvent,
        key_preview: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) {
        match event {
            AuthEvent::AuthSuccess => {
                info!(
                    key_preview = ?key_preview,
                    ip_address = ?ip_address,
                    user_agent = ?user_agent,
                    "Authentication successful"
                );
            }
            AuthEvent::AuthFailure { reason } => {
                warn!(
                    key_preview = ?key_preview,
                    ip_address = ?ip_address,
                    user_agent = ?user_agent,
                    reason = %reason,
                    "Authentication failed"
                );
            }
            AuthEvent::PermissionDenied { permission } => {
                warn!(
                    key_preview = ?key_preview,
                    ip_address = ?ip_address,
                    permission = %permission,
                    "Permission denied"
                );
            }
        }
    }
}
