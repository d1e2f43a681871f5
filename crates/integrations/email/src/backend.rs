use async_trait::async_trait;

use crate::error::EmailError;

/// A unified email message representation shared across all backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Sender address, optionally with a display name.
    pub from: String,
    /// Recipient email address.
    pub to: String,
    /// Email subject line.
    pub subject: String,
    /// Optional plain-text body.
    pub body: Option<String>,
    /// Optional HTML body.
    pub html_body: Option<String>,
    /// Optional reply-to address.
    pub reply_to: Option<String>,
}

/// Result of a successful email send operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailResult {
    /// Provider-assigned message identifier (if available).
    pub message_id: Option<String>,
    /// Human-readable status (e.g. `"sent"`, `"skipped"`).
    pub status: String,
}

/// Trait for pluggable email delivery backends.
#[async_trait]
pub trait EmailBackend: Send + Sync + std::fmt::Debug {
    /// Send an email message through this backend.
    async fn send(&self, message: &EmailMessage) -> Result<EmailResult, EmailError>;

    /// Perform a health check to verify the backend is operational.
    async fn health_check(&self) -> Result<(), EmailError>;

    /// Return the backend name (e.g. `"smtp"`, `"log"`).
    fn backend_name(&self) -> &'static str;
}
