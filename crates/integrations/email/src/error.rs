use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while rendering or delivering an email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// The backend rejected the message and retrying will not help.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// The backend did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend was given invalid configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The mail server asked us to slow down.
    #[error("rate limited")]
    RateLimited,

    /// A template failed to render.
    #[error("template error: {0}")]
    Template(String),
}

impl EmailError {
    /// Returns `true` if the error is transient and the send may succeed
    /// on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(EmailError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(EmailError::Connection("reset".into()).is_retryable());
        assert!(EmailError::RateLimited.is_retryable());
    }

    #[test]
    fn non_retryable_errors() {
        assert!(!EmailError::DeliveryFailed("550".into()).is_retryable());
        assert!(!EmailError::Configuration("x".into()).is_retryable());
        assert!(!EmailError::Template("x".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = EmailError::Timeout(Duration::from_millis(500));
        assert_eq!(err.to_string(), "timeout after 500ms");
        assert_eq!(EmailError::RateLimited.to_string(), "rate limited");
    }
}
