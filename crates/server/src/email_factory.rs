use std::sync::Arc;

use farmgate_email::{EmailBackend, EmailConfig, LogBackend, SmtpBackend};
use tracing::{info, warn};

use crate::error::ServerError;

/// Create the email backend from the given configuration.
///
/// Disabled email falls back to the log backend so notifications remain
/// visible during development.
pub fn create_email_backend(config: &EmailConfig) -> Result<Arc<dyn EmailBackend>, ServerError> {
    if !config.enabled {
        warn!("email disabled, notifications will only be logged");
        return Ok(Arc::new(LogBackend));
    }
    let backend: Arc<dyn EmailBackend> = match config.backend.as_str() {
        "log" => Arc::new(LogBackend),
        "smtp" => {
            let smtp = SmtpBackend::new(config.smtp.clone())
                .map_err(|e| ServerError::Config(format!("smtp: {e}")))?;
            info!(host = %config.smtp.smtp_host, port = config.smtp.smtp_port, "smtp email backend configured");
            Arc::new(smtp)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported email backend: {other}"
            )));
        }
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_email_logs() {
        let backend = create_email_backend(&EmailConfig::default()).unwrap();
        assert_eq!(backend.backend_name(), "log");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let config = EmailConfig {
            enabled: true,
            backend: "carrier-pigeon".into(),
            ..EmailConfig::default()
        };
        assert!(matches!(
            create_email_backend(&config),
            Err(ServerError::Config(_))
        ));
    }
}
