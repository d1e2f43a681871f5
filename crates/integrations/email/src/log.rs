use async_trait::async_trait;
use tracing::info;

use crate::backend::{EmailBackend, EmailMessage, EmailResult};
use crate::error::EmailError;

/// Backend used when email delivery is not configured.
///
/// Messages are logged and reported as skipped, which counts as success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBackend;

#[async_trait]
impl EmailBackend for LogBackend {
    async fn send(&self, message: &EmailMessage) -> Result<EmailResult, EmailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email delivery not configured; skipping send"
        );
        Ok(EmailResult {
            message_id: None,
            status: "skipped".to_owned(),
        })
    }

    async fn health_check(&self) -> Result<(), EmailError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_is_skipped() {
        let msg = EmailMessage {
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            subject: "hi".into(),
            body: None,
            html_body: None,
            reply_to: None,
        };
        let result = LogBackend.send(&msg).await.unwrap();
        assert_eq!(result.status, "skipped");
        assert!(LogBackend.health_check().await.is_ok());
    }
}
