use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error, info};

use crate::backend::{EmailBackend, EmailMessage, EmailResult};
use crate::config::SmtpConfig;
use crate::error::EmailError;

/// SMTP email delivery backend using `lettre`.
pub struct SmtpBackend {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpBackend")
            .field("config", &self.config)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl SmtpBackend {
    /// Create a new `SmtpBackend` from the given SMTP configuration.
    pub fn new(config: SmtpConfig) -> Result<Self, EmailError> {
        let transport = build_transport(&config)?;
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl EmailBackend for SmtpBackend {
    async fn send(&self, message: &EmailMessage) -> Result<EmailResult, EmailError> {
        debug!(to = %message.to, subject = %message.subject, "building SMTP message");
        let lettre_message = build_message(message)?;

        let response = self.transport.send(lettre_message).await.map_err(|e| {
            error!(error = %e, "SMTP send failed");
            map_smtp_error(&e)
        })?;

        info!(to = %message.to, subject = %message.subject, "email sent via SMTP");
        Ok(EmailResult {
            message_id: response.message().next().map(str::to_owned),
            status: "sent".to_owned(),
        })
    }

    async fn health_check(&self) -> Result<(), EmailError> {
        self.transport.test_connection().await.map_err(|e| {
            error!(error = %e, "SMTP health check failed");
            EmailError::Connection(format!("SMTP health check failed: {e}"))
        })?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "smtp"
    }
}

/// Build a `lettre::Message` from the unified [`EmailMessage`].
fn build_message(msg: &EmailMessage) -> Result<Message, EmailError> {
    let from_mailbox: Mailbox = msg
        .from
        .parse()
        .map_err(|e| EmailError::Configuration(format!("invalid from address: {e}")))?;

    let to_mailbox: Mailbox = msg
        .to
        .parse()
        .map_err(|e| EmailError::DeliveryFailed(format!("invalid recipient address: {e}")))?;

    let mut builder = Message::builder()
        .from(from_mailbox)
        .to(to_mailbox)
        .subject(&msg.subject);

    if let Some(ref reply_to) = msg.reply_to {
        let reply_mailbox: Mailbox = reply_to
            .parse()
            .map_err(|e| EmailError::Configuration(format!("invalid reply-to address: {e}")))?;
        builder = builder.reply_to(reply_mailbox);
    }

    let built = match (&msg.body, &msg.html_body) {
        (Some(text), Some(html)) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                ),
        ),
        (Some(text), None) => builder.body(text.clone()),
        (None, Some(html)) => builder.singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(html.clone()),
        ),
        (None, None) => builder.body(String::new()),
    };

    built.map_err(|e| EmailError::DeliveryFailed(format!("failed to build email: {e}")))
}

/// Build an async SMTP transport from the given configuration.
fn build_transport(
    config: &SmtpConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
    let builder = if config.tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| EmailError::Configuration(format!("SMTP TLS relay error: {e}")))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    };

    let builder = builder
        .port(config.smtp_port)
        .timeout(Some(Duration::from_secs(config.timeout_seconds)));

    let builder = if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder.credentials(Credentials::new(user.clone(), pass.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

/// Map a lettre SMTP error to the matching [`EmailError`] variant.
fn map_smtp_error(error: &lettre::transport::smtp::Error) -> EmailError {
    let message = error.to_string();

    if error.is_timeout() {
        EmailError::Connection(format!("SMTP timeout: {message}"))
    } else if error.is_transient() {
        EmailError::Connection(format!("transient SMTP error: {message}"))
    } else if error.is_permanent() {
        EmailError::DeliveryFailed(format!("permanent SMTP error: {message}"))
    } else {
        EmailError::Connection(format!("SMTP error: {message}"))
    }
}
