use serde::{Deserialize, Serialize};

/// SMTP connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// SMTP server port. Defaults to 587 (STARTTLS submission port).
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Optional SMTP username for authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional SMTP password for authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Whether to use TLS for the SMTP connection. Defaults to `true`.
    #[serde(default = "default_tls")]
    pub tls: bool,

    /// Per-message send timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tls", &self.tls)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            tls: default_tls(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Email notification settings.
///
/// When `enabled` is false, or the backend is `"log"`, messages are written
/// to the log instead of being delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Whether to deliver email at all.
    #[serde(default)]
    pub enabled: bool,

    /// Backend selection: `"smtp"` or `"log"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// The `From` header for outgoing mail.
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// The `Reply-To` header for outgoing mail.
    #[serde(default = "default_reply_to")]
    pub reply_to: Option<String>,

    /// Recipient of moderation alerts.
    #[serde(default = "default_admin_address")]
    pub admin_address: String,

    /// Public base URL used to build links in messages.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_backend(),
            from_address: default_from_address(),
            reply_to: default_reply_to(),
            admin_address: default_admin_address(),
            site_url: default_site_url(),
            smtp: SmtpConfig::default(),
        }
    }
}

fn default_backend() -> String {
    "log".to_owned()
}

fn default_from_address() -> String {
    "Farm Companion <photos@farmcompanion.co.uk>".to_owned()
}

#[allow(clippy::unnecessary_wraps)]
fn default_reply_to() -> Option<String> {
    Some("hello@farmcompanion.co.uk".to_owned())
}

fn default_admin_address() -> String {
    "admin@farmcompanion.co.uk".to_owned()
}

fn default_site_url() -> String {
    "https://www.farmcompanion.co.uk".to_owned()
}

fn default_smtp_host() -> String {
    "localhost".to_owned()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_tls() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_directory_addresses() {
        let config = EmailConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.backend, "log");
        assert_eq!(
            config.from_address,
            "Farm Companion <photos@farmcompanion.co.uk>"
        );
        assert_eq!(config.reply_to.as_deref(), Some("hello@farmcompanion.co.uk"));
        assert_eq!(config.smtp.smtp_port, 587);
    }

    #[test]
    fn deserialize_partial() {
        let config: EmailConfig = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "backend": "smtp",
            "smtp": { "smtp_host": "mail.example.com", "password": "hunter2" }
        }))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.smtp.smtp_host, "mail.example.com");
        assert!(config.smtp.tls);
        assert_eq!(config.admin_address, "admin@farmcompanion.co.uk");
    }

    #[test]
    fn debug_redacts_password() {
        let config = SmtpConfig {
            password: Some("hunter2".into()),
            ..SmtpConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
