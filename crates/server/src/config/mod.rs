mod auth;
mod background;
mod blob;
mod logging;
mod server;
mod state;


pub use auth::*;
pub use background::*;
pub use blob::*;
pub use logging::*;
pub use server::*;
pub use state::*;

use std::path::Path;

use serde::Deserialize;

use farmgate_email::EmailConfig;
use farmgate_moderation::{ModerationConfig, NotificationConfig};

use crate::error::ServerError;

/// Environment variable overriding `[email.smtp] password`.
pub const SMTP_PASSWORD_ENV: &str = "FARMGATE_SMTP_PASSWORD";

/// Environment variable overriding `[email] admin_address`.
pub const ADMIN_EMAIL_ENV: &str = "FARMGATE_ADMIN_EMAIL";

/// Top-level configuration for the farmgate server, loaded from a TOML file.
///
/// Every section has defaults, so an empty file yields an in-memory
/// development server.
#[derive(Debug, Default, Deserialize)]
pub struct FarmgateConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// State backend configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Image storage configuration.
    #[serde(default)]
    pub blob: BlobConfig,
    /// Email delivery configuration.
    #[serde(default)]
    pub email: EmailConfig,
    /// Workflow limits and timings.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Notification retry policy.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Background task configuration.
    #[serde(default)]
    pub background: BackgroundProcessingConfig,
    /// Admin authentication.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FarmgateConfig {
    /// Parse a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, ServerError> {
        toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load configuration from `path`, or defaults when the file is absent.
    ///
    /// Environment overrides are applied in both cases.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply secret overrides from the environment.
    ///
    /// `lookup` is injected so tests do not have to touch the process
    /// environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(SMTP_PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.email.smtp.password = Some(password);
        }
        if let Some(admin) = lookup(ADMIN_EMAIL_ENV).filter(|v| !v.is_empty()) {
            self.email.admin_address = admin;
        }
    }
}
