pub mod api_key;
pub mod identity;
pub mod middleware;

use tracing::info;

use self::api_key::{ApiKeyEntry, authenticate_api_key, build_api_key_table};
use self::identity::CallerIdentity;
use crate::config::AuthConfig;

/// API-key authenticator built once at startup from `[auth]`.
#[derive(Debug)]
pub struct AuthProvider {
    api_keys: Vec<ApiKeyEntry>,
}

impl AuthProvider {
    /// Build the provider. Returns `Ok(None)` when auth is disabled.
    pub fn from_config(config: &AuthConfig) -> Result<Option<Self>, String> {
        if !config.enabled {
            return Ok(None);
        }
        if config.api_keys.is_empty() {
            return Err("auth is enabled but no [[auth.api_keys]] are configured".into());
        }
        let api_keys = build_api_key_table(&config.api_keys)?;
        info!(api_keys = api_keys.len(), "admin API keys loaded");
        Ok(Some(Self { api_keys }))
    }

    /// Authenticate an API key and return the caller identity.
    pub fn authenticate_api_key(&self, raw_key: &str) -> Option<CallerIdentity> {
        authenticate_api_key(raw_key, &self.api_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKeyConfig;

    #[test]
    fn disabled_auth_builds_nothing() {
        assert!(AuthProvider::from_config(&AuthConfig::default()).unwrap().is_none());
    }

    #[test]
    fn enabled_auth_requires_keys() {
        let config = AuthConfig {
            enabled: true,
            api_keys: Vec::new(),
        };
        assert!(AuthProvider::from_config(&config).is_err());
    }

    #[test]
    fn enabled_auth_checks_keys() {
        let config = AuthConfig {
            enabled: true,
            api_keys: vec![ApiKeyConfig {
                name: "moderator".into(),
                key_hash: api_key::hash_api_key("letmein"),
            }],
        };
        let provider = AuthProvider::from_config(&config).unwrap().unwrap();
        assert_eq!(
            provider.authenticate_api_key("letmein").unwrap().id,
            "moderator"
        );
        assert!(provider.authenticate_api_key("nope").is_none());
    }
}
