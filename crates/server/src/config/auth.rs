use serde::Deserialize;

/// Admin authentication configuration.
#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    /// When disabled every caller is treated as an anonymous admin. Only
    /// suitable for local development.
    #[serde(default)]
    pub enabled: bool,
    /// Accepted API keys.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

/// An API key principal that authenticates via `X-API-Key` or a bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyConfig {
    pub name: String,
    /// Lowercase hex SHA-256 of the raw key. Produce one with
    /// `farmgate-server hash-key`.
    pub key_hash: String,
}
