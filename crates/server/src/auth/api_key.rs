use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::identity::CallerIdentity;
use crate::config::ApiKeyConfig;

/// An entry in the API key lookup table.
#[derive(Debug, Clone)]
pub struct ApiKeyEntry {
    pub name: String,
    /// Lowercase hex SHA-256 of the raw key.
    pub key_hash: String,
}

/// Build the lookup table from configuration, rejecting malformed hashes.
pub fn build_api_key_table(configs: &[ApiKeyConfig]) -> Result<Vec<ApiKeyEntry>, String> {
    configs
        .iter()
        .map(|cfg| {
            let hash = cfg.key_hash.trim().to_ascii_lowercase();
            if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!(
                    "API key '{}' must be a 64 character hex SHA-256 hash",
                    cfg.name
                ));
            }
            Ok(ApiKeyEntry {
                name: cfg.name.clone(),
                key_hash: hash,
            })
        })
        .collect()
}

/// Hash a raw API key to the lookup format (lowercase hex SHA-256).
pub fn hash_api_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Look up an API key and return a `CallerIdentity` if found.
///
/// Every entry is compared in constant time.
pub fn authenticate_api_key(raw_key: &str, table: &[ApiKeyEntry]) -> Option<CallerIdentity> {
    let hash = hash_api_key(raw_key);
    let mut found = None;
    for entry in table {
        if bool::from(entry.key_hash.as_bytes().ct_eq(hash.as_bytes())) {
            found = Some(entry);
        }
    }
    found.map(|entry| CallerIdentity {
        id: entry.name.clone(),
        auth_method: "api_key".to_owned(),
    })
}
