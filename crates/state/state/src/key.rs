use serde::{Deserialize, Serialize};

/// The kind of record being stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// A photo submission record.
    Photo,
    /// A deletion request record.
    DeletionRequest,
    /// Per-shop photo counter.
    ShopCounter,
    /// Fixed-window rate limit counter.
    RateLimit,
}

impl KeyKind {
    /// Return a string representation of the key kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Photo => "photo",
            Self::DeletionRequest => "deletion_request",
            Self::ShopCounter => "shop_counter",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used to address records in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub namespace: String,
    pub kind: KeyKind,
    pub id: String,
}

impl StateKey {
    /// Create a new state key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, kind: KeyKind, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            id: id.into(),
        }
    }

    /// Return a canonical string representation: `namespace:kind:id`
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.kind, self.id)
    }

    /// Canonical prefix shared by every key of `kind` in `namespace`.
    #[must_use]
    pub fn kind_prefix(namespace: &str, kind: &KeyKind) -> String {
        format!("{namespace}:{kind}:")
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form() {
        let key = StateKey::new("farmgate", KeyKind::Photo, "photo_1");
        assert_eq!(key.canonical(), "farmgate:photo:photo_1");
        assert_eq!(key.to_string(), key.canonical());
    }

    #[test]
    fn kind_prefix_matches_canonical() {
        let key = StateKey::new("farmgate", KeyKind::ShopCounter, "hill-farm");
        let prefix = StateKey::kind_prefix("farmgate", &KeyKind::ShopCounter);
        assert!(key.canonical().starts_with(&prefix));
    }
}
