use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;

use farmgate_state::error::StateError;
use farmgate_state::key::{KeyKind, StateKey};
use farmgate_state::store::{CasResult, StateStore, Versioned};

/// A single entry in the in-memory store.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    version: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_owned(),
            version: 1,
            expires_at: expiry_from_ttl(ttl),
        }
    }

    /// Returns `true` if this entry has passed its TTL deadline.
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn conflict(&self) -> CasResult {
        CasResult::Conflict {
            current_value: Some(self.value.clone()),
            current_version: self.version,
        }
    }
}

fn expiry_from_ttl(ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|d| Instant::now() + d)
}

const MISSING: CasResult = CasResult::Conflict {
    current_value: None,
    current_version: 0,
};

/// In-memory [`StateStore`] backed by a [`DashMap`].
///
/// Entries are lazily evicted on access when their TTL has elapsed. Every
/// mutation goes through the map's entry API so each key is updated under
/// its shard lock.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    data: DashMap<String, Entry>,
}

impl MemoryStateStore {
    /// Create a new, empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries. Expired entries not yet evicted are excluded.
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_expired(&self, rendered: &str) {
        self.data.remove_if(rendered, |_, entry| entry.is_expired());
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let inserted = match self.data.entry(key.canonical()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(Entry::new(value, ttl));
                    true
                } else {
                    false
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::new(value, ttl));
                true
            }
        };
        Ok(inserted)
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        Ok(self.get_versioned(key).await?.map(|v| v.value))
    }

    async fn get_versioned(&self, key: &StateKey) -> Result<Option<Versioned>, StateError> {
        let rendered = key.canonical();

        if let Some(entry) = self.data.get(&rendered) {
            if entry.is_expired() {
                drop(entry);
                self.evict_expired(&rendered);
                return Ok(None);
            }
            return Ok(Some(Versioned {
                value: entry.value.clone(),
                version: entry.version,
            }));
        }

        Ok(None)
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let rendered = key.canonical();
        self.evict_expired(&rendered);
        let expires_at = expiry_from_ttl(ttl);

        self.data
            .entry(rendered)
            .and_modify(|entry| {
                value.clone_into(&mut entry.value);
                entry.version += 1;
                entry.expires_at = expires_at;
            })
            .or_insert_with(|| Entry::new(value, ttl));

        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        // Expired entries count as missing.
        match self.data.remove(&key.canonical()) {
            Some((_, entry)) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn compare_and_delete(
        &self,
        key: &StateKey,
        expected_version: u64,
    ) -> Result<CasResult, StateError> {
        let rendered = key.canonical();
        self.evict_expired(&rendered);

        match self.data.entry(rendered) {
            MapEntry::Occupied(occupied) => {
                if occupied.get().version == expected_version {
                    occupied.remove();
                    Ok(CasResult::Ok)
                } else {
                    Ok(occupied.get().conflict())
                }
            }
            MapEntry::Vacant(_) => Ok(MISSING),
        }
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let rendered = key.canonical();
        // The counter restarts from zero once its window has expired.
        self.evict_expired(&rendered);

        let mut entry = self
            .data
            .entry(rendered)
            .or_insert_with(|| Entry::new("0", ttl));

        let current: i64 = entry
            .value
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                StateError::Serialization(format!("counter value is not an integer: {e}"))
            })?;

        let new_value = current + delta;
        entry.value = new_value.to_string();
        entry.version += 1;

        Ok(new_value)
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let rendered = key.canonical();
        self.evict_expired(&rendered);

        let Some(mut entry) = self.data.get_mut(&rendered) else {
            return Ok(MISSING);
        };

        if entry.version != expected_version {
            return Ok(entry.conflict());
        }

        new_value.clone_into(&mut entry.value);
        entry.version += 1;
        entry.expires_at = expiry_from_ttl(ttl).or(entry.expires_at);

        Ok(CasResult::Ok)
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        kind: KeyKind,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, String)>, StateError> {
        let mut key_prefix = StateKey::kind_prefix(namespace, &kind);
        if let Some(p) = prefix {
            key_prefix.push_str(p);
        }

        Ok(self
            .data
            .iter()
            .filter(|e| e.key().starts_with(&key_prefix) && !e.value().is_expired())
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use farmgate_state::key::{KeyKind, StateKey};
    use farmgate_state::testing::run_store_conformance_tests;

    use super::*;

    fn test_key(kind: KeyKind, id: &str) -> StateKey {
        StateKey::new("test-ns", kind, id)
    }

    #[tokio::test]
    async fn conformance() {
        let store = MemoryStateStore::new();
        run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_via_get() {
        let store = MemoryStateStore::new();
        let key = test_key(KeyKind::RateLimit, "ttl-expire");

        store
            .set(&key, "short-lived", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        let val = store.get(&key).await.unwrap();
        assert_eq!(val.as_deref(), Some("short-lived"));

        tokio::time::advance(Duration::from_secs(6)).await;

        let val = store.get(&key).await.unwrap();
        assert!(val.is_none(), "value should be expired");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_check_and_set_after_expiry() {
        let store = MemoryStateStore::new();
        let key = test_key(KeyKind::RateLimit, "ttl-create");

        let created = store
            .check_and_set(&key, "v1", Some(Duration::from_secs(3)))
            .await
            .unwrap();
        assert!(created);

        let created = store.check_and_set(&key, "v2", None).await.unwrap();
        assert!(!created);

        tokio::time::advance(Duration::from_secs(4)).await;

        let created = store.check_and_set(&key, "v2", None).await.unwrap();
        assert!(created, "should re-create after expiry");

        let val = store.get(&key).await.unwrap();
        assert_eq!(val.as_deref(), Some("v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_increment_resets_after_expiry() {
        let store = MemoryStateStore::new();
        let key = test_key(KeyKind::RateLimit, "ttl-counter");

        store
            .increment(&key, 10, Some(Duration::from_secs(2)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;

        let val = store.increment(&key, 1, None).await.unwrap();
        assert_eq!(val, 1, "counter should reset after TTL expiry");
    }

    #[tokio::test(start_paused = true)]
    async fn scan_skips_expired() {
        let store = MemoryStateStore::new();
        store
            .set(
                &test_key(KeyKind::RateLimit, "a"),
                "1",
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap();
        store
            .set(&test_key(KeyKind::RateLimit, "b"), "2", None)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        let keys = store
            .scan_keys("test-ns", KeyKind::RateLimit, None)
            .await
            .unwrap();
        assert_eq!(keys, vec![("test-ns:rate_limit:b".to_owned(), "2".to_owned())]);
    }

    #[tokio::test]
    async fn concurrent_cas_has_one_winner() {
        let store = Arc::new(MemoryStateStore::new());
        let key = test_key(KeyKind::Photo, "contended");
        store.check_and_set(&key, "v0", None).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_swap(&key, 1, &format!("writer-{i}"), None)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == CasResult::Ok {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.get_versioned(&key).await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn delete_returns_false_for_missing() {
        let store = MemoryStateStore::new();
        let key = test_key(KeyKind::Photo, "never-set");
        let existed = store.delete(&key).await.unwrap();
        assert!(!existed);
        assert!(store.is_empty());
    }
}
