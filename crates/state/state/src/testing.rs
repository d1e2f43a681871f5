use std::time::Duration;

use crate::error::StateError;
use crate::key::{KeyKind, StateKey};
use crate::store::{CasResult, StateStore};

const TEST_NAMESPACE: &str = "conformance";

fn test_key(kind: KeyKind, id: &str) -> StateKey {
    StateKey::new(TEST_NAMESPACE, kind, id)
}

/// Run the full state store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn StateStore) -> Result<(), StateError> {
    test_get_missing(store).await?;
    test_set_and_get(store).await?;
    test_check_and_set_new(store).await?;
    test_check_and_set_existing(store).await?;
    test_delete(store).await?;
    test_increment(store).await?;
    test_versions(store).await?;
    test_compare_and_swap(store).await?;
    test_compare_and_delete(store).await?;
    test_scan_keys(store).await?;
    test_ttl_set(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "missing");
    assert!(
        store.get(&key).await?.is_none(),
        "get on missing key should return None"
    );
    assert!(
        store.get_versioned(&key).await?.is_none(),
        "get_versioned on missing key should return None"
    );
    Ok(())
}

async fn test_set_and_get(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "set-get");
    store.set(&key, "hello", None).await?;
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("hello"));
    Ok(())
}

async fn test_check_and_set_new(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "create-new");
    let created = store.check_and_set(&key, "v1", None).await?;
    assert!(created, "check_and_set on new key should return true");
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"));
    Ok(())
}

async fn test_check_and_set_existing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "create-existing");
    store.set(&key, "v1", None).await?;
    let created = store.check_and_set(&key, "v2", None).await?;
    assert!(
        !created,
        "check_and_set on existing key should return false"
    );
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"), "original value should remain");
    Ok(())
}

async fn test_delete(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "to-delete");
    store.set(&key, "bye", None).await?;
    let existed = store.delete(&key).await?;
    assert!(existed, "delete should return true for existing key");
    assert!(
        store.get(&key).await?.is_none(),
        "get after delete should return None"
    );

    let existed = store.delete(&key).await?;
    assert!(!existed, "delete on missing key should return false");
    Ok(())
}

async fn test_increment(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::ShopCounter, "counter-1");
    let val = store.increment(&key, 1, None).await?;
    assert_eq!(val, 1, "first increment from zero should yield 1");

    let val = store.increment(&key, 5, None).await?;
    assert_eq!(val, 6, "second increment should accumulate");

    let val = store.increment(&key, -2, None).await?;
    assert_eq!(val, 4, "negative delta should decrement");
    Ok(())
}

async fn test_versions(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "versions");
    store.check_and_set(&key, "a", None).await?;
    let first = store
        .get_versioned(&key)
        .await?
        .ok_or_else(|| StateError::NotFound(key.canonical()))?;
    assert_eq!(first.version, 1, "created keys start at version 1");
    assert_eq!(first.value, "a");

    store.set(&key, "b", None).await?;
    let second = store
        .get_versioned(&key)
        .await?
        .ok_or_else(|| StateError::NotFound(key.canonical()))?;
    assert_eq!(second.version, 2, "set should bump the version");
    assert_eq!(second.value, "b");
    Ok(())
}

async fn test_compare_and_swap(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "cas-version");

    store.set(&key, "initial", None).await?;

    let result = store.compare_and_swap(&key, 999, "updated", None).await?;
    match result {
        CasResult::Conflict {
            current_value,
            current_version,
        } => {
            assert_eq!(current_value.as_deref(), Some("initial"));
            assert_eq!(current_version, 1);
        }
        CasResult::Ok => panic!("CAS with wrong version should conflict"),
    }

    let result = store.compare_and_swap(&key, 1, "updated", None).await?;
    assert_eq!(
        result,
        CasResult::Ok,
        "CAS with correct version should succeed"
    );

    // The version the first writer read is now stale.
    let result = store.compare_and_swap(&key, 1, "stale", None).await?;
    assert!(
        matches!(result, CasResult::Conflict { current_version: 2, .. }),
        "second writer with stale version should conflict"
    );

    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("updated"));

    let missing = test_key(KeyKind::Photo, "cas-missing");
    let result = store.compare_and_swap(&missing, 1, "x", None).await?;
    assert!(
        matches!(
            result,
            CasResult::Conflict {
                current_value: None,
                current_version: 0
            }
        ),
        "CAS on a missing key should conflict at version 0"
    );
    Ok(())
}

async fn test_compare_and_delete(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Photo, "cad");
    store.check_and_set(&key, "v1", None).await?;
    store.compare_and_swap(&key, 1, "v2", None).await?;

    let result = store.compare_and_delete(&key, 1).await?;
    assert!(
        matches!(result, CasResult::Conflict { current_version: 2, .. }),
        "delete with stale version should conflict"
    );
    assert!(store.get(&key).await?.is_some(), "record should survive");

    let result = store.compare_and_delete(&key, 2).await?;
    assert_eq!(result, CasResult::Ok);
    assert!(store.get(&key).await?.is_none(), "record should be gone");
    Ok(())
}

async fn test_scan_keys(store: &dyn StateStore) -> Result<(), StateError> {
    store
        .set(&test_key(KeyKind::DeletionRequest, "scan-a1"), "1", None)
        .await?;
    store
        .set(&test_key(KeyKind::DeletionRequest, "scan-a2"), "2", None)
        .await?;
    store
        .set(&test_key(KeyKind::DeletionRequest, "scan-b1"), "3", None)
        .await?;
    store
        .set(
            &StateKey::new("other-ns", KeyKind::DeletionRequest, "scan-a3"),
            "4",
            None,
        )
        .await?;

    let mut all = store
        .scan_keys(TEST_NAMESPACE, KeyKind::DeletionRequest, None)
        .await?;
    all.sort();
    assert_eq!(all.len(), 3, "scan should stay within namespace and kind");

    let prefixed = store
        .scan_keys(TEST_NAMESPACE, KeyKind::DeletionRequest, Some("scan-a"))
        .await?;
    assert_eq!(prefixed.len(), 2, "prefix should filter ids");
    assert!(
        prefixed
            .iter()
            .all(|(k, _)| k.starts_with("conformance:deletion_request:scan-a")),
        "scan should return canonical keys"
    );
    Ok(())
}

async fn test_ttl_set(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::RateLimit, "ttl-test");
    store
        .set(&key, "ephemeral", Some(Duration::from_secs(3600)))
        .await?;
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("ephemeral"));
    Ok(())
}
