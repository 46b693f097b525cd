// tests/store_tests.rs

use gitvault_core::store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, normalize_service};

const KEY: [u8; 32] = [42u8; 32];

#[test]
fn normalize_trims_trailing_slashes() {
    assert_eq!(normalize_service("https://github.com/"), "https://github.com");
    assert_eq!(normalize_service("https://github.com"), "https://github.com");
}

#[test]
fn memory_store_double_store_is_idempotent() {
    let store = MemoryCredentialStore::new();
    store
        .add_or_update("https://example.com", "jsquire", "first")
        .unwrap();
    store
        .add_or_update("https://example.com", "jsquire", "second")
        .unwrap();

    assert_eq!(store.len(), 1);
    let cred = store
        .get("https://example.com", Some("jsquire"))
        .unwrap()
        .unwrap();
    assert_eq!(cred.secret, "second");
}

#[test]
fn file_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store =
        FileCredentialStore::new(dir.path().join("credentials.dat"), &KEY).unwrap();

    store
        .add_or_update("https://example.com", "jsquire", "hunter2")
        .unwrap();

    let cred = store
        .get("https://example.com", Some("jsquire"))
        .unwrap()
        .unwrap();
    assert_eq!(cred.account, "jsquire");
    assert_eq!(cred.secret, "hunter2");
}

#[test]
fn file_store_does_not_persist_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.dat");
    let store = FileCredentialStore::new(path.clone(), &KEY).unwrap();

    store
        .add_or_update("https://example.com", "jsquire", "hunter2")
        .unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("hunter2"));
    assert!(raw.contains("jsquire"));
}

#[test]
fn file_store_double_store_keeps_one_entry_with_latest_secret() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.dat");
    let store = FileCredentialStore::new(path.clone(), &KEY).unwrap();

    store
        .add_or_update("https://example.com", "jsquire", "first")
        .unwrap();
    store
        .add_or_update("https://example.com", "jsquire", "second")
        .unwrap();

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(entries.len(), 1);

    let cred = store
        .get("https://example.com", Some("jsquire"))
        .unwrap()
        .unwrap();
    assert_eq!(cred.secret, "second");
}

#[test]
fn file_store_is_shared_across_instances() {
    // The helper is re-invoked fresh per Git operation; two instances over
    // the same path model two process invocations.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.dat");

    let writer = FileCredentialStore::new(path.clone(), &KEY).unwrap();
    writer
        .add_or_update("https://example.com", "jsquire", "hunter2")
        .unwrap();

    let reader = FileCredentialStore::new(path.clone(), &KEY).unwrap();
    let cred = reader
        .get("https://example.com", Some("jsquire"))
        .unwrap()
        .unwrap();
    assert_eq!(cred.secret, "hunter2");

    // An erase from one instance is visible to the other.
    assert!(reader.remove("https://example.com", Some("jsquire")).unwrap());
    assert!(
        writer
            .get("https://example.com", Some("jsquire"))
            .unwrap()
            .is_none()
    );
}

#[test]
fn file_store_get_without_account() {
    let dir = tempfile::tempdir().unwrap();
    let store =
        FileCredentialStore::new(dir.path().join("credentials.dat"), &KEY).unwrap();

    assert!(store.get("https://example.com", None).unwrap().is_none());

    store
        .add_or_update("https://example.com", "jsquire", "hunter2")
        .unwrap();
    let cred = store.get("https://example.com", None).unwrap().unwrap();
    assert_eq!(cred.account, "jsquire");
}

#[test]
fn file_store_remove_missing_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let store =
        FileCredentialStore::new(dir.path().join("credentials.dat"), &KEY).unwrap();
    assert!(!store.remove("https://example.com", Some("nobody")).unwrap());
}

#[test]
fn file_store_wrong_key_fails_to_decrypt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.dat");

    let store = FileCredentialStore::new(path.clone(), &KEY).unwrap();
    store
        .add_or_update("https://example.com", "jsquire", "hunter2")
        .unwrap();

    let other = FileCredentialStore::new(path, &[7u8; 32]).unwrap();
    assert!(other.get("https://example.com", Some("jsquire")).is_err());
}
