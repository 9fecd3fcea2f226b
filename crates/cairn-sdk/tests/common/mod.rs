#![allow(dead_code)]

use std::fs;
use std::sync::Once;

use cairn_sdk::{Address, Bundle, SnapshotStore, StoreConfig};
use serde_json::json;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Route library logs to the test harness output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A fresh store in a temporary directory. Keep the `TempDir` alive for the
/// duration of the test.
pub fn new_store() -> (TempDir, SnapshotStore) {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let config = StoreConfig {
        fsync: false,
        ..StoreConfig::default()
    };
    let store = SnapshotStore::init(dir.path().join("store"), config).expect("init store");
    (dir, store)
}

pub fn bundle(store: &SnapshotStore, seq: u64) -> Address {
    store
        .put_bundle(&Bundle::new(json!({ "sequence": seq })))
        .expect("put bundle")
}

/// Overwrite an object file in place, keeping its name.
pub fn damage(store: &SnapshotStore, address: &Address, bytes: &[u8]) {
    let path = store.objects().layout().object_path(address);
    fs::write(path, bytes).expect("overwrite object file");
}
