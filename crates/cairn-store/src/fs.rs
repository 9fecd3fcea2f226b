//! Filesystem object store.
//!
//! Objects live at `objects/<first-byte-hex>/<address-hex>`; file content is
//! exactly the object's canonical bytes. Writes go through a temporary file
//! and an atomic rename, so external readers and writers sharing the root
//! never see a partial object.

use std::fs::{self, ReadDir};
use std::io::ErrorKind;
use std::path::PathBuf;

use cairn_crypto::ContentHasher;
use cairn_types::Address;
use tracing::{debug, warn};

use crate::config::{SnapshotPolicy, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::layout::{atomic_write, is_temp_name, StoreLayout};
use crate::traits::{AddressIter, ObjectStore};

/// Object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    layout: StoreLayout,
    hasher: ContentHasher,
    policy: SnapshotPolicy,
    fsync: bool,
}

impl FsObjectStore {
    /// Object store over an already-initialized layout.
    pub fn new(layout: StoreLayout, config: &StoreConfig) -> Self {
        Self {
            layout,
            hasher: ContentHasher::new(config.hash_algorithm),
            policy: config.snapshot_policy,
            fsync: config.fsync,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Size in bytes of a stored object file, without verifying it.
    pub fn stored_size(&self, address: &Address) -> StoreResult<u64> {
        let path = self.layout.object_path(address);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(*address)),
            Err(e) => Err(StoreError::io("stat", path, e)),
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    fn put_at(&self, address: &Address, bytes: &[u8]) -> StoreResult<()> {
        let actual = self.hasher.hash(bytes);
        if actual != *address {
            return Err(StoreError::AddressMismatch {
                claimed: *address,
                actual,
            });
        }

        let path = self.layout.object_path(address);
        match fs::read(&path) {
            Ok(existing) if existing == bytes => {
                debug!(address = %address.short_hex(), "object already stored");
                return Ok(());
            }
            Ok(_) => {
                warn!(address = %address.short_hex(), "existing object differs from new content");
                return Err(StoreError::ContentMismatch { address: *address });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io("read", path, e)),
        }

        let shard = self.layout.shard_dir(address);
        fs::create_dir_all(&shard).map_err(|e| StoreError::io("create_dir", &shard, e))?;
        atomic_write(&shard, &path, bytes, self.fsync)
            .map_err(|e| StoreError::io("write", &path, e))?;
        debug!(address = %address.short_hex(), size = bytes.len(), "wrote object");
        Ok(())
    }

    fn get(&self, address: &Address) -> StoreResult<Vec<u8>> {
        let path = self.layout.object_path(address);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*address))
            }
            Err(e) => return Err(StoreError::io("read", path, e)),
        };
        let actual = self.hasher.hash(&bytes);
        if actual != *address {
            return Err(StoreError::Corrupted {
                address: *address,
                actual,
            });
        }
        Ok(bytes)
    }

    fn exists(&self, address: &Address) -> StoreResult<bool> {
        let path = self.layout.object_path(address);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("stat", path, e)),
        }
    }

    fn list(&self) -> StoreResult<AddressIter<'_>> {
        let objects = self.layout.objects_dir();
        let shards = match fs::read_dir(&objects) {
            Ok(shards) => Some(shards),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::io("list", objects, e)),
        };
        Ok(Box::new(ObjectIter {
            shards,
            current: None,
        }))
    }

    fn delete(&self, address: &Address) -> StoreResult<bool> {
        let path = self.layout.object_path(address);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(address = %address.short_hex(), "deleted object");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("delete", path, e)),
        }
    }

    fn snapshot_policy(&self) -> SnapshotPolicy {
        self.policy
    }
}

/// Walks shard directories one at a time.
struct ObjectIter {
    shards: Option<ReadDir>,
    current: Option<(String, PathBuf, ReadDir)>,
}

impl ObjectIter {
    /// Advance to the next shard directory, skipping anything else.
    fn next_shard(&mut self) -> Option<StoreResult<()>> {
        let shards = self.shards.as_mut()?;
        loop {
            let entry = match shards.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(StoreError::io("list", PathBuf::from("objects"), e))),
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if !is_shard_name(&name) || !path.is_dir() {
                if !is_temp_name(&name) {
                    warn!(path = %path.display(), "skipping stray entry in objects directory");
                }
                continue;
            }
            return match fs::read_dir(&path) {
                Ok(dir) => {
                    self.current = Some((name, path, dir));
                    Some(Ok(()))
                }
                // Removed concurrently.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => Some(Err(StoreError::io("list", path, e))),
            };
        }
    }
}

impl Iterator for ObjectIter {
    type Item = StoreResult<Address>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((shard, shard_path, dir)) = self.current.as_mut() {
                match dir.next() {
                    Some(Ok(entry)) => {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        if is_temp_name(&name) {
                            continue;
                        }
                        match Address::from_hex(&name) {
                            Ok(address) if address.shard() == *shard => return Some(Ok(address)),
                            _ => {
                                warn!(path = %entry.path().display(), "skipping stray file in object shard");
                                continue;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let path = shard_path.clone();
                        self.current = None;
                        return Some(Err(StoreError::io("list", path, e)));
                    }
                    None => self.current = None,
                }
            }
            match self.next_shard()? {
                Ok(()) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn is_shard_name(name: &str) -> bool {
    name.len() == 2 && name.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Blob, Snapshot};
    use crate::traits::ObjectStoreExt;
    use cairn_crypto::HashAlgorithm;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        let config = StoreConfig {
            fsync: false,
            ..StoreConfig::default()
        };
        (dir, FsObjectStore::new(layout, &config))
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    #[test]
    fn object_file_holds_exact_bytes_at_sharded_path() {
        let (dir, store) = open_store();
        let addr = store.put(b"payload").unwrap();
        let path = dir
            .path()
            .join("objects")
            .join(&addr.to_hex()[..2])
            .join(addr.to_hex());
        assert_eq!(fs::read(path).unwrap(), b"payload");
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, store) = open_store();
        let a = store.put_blob(&Blob::new(b"x".to_vec())).unwrap();
        let b = store.put_blob(&Blob::new(b"x".to_vec())).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list().unwrap().count(), 1);
    }

    #[test]
    fn no_temp_files_remain_after_put() {
        let (_dir, store) = open_store();
        let addr = store.put(b"payload").unwrap();
        let shard = store.layout().shard_dir(&addr);
        let names: Vec<String> = fs::read_dir(shard)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![addr.to_hex()]);
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    #[test]
    fn tampered_file_reads_as_corrupted() {
        let (_dir, store) = open_store();
        let addr = store.put(b"original").unwrap();
        fs::write(store.layout().object_path(&addr), b"tampered").unwrap();
        let err = store.get(&addr).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { address, .. } if address == addr));
        assert!(store.exists(&addr).unwrap());
    }

    #[test]
    fn reput_over_tampered_file_is_refused() {
        let (_dir, store) = open_store();
        let addr = store.put(b"original").unwrap();
        fs::write(store.layout().object_path(&addr), b"tampered").unwrap();
        let err = store.put(b"original").unwrap_err();
        assert!(matches!(err, StoreError::ContentMismatch { .. }));
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_dir, store) = open_store();
        let addr = store.hasher().hash(b"never stored");
        assert!(matches!(store.get(&addr), Err(StoreError::NotFound(_))));
        assert!(!store.exists(&addr).unwrap());
        assert!(!store.delete(&addr).unwrap());
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    #[test]
    fn list_skips_temp_and_stray_files() {
        let (dir, store) = open_store();
        let addr = store.put(b"real").unwrap();
        let shard = store.layout().shard_dir(&addr);
        fs::write(shard.join(".tmp-partial"), b"half").unwrap();
        fs::write(shard.join("README"), b"stray").unwrap();
        fs::write(dir.path().join("objects").join("notes.txt"), b"stray").unwrap();
        fs::create_dir(dir.path().join("objects").join("zz")).unwrap();

        let listed: Vec<Address> = store.list().unwrap().collect::<StoreResult<_>>().unwrap();
        assert_eq!(listed, vec![addr]);
    }

    #[test]
    fn list_skips_misfiled_objects() {
        let (_dir, store) = open_store();
        let addr = store.put(b"real").unwrap();
        let other_shard = if addr.shard() == "00" { "01" } else { "00" };
        let wrong = store.layout().objects_dir().join(other_shard);
        fs::create_dir_all(&wrong).unwrap();
        fs::write(wrong.join(addr.to_hex()), b"real").unwrap();

        let listed: Vec<Address> = store.list().unwrap().collect::<StoreResult<_>>().unwrap();
        assert_eq!(listed, vec![addr]);
    }

    #[test]
    fn list_on_missing_objects_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(StoreLayout::new(dir.path()), &StoreConfig::default());
        assert_eq!(store.list().unwrap().count(), 0);
    }

    #[test]
    fn list_many_across_shards() {
        let (_dir, store) = open_store();
        let mut expected: Vec<Address> = (0..64u32)
            .map(|i| store.put(&i.to_le_bytes()).unwrap())
            .collect();
        expected.sort();
        let mut listed: Vec<Address> = store.list().unwrap().collect::<StoreResult<_>>().unwrap();
        listed.sort();
        assert_eq!(listed, expected);
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn config_selects_hash_and_policy() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        let config = StoreConfig {
            hash_algorithm: HashAlgorithm::Sha256,
            snapshot_policy: SnapshotPolicy::RequireContent,
            fsync: false,
            ..StoreConfig::default()
        };
        let store = FsObjectStore::new(layout, &config);
        assert_eq!(store.put(b"abc").unwrap(), cairn_crypto::ContentHasher::SHA256.hash(b"abc"));
        assert!(store.put_snapshot(&Snapshot::default()).is_err());
    }

    #[test]
    fn stored_size_reports_file_length() {
        let (_dir, store) = open_store();
        let addr = store.put(b"12345").unwrap();
        assert_eq!(store.stored_size(&addr).unwrap(), 5);
    }
}
