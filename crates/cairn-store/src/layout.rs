//! On-disk layout of a store root.
//!
//! ```text
//! <root>/
//!   store.toml
//!   objects/<first-byte-hex>/<address-hex>
//!   refs/<name>
//! ```
//!
//! Every write goes to a `.tmp-*` sibling in the destination directory and is
//! renamed into place, so a reader never observes a partial file under its
//! final name.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cairn_types::Address;

use crate::error::{StoreError, StoreResult};

/// Directory holding sharded object files.
pub const OBJECTS_DIR: &str = "objects";
/// Directory holding reference files.
pub const REFS_DIR: &str = "refs";
/// Store configuration file.
pub const CONFIG_FILE: &str = "store.toml";
/// Prefix of in-flight temporary files.
pub const TEMP_PREFIX: &str = ".tmp-";

/// Paths inside a store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }

    pub fn refs_dir(&self) -> PathBuf {
        self.root.join(REFS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Shard directory for an address.
    pub fn shard_dir(&self, address: &Address) -> PathBuf {
        self.objects_dir().join(address.shard())
    }

    /// Final path of an object file.
    pub fn object_path(&self, address: &Address) -> PathBuf {
        self.shard_dir(address).join(address.to_hex())
    }

    /// Create the root, `objects/` and `refs/`. Idempotent.
    pub fn initialize(&self) -> StoreResult<()> {
        for dir in [self.root.clone(), self.objects_dir(), self.refs_dir()] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io("create_dir", &dir, e))?;
        }
        Ok(())
    }

    /// `true` when the root looks like an initialized store.
    pub fn is_initialized(&self) -> bool {
        self.config_path().is_file() && self.objects_dir().is_dir()
    }
}

/// `true` for names of in-flight temporary files.
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}

/// Write `bytes` to `dest` through a temporary file in `dir` and a rename.
///
/// The temporary file is removed if any step fails before the rename.
pub fn atomic_write(dir: &Path, dest: &Path, bytes: &[u8], fsync: bool) -> io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    if fsync {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_address() -> Address {
        let mut digest = [0x11; 32];
        digest[0] = 0xab;
        Address::from_digest(digest)
    }

    #[test]
    fn object_path_is_sharded_by_first_byte() {
        let layout = StoreLayout::new("/store");
        let addr = sample_address();
        let path = layout.object_path(&addr);
        assert_eq!(
            path,
            PathBuf::from("/store/objects/ab").join(addr.to_hex())
        );
    }

    #[test]
    fn fixed_locations() {
        let layout = StoreLayout::new("/store");
        assert_eq!(layout.refs_dir(), PathBuf::from("/store/refs"));
        assert_eq!(layout.config_path(), PathBuf::from("/store/store.toml"));
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("store"));
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        assert!(layout.objects_dir().is_dir());
        assert!(layout.refs_dir().is_dir());
        // No config written yet.
        assert!(!layout.is_initialized());
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file");
        atomic_write(dir.path(), &dest, b"first", false).unwrap();
        atomic_write(dir.path(), &dest, b"second", true).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"second");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_temp_name(&e.file_name().to_string_lossy()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn atomic_write_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let result = atomic_write(&missing, &missing.join("file"), b"x", false);
        assert!(result.is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn temp_names() {
        assert!(is_temp_name(".tmp-abc"));
        assert!(!is_temp_name("abc"));
    }
}
