//! Filesystem reference store.
//!
//! One file per reference at `refs/<name>`; the file holds the target
//! address as 64 hex characters. Updates are written to a temporary sibling
//! and renamed over the old file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cairn_store::layout::{atomic_write, is_temp_name};
use cairn_types::Address;
use tracing::{debug, warn};

use crate::error::{RefError, RefResult};
use crate::names::validate_ref_name;
use crate::traits::RefStore;

/// Reference store backed by a directory.
#[derive(Debug, Clone)]
pub struct FsRefStore {
    dir: PathBuf,
    fsync: bool,
}

impl FsRefStore {
    /// Reference store over `dir` (normally `<root>/refs`).
    pub fn new(dir: impl Into<PathBuf>, fsync: bool) -> Self {
        Self {
            dir: dir.into(),
            fsync,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

fn parse_target(name: &str, contents: &str) -> RefResult<Address> {
    Address::from_hex(contents.trim()).map_err(|e| RefError::InvalidTarget {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &str) -> RefResult<Option<Address>> {
        validate_ref_name(name)?;
        let path = self.ref_path(name);
        match fs::read_to_string(&path) {
            Ok(contents) => parse_target(name, &contents).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RefError::io("read_ref", path, e)),
        }
    }

    fn write_ref(&self, name: &str, target: &Address) -> RefResult<()> {
        validate_ref_name(name)?;
        fs::create_dir_all(&self.dir).map_err(|e| RefError::io("create_dir", &self.dir, e))?;
        let path = self.ref_path(name);
        atomic_write(&self.dir, &path, target.to_hex().as_bytes(), self.fsync)
            .map_err(|e| RefError::io("write_ref", &path, e))?;
        debug!(ref_name = name, to = %target.short_hex(), "wrote ref");
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> RefResult<bool> {
        validate_ref_name(name)?;
        let path = self.ref_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(ref_name = name, "deleted ref");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RefError::io("delete_ref", path, e)),
        }
    }

    fn list_refs(&self) -> RefResult<Vec<(String, Address)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RefError::io("list_refs", &self.dir, e)),
        };

        let mut refs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RefError::io("list_refs", &self.dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_temp_name(&name) {
                continue;
            }
            if validate_ref_name(&name).is_err() || !entry.path().is_file() {
                warn!(path = %entry.path().display(), "skipping stray entry in refs directory");
                continue;
            }
            let contents = match fs::read_to_string(entry.path()) {
                Ok(contents) => contents,
                // Deleted between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(RefError::io("read_ref", entry.path(), e)),
            };
            refs.push((name.clone(), parse_target(&name, &contents)?));
        }
        refs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(refs)
    }
}
