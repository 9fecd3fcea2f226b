use std::fs;
use std::path::Path;

use cairn_crypto::HashAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Whether a Snapshot may reference nothing at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotPolicy {
    /// Snapshots with no bundles and no parent are accepted.
    #[default]
    AllowEmpty,
    /// A Snapshot must name at least one bundle or a parent.
    RequireContent,
}

/// Persistent store configuration, written to `store.toml` at init.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// On-disk format version.
    pub format_version: u32,
    /// Digest used for every address in this store. Fixed at creation.
    pub hash_algorithm: HashAlgorithm,
    /// Structural rule applied to new Snapshots.
    pub snapshot_policy: SnapshotPolicy,
    /// `sync_all` temporary files before they are renamed into place.
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            hash_algorithm: HashAlgorithm::default(),
            snapshot_policy: SnapshotPolicy::default(),
            fsync: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration using the given digest.
    pub fn with_algorithm(hash_algorithm: HashAlgorithm) -> Self {
        Self {
            hash_algorithm,
            ..Default::default()
        }
    }

    /// Reject configurations this build cannot serve.
    pub fn validate(&self) -> StoreResult<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(StoreError::Configuration(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                self.format_version
            )));
        }
        Ok(())
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| StoreError::Configuration(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::Configuration(format!("no store configuration at {}", path.display()))
            } else {
                StoreError::io("read_config", path, e)
            }
        })?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML text.
    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self)
            .map_err(|e| StoreError::Configuration(format!("failed to render TOML: {e}")))
    }
}
