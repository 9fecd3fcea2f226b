//! High-level API for the Cairn snapshot store.
//!
//! [`SnapshotStore`] is the single handle applications embed: it opens a
//! store directory and exposes objects, references, verification and garbage
//! collection. Every failure surfaces as [`Error`], whose [`ErrorKind`] is
//! stable for programmatic handling.
//!
//! ```no_run
//! use cairn_sdk::{Bundle, GcOptions, Snapshot, SnapshotStore, StoreConfig};
//!
//! # fn main() -> cairn_sdk::Result<()> {
//! let store = SnapshotStore::init("/tmp/cairn", StoreConfig::default())?;
//! let h1 = store.put_bundle(&Bundle::new(serde_json::json!({"sequence": 1})))?;
//! let s1 = store.put_snapshot(&Snapshot::new(vec![h1], None))?;
//! store.create_snapshot_ref("main", &s1)?;
//! assert!(store.verify_snapshot(&s1).is_valid());
//! store.garbage_collect(&GcOptions::default())?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod stats;
pub mod store;
pub mod sync;

pub use error::{Error, ErrorKind, Result};
pub use stats::StoreStatistics;
pub use store::SnapshotStore;
pub use sync::SyncAdapter;

// Re-export key types
pub use cairn_crypto::HashAlgorithm;
pub use cairn_gc::{GcOptions, GcReport};
pub use cairn_store::{
    Blob, Bundle, Metadata, Object, ObjectKind, Snapshot, SnapshotPolicy, StoreConfig, Tree,
};
pub use cairn_types::Address;
pub use cairn_verify::{
    InvariantReport, Issue, IssueKind, MissingReport, TamperReport, VerificationReport,
};
