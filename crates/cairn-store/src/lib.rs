//! Content-addressed object storage for the Cairn object store.
//!
//! Every object (blob, bundle, snapshot, tree) is stored under the digest of
//! its canonical encoding. Identity is derived from content, stored bytes are
//! re-verified on every read, and nothing is ever updated in place.
//!
//! # Object Types
//!
//! - [`Blob`]: opaque bytes
//! - [`Bundle`]: opaque structured change payload from an external sync engine
//! - [`Snapshot`]: ordered bundle addresses plus an optional parent snapshot
//! - [`Tree`]: named children for hierarchical grouping
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait; typed access comes from
//! [`ObjectStoreExt`]:
//!
//! - [`FsObjectStore`]: sharded directory layout with atomic writes
//! - [`InMemoryObjectStore`]: `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written.
//! 2. Reads verify content against the address; damage is reported as
//!    corruption, never as absence.
//! 3. Writes go through a temporary file and a rename.
//! 4. The store never interprets bundle payloads.
//! 5. All I/O errors are propagated with the operation and path.

pub mod config;
pub mod error;
pub mod fs;
pub mod layout;
pub mod memory;
pub mod object;
pub mod traits;

pub use config::{SnapshotPolicy, StoreConfig, FORMAT_VERSION};
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use layout::StoreLayout;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, Bundle, Metadata, Object, ObjectKind, Snapshot, Tree};
pub use traits::{AddressIter, ObjectStore, ObjectStoreExt};
