//! Named references for the Cairn object store.
//!
//! A reference maps a human-readable name to a snapshot address. References
//! are the only mutable state in a store: a name may be created, moved to a
//! different snapshot, or deleted at any time, while objects never change.
//! They are also the roots from which garbage collection starts.
//!
//! # Modules
//!
//! - [`error`]: error types for ref operations
//! - [`traits`]: the [`RefStore`] trait defining the storage interface
//! - [`names`]: reference name validation
//! - [`fs`]: [`FsRefStore`], one file per reference under `refs/`
//! - [`memory`]: [`InMemoryRefStore`] for tests

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;

pub use error::{RefError, RefResult};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::validate_ref_name;
pub use traits::RefStore;
