//! Canonical encoding and content hashing for the Cairn object store.
//!
//! An object's address is `hash(canonical_encode(payload))`. This crate owns
//! both halves of that pipeline:
//!
//! - [`canonical`]: deterministic JSON encoding (sorted keys, compact form)
//! - [`hasher`]: the store's digest function, BLAKE3 or SHA-256, chosen once
//!   when a store is created
//!
//! All digests come from established libraries; nothing here is custom
//! cryptography.

pub mod canonical;
pub mod error;
pub mod hasher;

pub use canonical::{encode_value, to_canonical_bytes, MAX_DEPTH};
pub use error::{CanonicalError, CanonicalResult};
pub use hasher::{ContentHasher, HashAlgorithm};
