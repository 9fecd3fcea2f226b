use std::path::PathBuf;

use cairn_crypto::CanonicalError;
use cairn_types::Address;

use crate::object::ObjectKind;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(Address),

    /// Stored bytes no longer hash to their address.
    #[error("object {address} is corrupted: stored bytes hash to {actual}")]
    Corrupted { address: Address, actual: Address },

    /// A payload was rejected before encoding.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Stored bytes hash correctly but do not decode as an object.
    #[error("object {address} cannot be decoded: {reason}")]
    Undecodable { address: Address, reason: String },

    /// The object decoded to a different variant than requested.
    #[error("object {address} is a {actual}, expected a {expected}")]
    KindMismatch {
        address: Address,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// Bytes offered for an address do not hash to it.
    #[error("bytes offered for {claimed} hash to {actual}")]
    AddressMismatch { claimed: Address, actual: Address },

    /// An address is already stored with different bytes.
    #[error("object {address} already stored with different content")]
    ContentMismatch { address: Address },

    /// Canonical encoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] CanonicalError),

    /// Store metadata is missing, malformed or incompatible.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A filesystem operation failed.
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An in-memory backend lock was poisoned.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// `true` for failures caused by stored bytes that no longer match
    /// their address.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
