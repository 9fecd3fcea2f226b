use std::fmt;

use cairn_crypto::CanonicalError;
use cairn_gc::GcError;
use cairn_refs::RefError;
use cairn_store::StoreError;
use cairn_types::Address;
use cairn_verify::VerifyError;
use thiserror::Error;

/// Error category for programmatic handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ObjectNotFound,
    ObjectCorrupted,
    InvalidObject,
    SnapshotVerificationFailed,
    ReferenceMissing,
    TamperDetected,
    GarbageCollectionFailed,
    InvariantViolation,
    Storage,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("object not found: {0}")]
    ObjectNotFound(Address),

    /// Stored bytes exist but no longer hash to their address.
    #[error("object {address} is corrupted: stored bytes hash to {actual}")]
    ObjectCorrupted { address: Address, actual: Address },

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("verification of {root} failed with {issues} issue(s)")]
    SnapshotVerificationFailed { root: Address, issues: usize },

    #[error("reference not found: {0}")]
    ReferenceMissing(String),

    #[error("tampering detected in {} object(s)", addresses.len())]
    TamperDetected { addresses: Vec<Address> },

    #[error("garbage collection failed: {0}")]
    GarbageCollectionFailed(String),

    /// Re-put of an address with different bytes, or bytes offered under
    /// an address they do not hash to.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ObjectNotFound(_) => ErrorKind::ObjectNotFound,
            Self::ObjectCorrupted { .. } => ErrorKind::ObjectCorrupted,
            Self::InvalidObject(_) => ErrorKind::InvalidObject,
            Self::SnapshotVerificationFailed { .. } => ErrorKind::SnapshotVerificationFailed,
            Self::ReferenceMissing(_) => ErrorKind::ReferenceMissing,
            Self::TamperDetected { .. } => ErrorKind::TamperDetected,
            Self::GarbageCollectionFailed(_) => ErrorKind::GarbageCollectionFailed,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(address) => Self::ObjectNotFound(address),
            StoreError::Corrupted { address, actual } => Self::ObjectCorrupted { address, actual },
            StoreError::InvalidObject(reason) => Self::InvalidObject(reason),
            StoreError::Undecodable { .. }
            | StoreError::KindMismatch { .. }
            | StoreError::Encoding(_) => Self::InvalidObject(e.to_string()),
            StoreError::AddressMismatch { .. } | StoreError::ContentMismatch { .. } => {
                Self::InvariantViolation(e.to_string())
            }
            StoreError::Configuration(reason) => Self::Configuration(reason),
            StoreError::Io { .. } | StoreError::Poisoned(_) => Self::Storage(e.to_string()),
        }
    }
}

impl From<RefError> for Error {
    fn from(e: RefError) -> Self {
        match e {
            RefError::NotFound { name } => Self::ReferenceMissing(name),
            RefError::InvalidName { .. } | RefError::InvalidTarget { .. } => {
                Self::InvalidObject(e.to_string())
            }
            RefError::Io { .. } | RefError::Poisoned(_) => Self::Storage(e.to_string()),
        }
    }
}

impl From<VerifyError> for Error {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::SnapshotVerificationFailed { root, issues } => {
                Self::SnapshotVerificationFailed { root, issues }
            }
            VerifyError::TamperDetected { addresses, .. } => Self::TamperDetected { addresses },
            VerifyError::Store(e) => e.into(),
            VerifyError::Ref(e) => e.into(),
        }
    }
}

impl From<GcError> for Error {
    fn from(e: GcError) -> Self {
        match e {
            GcError::Unsafe { issues } => Self::GarbageCollectionFailed(format!(
                "unsafe to sweep: {}",
                issues.join("; ")
            )),
            GcError::Store(e) => e.into(),
            GcError::Ref(e) => e.into(),
        }
    }
}

impl From<CanonicalError> for Error {
    fn from(e: CanonicalError) -> Self {
        Self::InvalidObject(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn addr(byte: u8) -> Address {
        Address::from_digest([byte; 32])
    }

    #[test]
    fn corruption_is_never_reported_as_missing() {
        let e: Error = StoreError::Corrupted {
            address: addr(1),
            actual: addr(2),
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::ObjectCorrupted);

        let nested: Error = VerifyError::Store(StoreError::Corrupted {
            address: addr(1),
            actual: addr(2),
        })
        .into();
        assert_eq!(nested.kind(), ErrorKind::ObjectCorrupted);
    }

    #[test]
    fn store_errors_map_to_kinds() {
        let cases: Vec<(StoreError, ErrorKind)> = vec![
            (StoreError::NotFound(addr(1)), ErrorKind::ObjectNotFound),
            (StoreError::InvalidObject("x".into()), ErrorKind::InvalidObject),
            (
                StoreError::Undecodable {
                    address: addr(1),
                    reason: "bad".into(),
                },
                ErrorKind::InvalidObject,
            ),
            (
                StoreError::ContentMismatch { address: addr(1) },
                ErrorKind::InvariantViolation,
            ),
            (
                StoreError::AddressMismatch {
                    claimed: addr(1),
                    actual: addr(2),
                },
                ErrorKind::InvariantViolation,
            ),
            (StoreError::Configuration("x".into()), ErrorKind::Configuration),
            (
                StoreError::Io {
                    op: "write",
                    path: PathBuf::from("/tmp/x"),
                    source: std::io::Error::other("disk full"),
                },
                ErrorKind::Storage,
            ),
        ];
        for (error, kind) in cases {
            assert_eq!(Error::from(error).kind(), kind);
        }
    }

    #[test]
    fn other_crates_map_to_kinds() {
        let e: Error = RefError::NotFound { name: "main".into() }.into();
        assert_eq!(e.kind(), ErrorKind::ReferenceMissing);

        let e: Error = VerifyError::TamperDetected {
            count: 1,
            addresses: vec![addr(1)],
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::TamperDetected);

        let e: Error = GcError::Unsafe {
            issues: vec!["root missing".into()],
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::GarbageCollectionFailed);
        assert!(e.to_string().contains("root missing"));

        let e: Error = CanonicalError::TooDeep { limit: 128 }.into();
        assert_eq!(e.kind(), ErrorKind::InvalidObject);
    }
}
