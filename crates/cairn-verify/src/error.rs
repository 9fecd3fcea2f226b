use cairn_refs::RefError;
use cairn_store::StoreError;
use cairn_types::Address;
use thiserror::Error;

/// Errors from verification operations.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A graph walk found at least one problem.
    #[error("verification of {root} failed with {issues} issue(s)")]
    SnapshotVerificationFailed { root: Address, issues: usize },

    /// A store-wide scan found objects whose bytes no longer match their address.
    #[error("tampering detected in {count} object(s)")]
    TamperDetected { count: usize, addresses: Vec<Address> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ref(#[from] RefError),
}

/// Result alias for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
