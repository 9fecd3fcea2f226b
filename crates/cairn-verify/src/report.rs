use std::collections::BTreeSet;
use std::fmt;

use cairn_store::{ObjectKind, StoreError};
use cairn_types::Address;

use crate::error::{VerifyError, VerifyResult};

/// Category of a problem found while verifying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// A referenced object is absent.
    Missing,
    /// Stored bytes no longer hash to the address.
    Corrupted,
    /// The object exists but is a different variant than the edge requires.
    KindMismatch,
    /// The object hashes correctly but is not a well-formed object.
    Undecodable,
    /// The object could not be read at all.
    Storage,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Missing => "missing",
            Self::Corrupted => "corrupted",
            Self::KindMismatch => "kind-mismatch",
            Self::Undecodable => "undecodable",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// A single problem found during verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    /// The object that is missing or damaged.
    pub address: Address,
    /// The object whose edge led here, if any.
    pub referenced_by: Option<Address>,
    pub kind: IssueKind,
    pub description: String,
}

impl Issue {
    /// Classify a failed read of `address`.
    pub fn from_store_error(
        address: Address,
        referenced_by: Option<Address>,
        error: &StoreError,
    ) -> Self {
        let kind = match error {
            StoreError::NotFound(_) => IssueKind::Missing,
            StoreError::Corrupted { .. } => IssueKind::Corrupted,
            StoreError::KindMismatch { .. } => IssueKind::KindMismatch,
            StoreError::Undecodable { .. } => IssueKind::Undecodable,
            _ => IssueKind::Storage,
        };
        let description = match referenced_by {
            Some(parent) => format!("{error} (referenced by {parent})"),
            None => error.to_string(),
        };
        Self {
            address,
            referenced_by,
            kind,
            description,
        }
    }

    pub(crate) fn kind_mismatch(
        address: Address,
        referenced_by: Option<Address>,
        expected: ObjectKind,
        actual: ObjectKind,
    ) -> Self {
        Self::from_store_error(
            address,
            referenced_by,
            &StoreError::KindMismatch {
                address,
                expected,
                actual,
            },
        )
    }
}

/// Result of walking an object graph from one root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    pub root: Address,
    /// Objects read and checked during the walk.
    pub objects_checked: usize,
    /// Snapshots visited along the parent chain(s).
    pub snapshots_checked: usize,
    pub issues: Vec<Issue>,
}

impl VerificationReport {
    /// Returns `true` if every object resolved cleanly.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Addresses reported missing.
    pub fn missing(&self) -> BTreeSet<Address> {
        self.issues
            .iter()
            .filter(|i| i.kind == IssueKind::Missing)
            .map(|i| i.address)
            .collect()
    }

    /// Convert a failing report into [`VerifyError::SnapshotVerificationFailed`].
    pub fn into_result(self) -> VerifyResult<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(VerifyError::SnapshotVerificationFailed {
                root: self.root,
                issues: self.issues.len(),
            })
        }
    }
}

/// Result of a store-wide re-hash of every object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TamperReport {
    /// Objects whose stored bytes no longer hash to their address.
    pub tampered: BTreeSet<Address>,
    /// Objects that re-hashed cleanly.
    pub verified: usize,
    /// Objects or directories that could not be read.
    pub errors: Vec<String>,
}

impl TamperReport {
    pub fn is_clean(&self) -> bool {
        self.tampered.is_empty()
    }

    /// Convert a report with tampered objects into [`VerifyError::TamperDetected`].
    pub fn into_result(self) -> VerifyResult<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(VerifyError::TamperDetected {
                count: self.tampered.len(),
                addresses: self.tampered.into_iter().collect(),
            })
        }
    }
}

/// Result of checking every snapshot reachable from the references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissingReport {
    /// Snapshots whose history does not fully resolve.
    pub broken_snapshots: BTreeSet<Address>,
    /// Addresses referenced somewhere in that history but absent.
    pub missing_objects: BTreeSet<Address>,
    /// References whose target object is absent.
    pub dangling_refs: Vec<(String, Address)>,
    /// Distinct snapshots examined.
    pub snapshots_checked: usize,
}

impl MissingReport {
    pub fn is_clean(&self) -> bool {
        self.broken_snapshots.is_empty() && self.dangling_refs.is_empty()
    }
}
