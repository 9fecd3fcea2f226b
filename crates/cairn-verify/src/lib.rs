//! Integrity verification for the Cairn object store.
//!
//! - [`Verifier::verify_object`]: re-hash one object
//! - [`Verifier::verify_snapshot`]: walk a snapshot's bundles and parent chain,
//!   collecting every problem
//! - [`Verifier::detect_tampering`]: re-hash the whole store
//! - [`Verifier::detect_missing_objects`]: check every snapshot reachable
//!   from the references
//! - [`check_invariants`]: evaluate the store invariants into a report
//!
//! Damage is never reported as absence: a corrupted object is
//! [`IssueKind::Corrupted`], a missing one [`IssueKind::Missing`].

pub mod error;
pub mod invariants;
pub mod report;
pub mod verifier;

pub use error::{VerifyError, VerifyResult};
pub use invariants::{check_invariants, InvariantCheck, InvariantReport};
pub use report::{Issue, IssueKind, MissingReport, TamperReport, VerificationReport};
pub use verifier::Verifier;
