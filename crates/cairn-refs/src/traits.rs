//! The [`RefStore`] trait defining the reference storage interface.

use cairn_types::Address;

use crate::error::RefResult;

/// Storage backend for named references.
///
/// Names are flat (no `/`) and validated by
/// [`validate_ref_name`](crate::names::validate_ref_name). Updates are
/// last-writer-wins; each write or delete is atomic on its own.
pub trait RefStore: Send + Sync {
    /// Read the target of a reference.
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> RefResult<Option<Address>>;

    /// Create or move a reference.
    fn write_ref(&self, name: &str, target: &Address) -> RefResult<()>;

    /// Delete a reference.
    ///
    /// Returns `Ok(true)` if the ref existed and was deleted, `Ok(false)` if
    /// it did not exist.
    fn delete_ref(&self, name: &str) -> RefResult<bool>;

    /// All references, sorted by name.
    fn list_refs(&self) -> RefResult<Vec<(String, Address)>>;

    /// Targets of all references, deduplicated and sorted.
    fn targets(&self) -> RefResult<Vec<Address>> {
        let mut targets: Vec<Address> = self
            .list_refs()?
            .into_iter()
            .map(|(_, target)| target)
            .collect();
        targets.sort();
        targets.dedup();
        Ok(targets)
    }
}
