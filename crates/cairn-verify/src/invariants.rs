//! Store-wide invariant checks.
//!
//! Each check scans the live store rather than trusting cached state, so the
//! report reflects what is on disk at the time of the call.

use cairn_refs::RefStore;
use cairn_store::{ObjectKind, ObjectStore, ObjectStoreExt};

use crate::error::VerifyResult;
use crate::verifier::Verifier;

/// Outcome of one invariant check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantCheck {
    pub name: &'static str,
    pub description: &'static str,
    pub holds: bool,
    /// One line per violation found.
    pub details: Vec<String>,
}

/// Outcome of all invariant checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvariantReport {
    pub checks: Vec<InvariantCheck>,
}

impl InvariantReport {
    /// Returns `true` if every check holds.
    pub fn all_hold(&self) -> bool {
        self.checks.iter().all(|c| c.holds)
    }

    pub fn get(&self, name: &str) -> Option<&InvariantCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &InvariantCheck> {
        self.checks.iter().filter(|c| !c.holds)
    }
}

pub const CONTENT_ADDRESSING: &str = "content_addressing";
pub const REFERENTIAL_CLOSURE: &str = "referential_closure";
pub const REFERENCE_TARGETS: &str = "reference_targets";

/// Evaluate the store invariants against live state.
pub fn check_invariants(
    objects: &dyn ObjectStore,
    refs: &dyn RefStore,
) -> VerifyResult<InvariantReport> {
    let verifier = Verifier::new(objects);
    let mut checks = Vec::with_capacity(3);

    let tamper = verifier.detect_tampering()?;
    let mut details: Vec<String> = tamper
        .tampered
        .iter()
        .map(|a| format!("{a} does not hash to its address"))
        .collect();
    details.extend(tamper.errors.iter().cloned());
    checks.push(InvariantCheck {
        name: CONTENT_ADDRESSING,
        description: "every stored object hashes to its address",
        holds: details.is_empty(),
        details,
    });

    let missing = verifier.detect_missing_objects(refs)?;
    let mut details: Vec<String> = missing
        .broken_snapshots
        .iter()
        .map(|a| format!("snapshot {a} does not fully resolve"))
        .collect();
    details.extend(
        missing
            .missing_objects
            .iter()
            .map(|a| format!("{a} is referenced but missing")),
    );
    checks.push(InvariantCheck {
        name: REFERENTIAL_CLOSURE,
        description: "every snapshot reachable from a reference resolves cleanly",
        holds: missing.is_clean(),
        details,
    });

    let mut details = Vec::new();
    for (name, target) in refs.list_refs()? {
        match objects.get_object(&target) {
            Ok(object) if object.kind() == ObjectKind::Snapshot => {}
            Ok(object) => details.push(format!("ref {name} points at a {}", object.kind())),
            Err(e) => details.push(format!("ref {name}: {e}")),
        }
    }
    checks.push(InvariantCheck {
        name: REFERENCE_TARGETS,
        description: "every reference names an existing snapshot",
        holds: details.is_empty(),
        details,
    });

    Ok(InvariantReport { checks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_refs::InMemoryRefStore;
    use cairn_store::{Blob, Bundle, InMemoryObjectStore, Snapshot};
    use serde_json::json;

    fn populated() -> (InMemoryObjectStore, InMemoryRefStore, cairn_types::Address) {
        let store = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        let bundle = store.put_bundle(&Bundle::new(json!({"sequence": 1}))).unwrap();
        let snap = store.put_snapshot(&Snapshot::new(vec![bundle], None)).unwrap();
        refs.write_ref("main", &snap).unwrap();
        (store, refs, bundle)
    }

    #[test]
    fn healthy_store_holds() {
        let (store, refs, _) = populated();
        let report = check_invariants(&store, &refs).unwrap();
        assert!(report.all_hold());
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.failed().count(), 0);
    }

    #[test]
    fn tampering_breaks_content_addressing() {
        let (store, refs, bundle) = populated();
        store.overwrite_unchecked(&bundle, b"{}".to_vec()).unwrap();
        let report = check_invariants(&store, &refs).unwrap();
        assert!(!report.get(CONTENT_ADDRESSING).unwrap().holds);
        assert!(!report.get(REFERENTIAL_CLOSURE).unwrap().holds);
        assert!(report.get(REFERENCE_TARGETS).unwrap().holds);
    }

    #[test]
    fn deletion_breaks_closure() {
        let (store, refs, bundle) = populated();
        store.delete(&bundle).unwrap();
        let report = check_invariants(&store, &refs).unwrap();
        assert!(report.get(CONTENT_ADDRESSING).unwrap().holds);
        let closure = report.get(REFERENTIAL_CLOSURE).unwrap();
        assert!(!closure.holds);
        assert!(closure.details.iter().any(|d| d.contains(&bundle.to_hex())));
    }

    #[test]
    fn ref_to_blob_breaks_targets() {
        let (store, refs, _) = populated();
        let blob = store.put_blob(&Blob::new(b"x".to_vec())).unwrap();
        refs.write_ref("odd", &blob).unwrap();
        let report = check_invariants(&store, &refs).unwrap();
        let targets = report.get(REFERENCE_TARGETS).unwrap();
        assert!(!targets.holds);
        assert_eq!(targets.details.len(), 1);
    }
}
