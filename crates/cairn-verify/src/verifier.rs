use std::collections::{HashMap, HashSet, VecDeque};

use cairn_refs::RefStore;
use cairn_store::{Object, ObjectKind, ObjectStore, ObjectStoreExt, StoreError};
use cairn_types::Address;
use tracing::{debug, info, warn};

use crate::error::VerifyResult;
use crate::report::{Issue, MissingReport, TamperReport, VerificationReport};

/// An edge still to be followed: where it points, what it must point at,
/// and who points there.
struct Edge {
    address: Address,
    expected: Option<ObjectKind>,
    referenced_by: Option<Address>,
}

/// Integrity checks over an object store.
///
/// Graph walks use an explicit worklist, so arbitrarily long parent chains
/// never grow the call stack. Walks collect every problem they meet instead
/// of stopping at the first.
pub struct Verifier<'a> {
    objects: &'a dyn ObjectStore,
}

impl<'a> Verifier<'a> {
    pub fn new(objects: &'a dyn ObjectStore) -> Self {
        Self { objects }
    }

    /// Re-hash a single object without decoding it.
    ///
    /// Fails immediately with the store's `NotFound` or `Corrupted` error.
    pub fn verify_object(&self, address: &Address) -> VerifyResult<()> {
        self.objects.get(address)?;
        debug!(address = %address.short_hex(), "object verified");
        Ok(())
    }

    /// Check a snapshot, its bundles, and its whole parent chain.
    pub fn verify_snapshot(&self, address: &Address) -> VerificationReport {
        self.walk(*address, Some(ObjectKind::Snapshot))
    }

    /// Check a tree and everything beneath it.
    pub fn verify_tree(&self, address: &Address) -> VerificationReport {
        self.walk(*address, Some(ObjectKind::Tree))
    }

    /// Check any object and everything reachable from it.
    pub fn verify_reachable(&self, address: &Address) -> VerificationReport {
        self.walk(*address, None)
    }

    fn walk(&self, root: Address, expected: Option<ObjectKind>) -> VerificationReport {
        let mut report = VerificationReport {
            root,
            objects_checked: 0,
            snapshots_checked: 0,
            issues: Vec::new(),
        };
        let mut visited: HashSet<(Address, Option<ObjectKind>)> = HashSet::new();
        let mut work = VecDeque::from([Edge {
            address: root,
            expected,
            referenced_by: None,
        }]);

        while let Some(edge) = work.pop_front() {
            if !visited.insert((edge.address, edge.expected)) {
                continue;
            }
            let object = match self.objects.get_object(&edge.address) {
                Ok(object) => object,
                Err(e) => {
                    warn!(address = %edge.address.short_hex(), error = %e, "verification issue");
                    report
                        .issues
                        .push(Issue::from_store_error(edge.address, edge.referenced_by, &e));
                    continue;
                }
            };
            report.objects_checked += 1;

            if let Some(expected) = edge.expected {
                if object.kind() != expected {
                    warn!(
                        address = %edge.address.short_hex(),
                        expected = %expected,
                        actual = %object.kind(),
                        "verification issue: wrong object kind"
                    );
                    report.issues.push(Issue::kind_mismatch(
                        edge.address,
                        edge.referenced_by,
                        expected,
                        object.kind(),
                    ));
                    continue;
                }
            }

            let from = Some(edge.address);
            match &object {
                Object::Snapshot(snapshot) => {
                    report.snapshots_checked += 1;
                    work.extend(snapshot.bundles.iter().map(|bundle| Edge {
                        address: *bundle,
                        expected: Some(ObjectKind::Bundle),
                        referenced_by: from,
                    }));
                    if let Some(parent) = snapshot.parent {
                        work.push_back(Edge {
                            address: parent,
                            expected: Some(ObjectKind::Snapshot),
                            referenced_by: from,
                        });
                    }
                }
                Object::Tree(tree) => {
                    work.extend(tree.children.values().map(|child| Edge {
                        address: *child,
                        expected: None,
                        referenced_by: from,
                    }));
                }
                Object::Blob(_) | Object::Bundle(_) => {}
            }
        }

        debug!(
            root = %root.short_hex(),
            objects = report.objects_checked,
            issues = report.issues.len(),
            "graph verified"
        );
        report
    }

    /// Re-hash every stored object.
    pub fn detect_tampering(&self) -> VerifyResult<TamperReport> {
        let mut report = TamperReport::default();
        for item in self.objects.list()? {
            let address = match item {
                Ok(address) => address,
                Err(e) => {
                    report.errors.push(e.to_string());
                    continue;
                }
            };
            match self.objects.get(&address) {
                Ok(_) => report.verified += 1,
                Err(StoreError::Corrupted { actual, .. }) => {
                    warn!(
                        address = %address.short_hex(),
                        actual = %actual.short_hex(),
                        "tampered object"
                    );
                    report.tampered.insert(address);
                }
                // Removed between listing and reading.
                Err(StoreError::NotFound(_)) => {}
                Err(e) => report.errors.push(format!("{address}: {e}")),
            }
        }
        info!(
            verified = report.verified,
            tampered = report.tampered.len(),
            errors = report.errors.len(),
            "tamper scan complete"
        );
        Ok(report)
    }

    /// Check every snapshot reachable from the current references.
    ///
    /// A snapshot is broken when one of its bundles or its parent does not
    /// resolve cleanly, or when any ancestor is broken.
    pub fn detect_missing_objects(&self, refs: &dyn RefStore) -> VerifyResult<MissingReport> {
        let mut report = MissingReport::default();
        // Address -> broken, for every snapshot already settled.
        let mut status: HashMap<Address, bool> = HashMap::new();

        for (name, target) in refs.list_refs()? {
            if !self.objects.exists(&target)? {
                warn!(ref_name = %name, to = %target.short_hex(), "reference target missing");
                report.missing_objects.insert(target);
                report.dangling_refs.push((name, target));
                continue;
            }

            // Walk back until the chain ends or meets a settled snapshot.
            let mut chain = Vec::new();
            let mut on_chain = HashSet::new();
            let mut inherited = false;
            let mut cursor = Some(target);
            while let Some(current) = cursor {
                if let Some(&broken) = status.get(&current) {
                    inherited = broken;
                    break;
                }
                if !on_chain.insert(current) {
                    break;
                }
                let (broken, parent) = self.check_snapshot(&current, &mut report);
                chain.push((current, broken));
                cursor = parent;
            }

            // Settle oldest first so breakage flows down to descendants.
            for (address, broken) in chain.into_iter().rev() {
                inherited = inherited || broken;
                status.insert(address, inherited);
                if inherited {
                    report.broken_snapshots.insert(address);
                }
            }
        }

        report.snapshots_checked = status.len();
        info!(
            snapshots = report.snapshots_checked,
            broken = report.broken_snapshots.len(),
            missing = report.missing_objects.len(),
            "missing-object scan complete"
        );
        Ok(report)
    }

    /// Check one snapshot's own edges. Returns whether it is broken and the
    /// parent to continue with.
    fn check_snapshot(&self, address: &Address, report: &mut MissingReport) -> (bool, Option<Address>) {
        let snapshot = match self.objects.get_snapshot(address) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if matches!(e, StoreError::NotFound(_)) {
                    report.missing_objects.insert(*address);
                }
                warn!(address = %address.short_hex(), error = %e, "unreadable snapshot");
                return (true, None);
            }
        };

        let mut broken = false;
        for bundle in &snapshot.bundles {
            if let Err(e) = self.objects.get_bundle(bundle) {
                if matches!(e, StoreError::NotFound(_)) {
                    report.missing_objects.insert(*bundle);
                }
                warn!(
                    snapshot = %address.short_hex(),
                    bundle = %bundle.short_hex(),
                    error = %e,
                    "snapshot bundle does not resolve"
                );
                broken = true;
            }
        }

        let parent = match snapshot.parent {
            None => None,
            Some(parent) => match self.objects.exists(&parent) {
                Ok(true) => Some(parent),
                Ok(false) => {
                    warn!(
                        snapshot = %address.short_hex(),
                        parent = %parent.short_hex(),
                        "snapshot parent missing"
                    );
                    report.missing_objects.insert(parent);
                    broken = true;
                    None
                }
                Err(e) => {
                    warn!(parent = %parent.short_hex(), error = %e, "cannot stat parent");
                    broken = true;
                    None
                }
            },
        };
        (broken, parent)
    }
}
