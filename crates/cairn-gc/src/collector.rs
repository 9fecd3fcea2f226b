use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

use cairn_refs::RefStore;
use cairn_store::{ObjectStore, ObjectStoreExt};
use cairn_types::Address;
use tracing::{debug, info, warn};

use crate::error::{GcError, GcResult};

/// Where a collection cycle currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GcPhase {
    #[default]
    Idle,
    Marking,
    Sweeping,
}

impl fmt::Display for GcPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Marking => "marking",
            Self::Sweeping => "sweeping",
        };
        f.write_str(name)
    }
}

/// Knobs for one collection cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcOptions {
    /// Report candidates without deleting anything.
    pub dry_run: bool,
    /// Extra roots kept alive alongside the references.
    pub pins: Vec<Address>,
    /// Refuse to sweep when a root is missing or any reachable object is
    /// unreadable.
    pub require_safe_roots: bool,
    /// Upper bound on deletions attempted this cycle. Remaining candidates
    /// are reported as deferred.
    pub max_deletions: Option<usize>,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            pins: Vec::new(),
            require_safe_roots: true,
            max_deletions: None,
        }
    }
}

impl GcOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn with_pins(mut self, pins: impl IntoIterator<Item = Address>) -> Self {
        self.pins.extend(pins);
        self
    }

    pub fn with_max_deletions(mut self, limit: usize) -> Self {
        self.max_deletions = Some(limit);
        self
    }

    /// Sweep even when a root is missing or a reachable object is
    /// unreadable. This departs from the fail-closed default: objects only
    /// reachable through an unreadable object may be deleted. Intended for
    /// repairing a damaged store after the damage has been inspected.
    pub fn allow_unsafe_roots(mut self) -> Self {
        self.require_safe_roots = false;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An edge points at an absent object.
    Missing,
    /// The object exists but could not be read, so its edges were not followed.
    Unreadable,
}

/// Something the mark phase could not follow. Never aborts the mark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcDiagnostic {
    pub address: Address,
    /// `None` when the address is itself a root.
    pub referenced_by: Option<Address>,
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl fmt::Display for GcDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.referenced_by {
            Some(parent) => write!(f, "{} ({}, referenced by {parent})", self.address, self.detail),
            None => write!(f, "root {} ({})", self.address, self.detail),
        }
    }
}

/// Outcome of one collection cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    pub dry_run: bool,
    /// Roots captured at the start of the cycle.
    pub roots: BTreeSet<Address>,
    pub reachable: BTreeSet<Address>,
    /// Candidates for deletion after the write-race guard.
    pub unreachable: BTreeSet<Address>,
    /// Candidates that became reachable from a root added during the cycle.
    pub protected: BTreeSet<Address>,
    pub deleted: BTreeSet<Address>,
    /// Candidates left for a later cycle by `max_deletions`.
    pub deferred: BTreeSet<Address>,
    pub diagnostics: Vec<GcDiagnostic>,
    /// Per-object failures. Already-deleted objects stay deleted.
    pub errors: Vec<String>,
}

impl GcReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Default)]
struct Mark {
    reachable: HashSet<Address>,
    diagnostics: Vec<GcDiagnostic>,
}

impl Mark {
    /// Problems that make deleting anything unsafe: a root that does not
    /// exist, or a reachable object whose edges could not be followed.
    fn unsafe_issues(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Unreadable || d.referenced_by.is_none())
            .map(ToString::to_string)
            .collect()
    }
}

/// Mark-and-sweep collector over an object store and its references.
///
/// A cycle runs `Idle -> Marking -> Sweeping -> Idle`; a dry run returns to
/// `Idle` straight after marking. Unreadable objects are kept: they are
/// marked reachable even though their edges cannot be followed.
pub struct GarbageCollector<'a> {
    objects: &'a dyn ObjectStore,
    refs: &'a dyn RefStore,
    phase: GcPhase,
}

impl<'a> GarbageCollector<'a> {
    pub fn new(objects: &'a dyn ObjectStore, refs: &'a dyn RefStore) -> Self {
        Self {
            objects,
            refs,
            phase: GcPhase::Idle,
        }
    }

    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    /// Run one full cycle.
    pub fn collect(&mut self, options: &GcOptions) -> GcResult<GcReport> {
        let result = self.run(options);
        self.enter(GcPhase::Idle);
        result
    }

    /// Recompute the mark and fail closed if sweeping would be unsafe.
    pub fn verify_gc_safety(&self, pins: &[Address]) -> GcResult<()> {
        let roots = self.capture_roots(pins)?;
        let mut mark = Mark::default();
        self.mark_from(roots.iter().map(|root| (*root, None)), &mut mark);
        let issues = mark.unsafe_issues();
        if issues.is_empty() {
            debug!(roots = roots.len(), reachable = mark.reachable.len(), "gc safety verified");
            Ok(())
        } else {
            warn!(issues = issues.len(), "gc safety check failed");
            Err(GcError::Unsafe { issues })
        }
    }

    fn enter(&mut self, phase: GcPhase) {
        if self.phase != phase {
            info!(from = %self.phase, to = %phase, "gc phase");
            self.phase = phase;
        }
    }

    fn run(&mut self, options: &GcOptions) -> GcResult<GcReport> {
        let roots = self.capture_roots(&options.pins)?;
        self.enter(GcPhase::Marking);
        info!(roots = roots.len(), dry_run = options.dry_run, "gc started");

        let mut mark = Mark::default();
        self.mark_from(roots.iter().map(|root| (*root, None)), &mut mark);

        if !options.dry_run && options.require_safe_roots {
            let issues = mark.unsafe_issues();
            if !issues.is_empty() {
                warn!(issues = issues.len(), "gc refused: unsafe roots");
                return Err(GcError::Unsafe { issues });
            }
        }

        let mut report = GcReport {
            dry_run: options.dry_run,
            ..GcReport::default()
        };

        let mut candidates = BTreeSet::new();
        for item in self.objects.list()? {
            match item {
                Ok(address) if !mark.reachable.contains(&address) => {
                    candidates.insert(address);
                }
                Ok(_) => {}
                Err(e) => report.errors.push(format!("listing: {e}")),
            }
        }

        // Write-race guard: trace roots that appeared since capture, and
        // retrace edges that dangled during the mark in case their targets
        // have been written. Anything reached is withdrawn from the
        // candidates.
        let refreshed = self.capture_roots(&options.pins)?;
        let late: Vec<Address> = refreshed.difference(&roots).copied().collect();
        let dangling: Vec<(Address, Option<Address>)> = mark
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Missing)
            .map(|d| (d.address, d.referenced_by))
            .collect();
        mark.diagnostics.retain(|d| d.kind != DiagnosticKind::Missing);

        let seeds = late.iter().map(|root| (*root, None)).chain(dangling);
        for address in self.mark_from(seeds, &mut mark) {
            if candidates.remove(&address) {
                report.protected.insert(address);
            }
        }
        if !late.is_empty() || !report.protected.is_empty() {
            info!(
                new_roots = late.len(),
                protected = report.protected.len(),
                "roots changed during gc"
            );
        }

        report.roots = roots;
        report.reachable = mark.reachable.into_iter().collect();
        report.diagnostics = mark.diagnostics;
        report.unreachable = candidates.clone();

        if options.dry_run {
            info!(
                reachable = report.reachable.len(),
                candidates = report.unreachable.len(),
                "gc dry run complete"
            );
            return Ok(report);
        }

        self.enter(GcPhase::Sweeping);
        let limit = options.max_deletions.unwrap_or(usize::MAX);
        let mut attempted = 0usize;
        for address in candidates {
            if attempted >= limit {
                report.deferred.insert(address);
                continue;
            }
            attempted += 1;
            match self.objects.delete(&address) {
                Ok(true) => {
                    debug!(address = %address.short_hex(), "deleted unreachable object");
                    report.deleted.insert(address);
                }
                Ok(false) => {
                    warn!(address = %address.short_hex(), "candidate already gone");
                    report.errors.push(format!("{address}: already gone"));
                }
                Err(e) => {
                    warn!(address = %address.short_hex(), error = %e, "failed to delete");
                    report.errors.push(format!("{address}: {e}"));
                }
            }
        }

        info!(
            reachable = report.reachable.len(),
            deleted = report.deleted.len(),
            deferred = report.deferred.len(),
            errors = report.errors.len(),
            "gc complete"
        );
        Ok(report)
    }

    fn capture_roots(&self, pins: &[Address]) -> GcResult<BTreeSet<Address>> {
        let mut roots: BTreeSet<Address> = self.refs.targets()?.into_iter().collect();
        roots.extend(pins.iter().copied());
        Ok(roots)
    }

    /// Breadth-first mark from `seeds`, each paired with the object that
    /// references it (`None` for a root), skipping anything already marked.
    /// Returns the addresses newly marked by this call.
    fn mark_from(
        &self,
        seeds: impl IntoIterator<Item = (Address, Option<Address>)>,
        mark: &mut Mark,
    ) -> Vec<Address> {
        let mut newly = Vec::new();
        let mut work: VecDeque<(Address, Option<Address>)> = seeds.into_iter().collect();

        while let Some((address, referenced_by)) = work.pop_front() {
            if mark.reachable.contains(&address) {
                continue;
            }
            match self.objects.exists(&address) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(address = %address.short_hex(), "gc: referenced object missing");
                    mark.diagnostics.push(GcDiagnostic {
                        address,
                        referenced_by,
                        kind: DiagnosticKind::Missing,
                        detail: "missing".to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    warn!(address = %address.short_hex(), error = %e, "gc: cannot stat object");
                    mark.reachable.insert(address);
                    newly.push(address);
                    mark.diagnostics.push(GcDiagnostic {
                        address,
                        referenced_by,
                        kind: DiagnosticKind::Unreadable,
                        detail: e.to_string(),
                    });
                    continue;
                }
            }

            mark.reachable.insert(address);
            newly.push(address);
            match self.objects.get_object(&address) {
                Ok(object) => {
                    let from = Some(address);
                    work.extend(object.references().into_iter().map(|child| (child, from)));
                }
                Err(e) => {
                    warn!(address = %address.short_hex(), error = %e, "gc: cannot trace object");
                    mark.diagnostics.push(GcDiagnostic {
                        address,
                        referenced_by,
                        kind: DiagnosticKind::Unreadable,
                        detail: e.to_string(),
                    });
                }
            }
        }
        newly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_refs::{InMemoryRefStore, RefResult};
    use cairn_crypto::ContentHasher;
    use cairn_store::{
        AddressIter, Blob, Bundle, InMemoryObjectStore, Object, Snapshot, StoreResult, Tree,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Fixture {
        objects: InMemoryObjectStore,
        refs: InMemoryRefStore,
        bundles: Vec<Address>,
        snapshots: Vec<Address>,
        garbage: Address,
    }

    /// Two-snapshot chain under `main`, plus one unreferenced blob.
    fn fixture() -> Fixture {
        let objects = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        let h1 = objects.put_bundle(&Bundle::new(json!({"sequence": 1}))).unwrap();
        let h2 = objects.put_bundle(&Bundle::new(json!({"sequence": 2}))).unwrap();
        let s1 = objects.put_snapshot(&Snapshot::new(vec![h1], None)).unwrap();
        let s2 = objects.put_snapshot(&Snapshot::new(vec![h2], Some(s1))).unwrap();
        refs.write_ref("main", &s2).unwrap();
        let garbage = objects.put_blob(&Blob::new(b"orphan".to_vec())).unwrap();
        Fixture {
            objects,
            refs,
            bundles: vec![h1, h2],
            snapshots: vec![s1, s2],
            garbage,
        }
    }

    /// Adds a reference the second time references are listed, as a
    /// concurrent writer would between mark and sweep.
    struct RacingRefs {
        inner: InMemoryRefStore,
        calls: AtomicUsize,
        late: (String, Address),
    }

    impl RefStore for RacingRefs {
        fn read_ref(&self, name: &str) -> RefResult<Option<Address>> {
            self.inner.read_ref(name)
        }

        fn write_ref(&self, name: &str, target: &Address) -> RefResult<()> {
            self.inner.write_ref(name, target)
        }

        fn delete_ref(&self, name: &str) -> RefResult<bool> {
            self.inner.delete_ref(name)
        }

        fn list_refs(&self) -> RefResult<Vec<(String, Address)>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                self.inner.write_ref(&self.late.0, &self.late.1)?;
            }
            self.inner.list_refs()
        }
    }

    /// Writes a pending object when the store is listed, as a concurrent
    /// writer would between mark and sweep.
    struct LateWriter {
        inner: InMemoryObjectStore,
        pending: Mutex<Option<Vec<u8>>>,
    }

    impl ObjectStore for LateWriter {
        fn hasher(&self) -> ContentHasher {
            self.inner.hasher()
        }

        fn put_at(&self, address: &Address, bytes: &[u8]) -> StoreResult<()> {
            self.inner.put_at(address, bytes)
        }

        fn get(&self, address: &Address) -> StoreResult<Vec<u8>> {
            self.inner.get(address)
        }

        fn exists(&self, address: &Address) -> StoreResult<bool> {
            self.inner.exists(address)
        }

        fn list(&self) -> StoreResult<AddressIter<'_>> {
            if let Some(bytes) = self.pending.lock().unwrap().take() {
                self.inner.put(&bytes)?;
            }
            self.inner.list()
        }

        fn delete(&self, address: &Address) -> StoreResult<bool> {
            self.inner.delete(address)
        }
    }

    // -----------------------------------------------------------------------
    // Mark and sweep
    // -----------------------------------------------------------------------

    #[test]
    fn sweeps_unreferenced_and_keeps_history() {
        let f = fixture();
        let mut gc = GarbageCollector::new(&f.objects, &f.refs);
        let report = gc.collect(&GcOptions::default()).unwrap();

        assert_eq!(report.deleted, BTreeSet::from([f.garbage]));
        assert_eq!(report.unreachable, BTreeSet::from([f.garbage]));
        assert_eq!(report.reachable.len(), 4);
        assert!(report.is_clean());
        for address in f.bundles.iter().chain(&f.snapshots) {
            assert!(f.objects.exists(address).unwrap());
        }
        assert!(!f.objects.exists(&f.garbage).unwrap());
        assert_eq!(gc.phase(), GcPhase::Idle);
    }

    #[test]
    fn dry_run_deletes_nothing() {
        let f = fixture();
        let mut gc = GarbageCollector::new(&f.objects, &f.refs);
        let report = gc.collect(&GcOptions::dry_run()).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.unreachable, BTreeSet::from([f.garbage]));
        assert!(report.deleted.is_empty());
        assert!(f.objects.exists(&f.garbage).unwrap());
        assert_eq!(gc.phase(), GcPhase::Idle);
    }

    #[test]
    fn deleting_the_ref_frees_the_chain() {
        let f = fixture();
        f.refs.delete_ref("main").unwrap();
        let report = GarbageCollector::new(&f.objects, &f.refs)
            .collect(&GcOptions::default())
            .unwrap();
        assert_eq!(report.deleted.len(), 5);
        assert!(f.objects.is_empty());
    }

    #[test]
    fn pins_are_roots() {
        let f = fixture();
        let options = GcOptions::default().with_pins([f.garbage]);
        let report = GarbageCollector::new(&f.objects, &f.refs).collect(&options).unwrap();
        assert!(report.deleted.is_empty());
        assert!(report.roots.contains(&f.garbage));
    }

    #[test]
    fn tree_children_are_reachable() {
        let f = fixture();
        let tree = f
            .objects
            .put_tree(&Tree::new().with_child("orphan", f.garbage))
            .unwrap();
        f.refs.delete_ref("main").unwrap();
        let options = GcOptions::default().with_pins([tree]);
        let report = GarbageCollector::new(&f.objects, &f.refs).collect(&options).unwrap();
        assert_eq!(report.reachable, BTreeSet::from([tree, f.garbage]));
        assert_eq!(report.deleted.len(), 4);
    }

    #[test]
    fn max_deletions_defers_the_rest() {
        let f = fixture();
        f.objects.put_blob(&Blob::new(b"two".to_vec())).unwrap();
        f.objects.put_blob(&Blob::new(b"three".to_vec())).unwrap();
        let options = GcOptions::default().with_max_deletions(2);
        let report = GarbageCollector::new(&f.objects, &f.refs).collect(&options).unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.deferred.len(), 1);
        assert_eq!(f.objects.len(), 5);
    }

    // -----------------------------------------------------------------------
    // Damaged graphs
    // -----------------------------------------------------------------------

    #[test]
    fn broken_snapshot_does_not_block_collection() {
        let f = fixture();
        f.objects.delete(&f.bundles[0]).unwrap();
        let report = GarbageCollector::new(&f.objects, &f.refs)
            .collect(&GcOptions::default())
            .unwrap();
        assert_eq!(report.deleted, BTreeSet::from([f.garbage]));
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Missing);
        assert_eq!(report.diagnostics[0].referenced_by, Some(f.snapshots[0]));
    }

    #[test]
    fn dangling_root_fails_closed() {
        let f = fixture();
        let absent = f.objects.hasher().hash(b"absent");
        f.refs.write_ref("gone", &absent).unwrap();

        let mut gc = GarbageCollector::new(&f.objects, &f.refs);
        assert!(matches!(
            gc.collect(&GcOptions::default()),
            Err(GcError::Unsafe { ref issues }) if issues.len() == 1
        ));
        assert!(f.objects.exists(&f.garbage).unwrap());
        assert_eq!(gc.phase(), GcPhase::Idle);

        let report = gc.collect(&GcOptions::default().allow_unsafe_roots()).unwrap();
        assert_eq!(report.deleted, BTreeSet::from([f.garbage]));
    }

    #[test]
    fn unreadable_objects_are_kept() {
        let f = fixture();
        f.objects
            .overwrite_unchecked(&f.snapshots[1], b"junk".to_vec())
            .unwrap();
        let mut gc = GarbageCollector::new(&f.objects, &f.refs);
        assert!(matches!(
            gc.collect(&GcOptions::default()),
            Err(GcError::Unsafe { .. })
        ));

        let report = gc.collect(&GcOptions::default().allow_unsafe_roots()).unwrap();
        assert!(report.reachable.contains(&f.snapshots[1]));
        assert!(!report.deleted.contains(&f.snapshots[1]));
        assert!(f.objects.exists(&f.snapshots[1]).unwrap());
    }

    #[test]
    fn safety_check() {
        let f = fixture();
        let gc = GarbageCollector::new(&f.objects, &f.refs);
        gc.verify_gc_safety(&[]).unwrap();

        let absent = f.objects.hasher().hash(b"absent");
        assert!(matches!(
            gc.verify_gc_safety(&[absent]),
            Err(GcError::Unsafe { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Write-race guard
    // -----------------------------------------------------------------------

    #[test]
    fn late_reference_protects_candidates() {
        let f = fixture();
        let h3 = f.objects.put_bundle(&Bundle::new(json!({"sequence": 3}))).unwrap();
        let s3 = f
            .objects
            .put_snapshot(&Snapshot::new(vec![h3], Some(f.snapshots[1])))
            .unwrap();
        let refs = RacingRefs {
            inner: f.refs,
            calls: AtomicUsize::new(0),
            late: ("feature".to_string(), s3),
        };

        let report = GarbageCollector::new(&f.objects, &refs)
            .collect(&GcOptions::default())
            .unwrap();
        assert_eq!(report.protected, BTreeSet::from([h3, s3]));
        assert_eq!(report.deleted, BTreeSet::from([f.garbage]));
        assert!(f.objects.exists(&s3).unwrap());
        assert!(f.objects.exists(&h3).unwrap());
    }

    #[test]
    fn object_written_during_mark_is_kept() {
        let objects = InMemoryObjectStore::new();
        let refs = InMemoryRefStore::new();
        let h1 = objects.put_bundle(&Bundle::new(json!({"sequence": 1}))).unwrap();
        let late = Object::Bundle(Bundle::new(json!({"sequence": 2})))
            .encode()
            .unwrap();
        let h2 = objects.hasher().hash(&late);
        let s1 = objects.put_snapshot(&Snapshot::new(vec![h1, h2], None)).unwrap();
        refs.write_ref("main", &s1).unwrap();
        let garbage = objects.put_blob(&Blob::new(b"orphan".to_vec())).unwrap();

        let store = LateWriter {
            inner: objects,
            pending: Mutex::new(Some(late)),
        };
        let report = GarbageCollector::new(&store, &refs)
            .collect(&GcOptions::default())
            .unwrap();

        assert_eq!(report.protected, BTreeSet::from([h2]));
        assert_eq!(report.deleted, BTreeSet::from([garbage]));
        assert!(report.reachable.contains(&h2));
        assert!(report.diagnostics.is_empty());
        assert!(store.exists(&h2).unwrap());
    }

    #[test]
    fn guard_applies_to_dry_runs() {
        let f = fixture();
        let refs = RacingRefs {
            inner: f.refs,
            calls: AtomicUsize::new(0),
            late: ("keep".to_string(), f.garbage),
        };
        let report = GarbageCollector::new(&f.objects, &refs)
            .collect(&GcOptions::dry_run())
            .unwrap();
        assert_eq!(report.protected, BTreeSet::from([f.garbage]));
        assert!(report.unreachable.is_empty());
    }
}
