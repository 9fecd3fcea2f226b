use std::path::{Path, PathBuf};

use cairn_crypto::HashAlgorithm;
use cairn_gc::{GarbageCollector, GcOptions, GcReport};
use cairn_refs::{validate_ref_name, FsRefStore, RefStore};
use cairn_store::layout::atomic_write;
use cairn_store::{
    Blob, Bundle, FsObjectStore, Object, ObjectKind, ObjectStore, ObjectStoreExt, Snapshot,
    StoreConfig, StoreError, StoreLayout, Tree,
};
use cairn_types::Address;
use cairn_verify::{
    check_invariants, InvariantReport, MissingReport, TamperReport, VerificationReport, Verifier,
};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::stats::StoreStatistics;

/// A snapshot store rooted at one directory.
///
/// Holds the object store and the reference store for that root. Every
/// operation is synchronous and opens and releases its own file handles, so
/// several handles (or processes) may share a root.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    config: StoreConfig,
    objects: FsObjectStore,
    refs: FsRefStore,
}

impl SnapshotStore {
    /// Create a store at `root`, or open it if it already exists with the
    /// same hash algorithm.
    pub fn init(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let layout = StoreLayout::new(root);
        let config_path = layout.config_path();

        if config_path.is_file() {
            let existing = StoreConfig::from_toml_file(&config_path)?;
            if existing.hash_algorithm != config.hash_algorithm {
                return Err(Error::Configuration(format!(
                    "store at {} uses {}, not {}",
                    layout.root().display(),
                    existing.hash_algorithm,
                    config.hash_algorithm
                )));
            }
            layout.initialize()?;
            debug!(root = %layout.root().display(), "store already initialized");
            return Ok(Self::assemble(layout, existing));
        }

        layout.initialize()?;
        let text = config.to_toml_string()?;
        atomic_write(layout.root(), &config_path, text.as_bytes(), config.fsync)
            .map_err(|e| Error::from(StoreError::Io {
                op: "write_config",
                path: config_path.clone(),
                source: e,
            }))?;
        info!(
            root = %layout.root().display(),
            algorithm = %config.hash_algorithm,
            "initialized store"
        );
        Ok(Self::assemble(layout, config))
    }

    /// Open an existing store using its persisted configuration.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = StoreLayout::new(root);
        if !layout.is_initialized() {
            return Err(Error::Configuration(format!(
                "no store at {}",
                layout.root().display()
            )));
        }
        let config = StoreConfig::from_toml_file(layout.config_path())?;
        debug!(root = %layout.root().display(), algorithm = %config.hash_algorithm, "opened store");
        Ok(Self::assemble(layout, config))
    }

    /// Open an existing store, refusing if it was created with a different
    /// hash algorithm.
    pub fn open_expecting(root: impl Into<PathBuf>, algorithm: HashAlgorithm) -> Result<Self> {
        let store = Self::open(root)?;
        if store.config.hash_algorithm != algorithm {
            return Err(Error::Configuration(format!(
                "store uses {}, caller expects {algorithm}",
                store.config.hash_algorithm
            )));
        }
        Ok(store)
    }

    fn assemble(layout: StoreLayout, config: StoreConfig) -> Self {
        let refs = FsRefStore::new(layout.refs_dir(), config.fsync);
        let objects = FsObjectStore::new(layout, &config);
        Self {
            config,
            objects,
            refs,
        }
    }

    pub fn root(&self) -> &Path {
        self.objects.layout().root()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn objects(&self) -> &FsObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &FsRefStore {
        &self.refs
    }

    // ---- Objects ----

    pub fn put_blob(&self, blob: &Blob) -> Result<Address> {
        Ok(self.objects.put_blob(blob)?)
    }

    pub fn get_blob(&self, address: &Address) -> Result<Blob> {
        Ok(self.objects.get_blob(address)?)
    }

    pub fn put_bundle(&self, bundle: &Bundle) -> Result<Address> {
        Ok(self.objects.put_bundle(bundle)?)
    }

    pub fn get_bundle(&self, address: &Address) -> Result<Bundle> {
        Ok(self.objects.get_bundle(address)?)
    }

    /// Store a snapshot. Its bundles and parent are not required to exist
    /// yet; [`verify_snapshot`](Self::verify_snapshot) checks closure.
    pub fn put_snapshot(&self, snapshot: &Snapshot) -> Result<Address> {
        Ok(self.objects.put_snapshot(snapshot)?)
    }

    pub fn get_snapshot(&self, address: &Address) -> Result<Snapshot> {
        Ok(self.objects.get_snapshot(address)?)
    }

    pub fn put_tree(&self, tree: &Tree) -> Result<Address> {
        Ok(self.objects.put_tree(tree)?)
    }

    pub fn get_tree(&self, address: &Address) -> Result<Tree> {
        Ok(self.objects.get_tree(address)?)
    }

    /// Read and decode an object of any kind.
    pub fn get_object(&self, address: &Address) -> Result<Object> {
        Ok(self.objects.get_object(address)?)
    }

    pub fn has_object(&self, address: &Address) -> Result<bool> {
        Ok(self.objects.exists(address)?)
    }

    /// Every stored address, sorted.
    pub fn list_objects(&self) -> Result<Vec<Address>> {
        let mut addresses = self.objects.list()?.collect::<std::result::Result<Vec<_>, _>>()?;
        addresses.sort();
        Ok(addresses)
    }

    // ---- References ----

    /// Point `name` at a snapshot. The target must exist and be a Snapshot.
    pub fn create_snapshot_ref(&self, name: &str, snapshot: &Address) -> Result<()> {
        validate_ref_name(name)?;
        self.objects.get_snapshot(snapshot)?;
        self.refs.write_ref(name, snapshot)?;
        info!(ref_name = name, to = %snapshot.short_hex(), "reference updated");
        Ok(())
    }

    pub fn get_snapshot_ref(&self, name: &str) -> Result<Option<Address>> {
        Ok(self.refs.read_ref(name)?)
    }

    /// Like [`get_snapshot_ref`](Self::get_snapshot_ref), failing with
    /// `ReferenceMissing` when the name is unset.
    pub fn resolve_ref(&self, name: &str) -> Result<Address> {
        self.refs
            .read_ref(name)?
            .ok_or_else(|| Error::ReferenceMissing(name.to_string()))
    }

    pub fn delete_snapshot_ref(&self, name: &str) -> Result<bool> {
        let deleted = self.refs.delete_ref(name)?;
        if deleted {
            info!(ref_name = name, "reference deleted");
        }
        Ok(deleted)
    }

    pub fn list_snapshot_refs(&self) -> Result<Vec<(String, Address)>> {
        Ok(self.refs.list_refs()?)
    }

    // ---- Verification ----

    /// Re-hash one object. Fails with `ObjectNotFound` or `ObjectCorrupted`.
    pub fn verify_object(&self, address: &Address) -> Result<()> {
        Ok(Verifier::new(&self.objects).verify_object(address)?)
    }

    /// Check a snapshot, its bundles and its whole parent chain, collecting
    /// every issue.
    pub fn verify_snapshot(&self, address: &Address) -> VerificationReport {
        Verifier::new(&self.objects).verify_snapshot(address)
    }

    pub fn verify_tree(&self, address: &Address) -> VerificationReport {
        Verifier::new(&self.objects).verify_tree(address)
    }

    pub fn detect_tampering(&self) -> Result<TamperReport> {
        Ok(Verifier::new(&self.objects).detect_tampering()?)
    }

    pub fn detect_missing_objects(&self) -> Result<MissingReport> {
        Ok(Verifier::new(&self.objects).detect_missing_objects(&self.refs)?)
    }

    pub fn check_invariants(&self) -> Result<InvariantReport> {
        Ok(check_invariants(&self.objects, &self.refs)?)
    }

    // ---- Garbage collection ----

    pub fn garbage_collect(&self, options: &GcOptions) -> Result<GcReport> {
        let mut gc = GarbageCollector::new(&self.objects, &self.refs);
        Ok(gc.collect(options)?)
    }

    /// Fails with `GarbageCollectionFailed` when a sweep would be unsafe.
    pub fn verify_gc_safety(&self, pins: &[Address]) -> Result<()> {
        Ok(GarbageCollector::new(&self.objects, &self.refs).verify_gc_safety(pins)?)
    }

    // ---- Statistics ----

    /// Counts by kind and total stored bytes. Damaged objects are counted
    /// as unreadable instead of failing the call.
    pub fn statistics(&self) -> Result<StoreStatistics> {
        let mut stats = StoreStatistics::default();
        for address in self.objects.list()? {
            let address = address?;
            match self.objects.stored_size(&address) {
                Ok(size) => stats.total_bytes += size,
                // Removed between listing and stat.
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
            stats.total_objects += 1;
            match self.objects.get_object(&address) {
                Ok(object) => *stats.objects_by_kind.entry(object.kind()).or_default() += 1,
                Err(_) => stats.unreadable += 1,
            }
        }
        stats.references = self.refs.list_refs()?.len();
        Ok(stats)
    }

    /// Count of objects of one kind.
    pub fn count(&self, kind: ObjectKind) -> Result<usize> {
        Ok(self.statistics()?.count(kind))
    }
}

impl std::fmt::Display for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SnapshotStore({}, {})",
            self.root().display(),
            self.config.hash_algorithm
        )
    }
}
