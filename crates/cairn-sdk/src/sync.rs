//! Mapping between an external sync engine's change bundles and store
//! objects.
//!
//! Bundle payloads are opaque JSON objects. The adapter checks only that a
//! payload is a non-empty object; it never interprets the fields.

use std::collections::HashSet;
use std::path::Path;

use cairn_store::layout::atomic_write;
use cairn_store::{Bundle, Metadata, Snapshot, StoreError};
use cairn_types::Address;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::SnapshotStore;

/// Import and export of sync bundles over a [`SnapshotStore`].
pub struct SyncAdapter<'a> {
    store: &'a SnapshotStore,
}

impl SnapshotStore {
    pub fn sync(&self) -> SyncAdapter<'_> {
        SyncAdapter { store: self }
    }
}

impl<'a> SyncAdapter<'a> {
    /// Store one payload as a Bundle.
    pub fn import_bundle(&self, payload: Value, metadata: Metadata) -> Result<Address> {
        match &payload {
            Value::Object(fields) if !fields.is_empty() => {}
            Value::Object(_) => return Err(Error::InvalidObject("bundle payload is empty".into())),
            _ => {
                return Err(Error::InvalidObject(
                    "bundle payload must be a JSON object".into(),
                ))
            }
        }
        let bundle = Bundle {
            payload,
            metadata,
        };
        self.store.put_bundle(&bundle)
    }

    /// Store payloads in order, returning their addresses in the same order.
    pub fn import_bundles(&self, payloads: impl IntoIterator<Item = Value>) -> Result<Vec<Address>> {
        payloads
            .into_iter()
            .map(|payload| self.import_bundle(payload, Metadata::new()))
            .collect()
    }

    /// Snapshot existing bundles. Every bundle and the parent, when given,
    /// must already be stored.
    pub fn create_snapshot_from_bundles(
        &self,
        bundles: Vec<Address>,
        parent: Option<Address>,
        metadata: Metadata,
    ) -> Result<Address> {
        for bundle in &bundles {
            self.store
                .get_bundle(bundle)
                .map_err(|e| absent_as_invalid(e, "bundle", bundle))?;
        }
        if let Some(parent) = &parent {
            self.store
                .get_snapshot(parent)
                .map_err(|e| absent_as_invalid(e, "parent snapshot", parent))?;
        }
        let snapshot = Snapshot {
            bundles,
            parent,
            metadata,
        };
        self.store.put_snapshot(&snapshot)
    }

    /// Import payloads, snapshot them, and optionally point `name` at the
    /// new snapshot.
    pub fn import_and_snapshot(
        &self,
        payloads: Vec<Value>,
        parent: Option<Address>,
        name: Option<&str>,
        metadata: Metadata,
    ) -> Result<(Vec<Address>, Address)> {
        let bundles = self.import_bundles(payloads)?;
        let snapshot = self.create_snapshot_from_bundles(bundles.clone(), parent, metadata)?;
        if let Some(name) = name {
            self.store.create_snapshot_ref(name, &snapshot)?;
        }
        info!(
            bundles = bundles.len(),
            snapshot = %snapshot.short_hex(),
            "imported sync bundles"
        );
        Ok((bundles, snapshot))
    }

    /// Like [`import_and_snapshot`](Self::import_and_snapshot) on top of an
    /// existing snapshot.
    pub fn extend_snapshot(
        &self,
        parent: &Address,
        payloads: Vec<Value>,
        name: Option<&str>,
        metadata: Metadata,
    ) -> Result<(Vec<Address>, Address)> {
        self.store
            .get_snapshot(parent)
            .map_err(|e| absent_as_invalid(e, "parent snapshot", parent))?;
        self.import_and_snapshot(payloads, Some(*parent), name, metadata)
    }

    pub fn export_bundle(&self, address: &Address) -> Result<Value> {
        Ok(self.store.get_bundle(address)?.payload)
    }

    /// Payloads of a snapshot's own bundles, in stored order.
    pub fn export_snapshot_bundles(&self, snapshot: &Address) -> Result<Vec<Value>> {
        self.store
            .get_snapshot(snapshot)?
            .bundles
            .iter()
            .map(|bundle| self.export_bundle(bundle))
            .collect()
    }

    /// Snapshot addresses from the oldest ancestor to `snapshot`.
    pub fn snapshot_chain(&self, snapshot: &Address) -> Result<Vec<Address>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(*snapshot);
        while let Some(current) = cursor {
            if !seen.insert(current) {
                return Err(Error::InvalidObject(format!(
                    "snapshot chain loops at {current}"
                )));
            }
            chain.push(current);
            cursor = self.store.get_snapshot(&current)?.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Payloads of every bundle in the chain ending at `snapshot`, oldest
    /// snapshot first.
    pub fn export_history(&self, snapshot: &Address) -> Result<Vec<Value>> {
        let mut payloads = Vec::new();
        for address in self.snapshot_chain(snapshot)? {
            payloads.extend(self.export_snapshot_bundles(&address)?);
        }
        Ok(payloads)
    }

    /// Write a snapshot and its bundles as pretty-printed JSON.
    pub fn export_snapshot_json(&self, snapshot: &Address, path: &Path) -> Result<()> {
        let loaded = self.store.get_snapshot(snapshot)?;
        let mut bundles = Map::new();
        for address in &loaded.bundles {
            let bundle = self.store.get_bundle(address)?;
            bundles.insert(
                address.to_hex(),
                json!({ "payload": bundle.payload, "metadata": bundle.metadata }),
            );
        }
        let document = json!({
            "snapshot_address": snapshot.to_hex(),
            "snapshot": {
                "bundles": loaded.bundles.iter().map(Address::to_hex).collect::<Vec<_>>(),
                "parent": loaded.parent.map(|p| p.to_hex()),
                "metadata": loaded.metadata,
            },
            "bundles": bundles,
        });
        let text = serde_json::to_string_pretty(&document)
            .map_err(|e| Error::InvalidObject(e.to_string()))?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        atomic_write(dir, path, text.as_bytes(), self.store.config().fsync).map_err(|e| {
            Error::from(StoreError::Io {
                op: "export",
                path: path.to_path_buf(),
                source: e,
            })
        })?;
        debug!(snapshot = %snapshot.short_hex(), path = %path.display(), "exported snapshot");
        Ok(())
    }
}

/// A referenced object that is absent makes the new object invalid.
fn absent_as_invalid(error: Error, what: &str, address: &Address) -> Error {
    match error {
        Error::ObjectNotFound(_) => Error::InvalidObject(format!("{what} {address} does not exist")),
        other => other,
    }
}
