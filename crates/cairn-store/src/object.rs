use std::collections::{BTreeMap, HashSet};

use base64::Engine;
use cairn_crypto::to_canonical_bytes;
use cairn_types::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SnapshotPolicy;
use crate::error::{StoreError, StoreResult};

/// String labels attached to an object. Part of its content and identity.
pub type Metadata = BTreeMap<String, String>;

/// Discriminant persisted as the `type` field of every encoded object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Opaque bytes.
    Blob,
    /// Opaque structured change payload.
    Bundle,
    /// Ordered bundles plus an optional parent snapshot.
    Snapshot,
    /// Named children.
    Tree,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [Self::Blob, Self::Bundle, Self::Snapshot, Self::Tree];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Bundle => "bundle",
            Self::Snapshot => "snapshot",
            Self::Tree => "tree",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw content object. A leaf: holds no references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub metadata: Metadata,
}

impl Blob {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// One unit of externally produced change history.
///
/// The payload is stored as given; the store only requires it to be a JSON
/// object and never interprets its fields. A leaf in the reachability graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bundle {
    pub payload: Value,
    pub metadata: Metadata,
}

impl Bundle {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A point in history: ordered bundle addresses plus at most one parent.
///
/// Parents form linear chains. Because an address is computed from content
/// that already includes the parent, a snapshot can never appear in its own
/// ancestry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub bundles: Vec<Address>,
    pub parent: Option<Address>,
    pub metadata: Metadata,
}

impl Snapshot {
    pub fn new(bundles: Vec<Address>, parent: Option<Address>) -> Self {
        Self {
            bundles,
            parent,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `true` when the snapshot names no bundles and no parent.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty() && self.parent.is_none()
    }

    pub fn validate(&self, policy: SnapshotPolicy) -> StoreResult<()> {
        if policy == SnapshotPolicy::RequireContent && self.is_empty() {
            return Err(StoreError::InvalidObject(
                "snapshot must reference at least one bundle or a parent".into(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.bundles.len());
        for bundle in &self.bundles {
            if !seen.insert(bundle) {
                return Err(StoreError::InvalidObject(format!(
                    "snapshot lists bundle {bundle} more than once"
                )));
            }
        }
        if let Some(parent) = &self.parent {
            if seen.contains(parent) {
                return Err(StoreError::InvalidObject(format!(
                    "snapshot parent {parent} is also listed as a bundle"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Hierarchical grouping: child names mapped to addresses, ordered by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    pub children: BTreeMap<String, Address>,
    pub metadata: Metadata,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a child.
    pub fn with_child(mut self, name: impl Into<String>, address: Address) -> Self {
        self.children.insert(name.into(), address);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Address> {
        self.children.get(name)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn validate(&self) -> StoreResult<()> {
        for name in self.children.keys() {
            validate_child_name(name)?;
        }
        Ok(())
    }
}

fn validate_child_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidObject("tree child name must not be empty".into()));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(StoreError::InvalidObject(format!(
            "tree child name {name:?} must not contain '/' or NUL"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// Any stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Bundle(Bundle),
    Snapshot(Snapshot),
    Tree(Tree),
}

/// Encoded form: `{"type": .., "content": .., "metadata"?: ..}`.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    #[serde(rename = "type")]
    kind: ObjectKind,
    content: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: Metadata,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotContent {
    bundles: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Address>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TreeContent {
    children: BTreeMap<String, Address>,
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Bundle(_) => ObjectKind::Bundle,
            Self::Snapshot(_) => ObjectKind::Snapshot,
            Self::Tree(_) => ObjectKind::Tree,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Blob(b) => &b.metadata,
            Self::Bundle(b) => &b.metadata,
            Self::Snapshot(s) => &s.metadata,
            Self::Tree(t) => &t.metadata,
        }
    }

    /// Outgoing edges: a Snapshot's bundles then its parent, a Tree's
    /// children in name order. Blobs and Bundles have none.
    pub fn references(&self) -> Vec<Address> {
        match self {
            Self::Blob(_) | Self::Bundle(_) => Vec::new(),
            Self::Snapshot(s) => s.bundles.iter().copied().chain(s.parent).collect(),
            Self::Tree(t) => t.children.values().copied().collect(),
        }
    }

    /// Structural checks made before an object is encoded and stored.
    pub fn validate(&self, policy: SnapshotPolicy) -> StoreResult<()> {
        match self {
            Self::Blob(_) => Ok(()),
            Self::Bundle(b) => {
                if b.payload.is_object() {
                    Ok(())
                } else {
                    Err(StoreError::InvalidObject(
                        "bundle payload must be a JSON object".into(),
                    ))
                }
            }
            Self::Snapshot(s) => s.validate(policy),
            Self::Tree(t) => t.validate(),
        }
    }

    /// Canonical bytes of this object.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let content = match self {
            Self::Blob(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(&b.data)),
            Self::Bundle(b) => b.payload.clone(),
            Self::Snapshot(s) => to_value(&SnapshotContent {
                bundles: s.bundles.clone(),
                parent: s.parent,
            })?,
            Self::Tree(t) => to_value(&TreeContent {
                children: t.children.clone(),
            })?,
        };
        let envelope = Envelope {
            kind: self.kind(),
            content,
            metadata: self.metadata().clone(),
        };
        Ok(to_canonical_bytes(&envelope)?)
    }

    /// Decode stored bytes. The error string names what was malformed.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| format!("malformed envelope: {e}"))?;
        let metadata = envelope.metadata;
        match envelope.kind {
            ObjectKind::Blob => {
                let text = envelope
                    .content
                    .as_str()
                    .ok_or_else(|| "blob content must be a base64 string".to_string())?;
                let data = base64::engine::general_purpose::STANDARD
                    .decode(text)
                    .map_err(|e| format!("blob content is not valid base64: {e}"))?;
                Ok(Self::Blob(Blob { data, metadata }))
            }
            ObjectKind::Bundle => {
                if !envelope.content.is_object() {
                    return Err("bundle content must be a JSON object".into());
                }
                Ok(Self::Bundle(Bundle {
                    payload: envelope.content,
                    metadata,
                }))
            }
            ObjectKind::Snapshot => {
                let content: SnapshotContent = serde_json::from_value(envelope.content)
                    .map_err(|e| format!("malformed snapshot content: {e}"))?;
                Ok(Self::Snapshot(Snapshot {
                    bundles: content.bundles,
                    parent: content.parent,
                    metadata,
                }))
            }
            ObjectKind::Tree => {
                let content: TreeContent = serde_json::from_value(envelope.content)
                    .map_err(|e| format!("malformed tree content: {e}"))?;
                Ok(Self::Tree(Tree {
                    children: content.children,
                    metadata,
                }))
            }
        }
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl From<Bundle> for Object {
    fn from(bundle: Bundle) -> Self {
        Self::Bundle(bundle)
    }
}

impl From<Snapshot> for Object {
    fn from(snapshot: Snapshot) -> Self {
        Self::Snapshot(snapshot)
    }
}

impl From<Tree> for Object {
    fn from(tree: Tree) -> Self {
        Self::Tree(tree)
    }
}

fn to_value<T: Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::InvalidObject(e.to_string()))
}
