use cairn_crypto::ContentHasher;
use cairn_types::Address;
use tracing::debug;

use crate::config::SnapshotPolicy;
use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, Bundle, Object, ObjectKind, Snapshot, Tree};

/// Lazy enumeration of stored addresses.
pub type AddressIter<'a> = Box<dyn Iterator<Item = StoreResult<Address>> + 'a>;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - An address is the digest of the bytes stored under it, for the whole
///   lifetime of the object. Reads re-check this and report damage as
///   [`StoreError::Corrupted`], never as missing.
/// - Objects are immutable. Storing identical bytes again is a no-op; storing
///   different bytes under an existing address is refused.
/// - A failed write never leaves a visible partial object.
/// - The store never interprets object contents.
pub trait ObjectStore: Send + Sync {
    /// The digest this store derives addresses with.
    fn hasher(&self) -> ContentHasher;

    /// Store bytes under an address the caller has already computed.
    ///
    /// Fails with [`StoreError::AddressMismatch`] if `bytes` do not hash to
    /// `address`, and with [`StoreError::ContentMismatch`] if `address` is
    /// already stored with different bytes.
    fn put_at(&self, address: &Address, bytes: &[u8]) -> StoreResult<()>;

    /// Read and verify an object's bytes.
    fn get(&self, address: &Address) -> StoreResult<Vec<u8>>;

    /// Check whether an address is stored, without reading or verifying it.
    fn exists(&self, address: &Address) -> StoreResult<bool>;

    /// Enumerate stored addresses as of the time of enumeration.
    ///
    /// Entries written or deleted while the iterator is live may or may not
    /// appear, but every yielded address is well formed.
    fn list(&self) -> StoreResult<AddressIter<'_>>;

    /// Delete an object. Returns `true` if it existed.
    ///
    /// Intended for garbage collection only.
    fn delete(&self, address: &Address) -> StoreResult<bool>;

    /// Rule applied to Snapshots written through [`ObjectStoreExt`].
    fn snapshot_policy(&self) -> SnapshotPolicy {
        SnapshotPolicy::default()
    }

    /// Hash `bytes`, store them, and return their address. Idempotent.
    fn put(&self, bytes: &[u8]) -> StoreResult<Address> {
        let address = self.hasher().hash(bytes);
        self.put_at(&address, bytes)?;
        Ok(address)
    }
}

/// Typed access to the four object variants.
///
/// Blanket-implemented for every [`ObjectStore`].
pub trait ObjectStoreExt: ObjectStore {
    /// Validate, encode and store any object.
    fn put_object(&self, object: &Object) -> StoreResult<Address> {
        object.validate(self.snapshot_policy())?;
        let bytes = object.encode()?;
        let address = self.put(&bytes)?;
        debug!(address = %address.short_hex(), kind = %object.kind(), size = bytes.len(), "stored object");
        Ok(address)
    }

    /// Read, verify and decode any object.
    fn get_object(&self, address: &Address) -> StoreResult<Object> {
        let bytes = self.get(address)?;
        Object::decode(&bytes).map_err(|reason| StoreError::Undecodable {
            address: *address,
            reason,
        })
    }

    fn put_blob(&self, blob: &Blob) -> StoreResult<Address> {
        self.put_object(&Object::Blob(blob.clone()))
    }

    fn get_blob(&self, address: &Address) -> StoreResult<Blob> {
        match self.get_object(address)? {
            Object::Blob(blob) => Ok(blob),
            other => Err(kind_mismatch(address, ObjectKind::Blob, &other)),
        }
    }

    fn put_bundle(&self, bundle: &Bundle) -> StoreResult<Address> {
        self.put_object(&Object::Bundle(bundle.clone()))
    }

    fn get_bundle(&self, address: &Address) -> StoreResult<Bundle> {
        match self.get_object(address)? {
            Object::Bundle(bundle) => Ok(bundle),
            other => Err(kind_mismatch(address, ObjectKind::Bundle, &other)),
        }
    }

    fn put_snapshot(&self, snapshot: &Snapshot) -> StoreResult<Address> {
        self.put_object(&Object::Snapshot(snapshot.clone()))
    }

    fn get_snapshot(&self, address: &Address) -> StoreResult<Snapshot> {
        match self.get_object(address)? {
            Object::Snapshot(snapshot) => Ok(snapshot),
            other => Err(kind_mismatch(address, ObjectKind::Snapshot, &other)),
        }
    }

    fn put_tree(&self, tree: &Tree) -> StoreResult<Address> {
        self.put_object(&Object::Tree(tree.clone()))
    }

    fn get_tree(&self, address: &Address) -> StoreResult<Tree> {
        match self.get_object(address)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(kind_mismatch(address, ObjectKind::Tree, &other)),
        }
    }
}

impl<S: ObjectStore + ?Sized> ObjectStoreExt for S {}

fn kind_mismatch(address: &Address, expected: ObjectKind, actual: &Object) -> StoreError {
    StoreError::KindMismatch {
        address: *address,
        expected,
        actual: actual.kind(),
    }
}
