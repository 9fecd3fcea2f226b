use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cairn_crypto::{ContentHasher, HashAlgorithm};
use cairn_types::Address;

use crate::config::SnapshotPolicy;
use crate::error::{StoreError, StoreResult};
use crate::traits::{AddressIter, ObjectStore};

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Objects are held behind a `RwLock` and
/// cloned on read and write.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Address, Vec<u8>>>,
    hasher: ContentHasher,
    policy: SnapshotPolicy,
}

impl InMemoryObjectStore {
    /// Create a new empty store using BLAKE3.
    pub fn new() -> Self {
        Self::with_algorithm(HashAlgorithm::Blake3)
    }

    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            hasher: ContentHasher::new(algorithm),
            policy: SnapshotPolicy::default(),
        }
    }

    pub fn with_snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn read_map(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Address, Vec<u8>>>> {
        self.objects
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write_map(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Address, Vec<u8>>>> {
        self.objects
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.read_map().map(|map| map.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.read_map()
            .map(|map| map.values().map(|bytes| bytes.len() as u64).sum())
            .unwrap_or(0)
    }

    /// Sorted list of all stored addresses.
    pub fn all_addresses(&self) -> StoreResult<Vec<Address>> {
        let mut addresses: Vec<Address> = self.read_map()?.keys().copied().collect();
        addresses.sort();
        Ok(addresses)
    }

    /// Replace the bytes under an address without any checks.
    ///
    /// Simulates on-disk damage so integrity checks can be exercised.
    pub fn overwrite_unchecked(&self, address: &Address, bytes: Vec<u8>) -> StoreResult<()> {
        self.write_map()?.insert(*address, bytes);
        Ok(())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    fn put_at(&self, address: &Address, bytes: &[u8]) -> StoreResult<()> {
        let actual = self.hasher.hash(bytes);
        if actual != *address {
            return Err(StoreError::AddressMismatch {
                claimed: *address,
                actual,
            });
        }
        let mut map = self.write_map()?;
        match map.get(address) {
            Some(existing) if existing.as_slice() == bytes => Ok(()),
            Some(_) => Err(StoreError::ContentMismatch { address: *address }),
            None => {
                map.insert(*address, bytes.to_vec());
                Ok(())
            }
        }
    }

    fn get(&self, address: &Address) -> StoreResult<Vec<u8>> {
        let bytes = self
            .read_map()?
            .get(address)
            .cloned()
            .ok_or(StoreError::NotFound(*address))?;
        let actual = self.hasher.hash(&bytes);
        if actual != *address {
            return Err(StoreError::Corrupted {
                address: *address,
                actual,
            });
        }
        Ok(bytes)
    }

    fn exists(&self, address: &Address) -> StoreResult<bool> {
        Ok(self.read_map()?.contains_key(address))
    }

    fn list(&self) -> StoreResult<AddressIter<'_>> {
        let addresses = self.all_addresses()?;
        Ok(Box::new(addresses.into_iter().map(Ok)))
    }

    fn delete(&self, address: &Address) -> StoreResult<bool> {
        Ok(self.write_map()?.remove(address).is_some())
    }

    fn snapshot_policy(&self) -> SnapshotPolicy {
        self.policy
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .field("algorithm", &self.hasher.algorithm())
            .finish()
    }
}
