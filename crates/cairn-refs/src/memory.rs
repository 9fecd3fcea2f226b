//! In-memory reference store for testing and ephemeral use.
//!
//! [`InMemoryRefStore`] keeps all refs in a `BTreeMap` protected by a
//! `RwLock`. It implements the full [`RefStore`] trait.

use std::collections::BTreeMap;
use std::sync::RwLock;

use cairn_types::Address;

use crate::error::{RefError, RefResult};
use crate::names::validate_ref_name;
use crate::traits::RefStore;

/// An in-memory implementation of [`RefStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, Address>>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(e: impl std::fmt::Display) -> RefError {
    RefError::Poisoned(e.to_string())
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> RefResult<Option<Address>> {
        validate_ref_name(name)?;
        let refs = self.refs.read().map_err(poisoned)?;
        Ok(refs.get(name).copied())
    }

    fn write_ref(&self, name: &str, target: &Address) -> RefResult<()> {
        validate_ref_name(name)?;
        let mut refs = self.refs.write().map_err(poisoned)?;
        refs.insert(name.to_string(), *target);
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> RefResult<bool> {
        validate_ref_name(name)?;
        let mut refs = self.refs.write().map_err(poisoned)?;
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self) -> RefResult<Vec<(String, Address)>> {
        let refs = self.refs.read().map_err(poisoned)?;
        Ok(refs.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_digest([byte; 32])
    }

    // ---- Create, read, move ----

    #[test]
    fn create_and_read() {
        let store = InMemoryRefStore::new();
        store.write_ref("main", &addr(10)).unwrap();
        assert_eq!(store.read_ref("main").unwrap(), Some(addr(10)));
    }

    #[test]
    fn move_ref() {
        let store = InMemoryRefStore::new();
        store.write_ref("main", &addr(1)).unwrap();
        store.write_ref("main", &addr(2)).unwrap();
        assert_eq!(store.read_ref("main").unwrap(), Some(addr(2)));
        assert_eq!(store.list_refs().unwrap().len(), 1);
    }

    // ---- Delete ----

    #[test]
    fn delete_existing_and_missing() {
        let store = InMemoryRefStore::new();
        store.write_ref("main", &addr(1)).unwrap();
        assert!(store.delete_ref("main").unwrap());
        assert!(!store.delete_ref("main").unwrap());
        assert_eq!(store.read_ref("main").unwrap(), None);
    }

    // ---- Listing ----

    #[test]
    fn list_is_sorted() {
        let store = InMemoryRefStore::new();
        store.write_ref("b", &addr(1)).unwrap();
        store.write_ref("a", &addr(2)).unwrap();
        let names: Vec<String> = store.list_refs().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn targets_deduplicate() {
        let store = InMemoryRefStore::new();
        store.write_ref("a", &addr(5)).unwrap();
        store.write_ref("b", &addr(5)).unwrap();
        assert_eq!(store.targets().unwrap(), vec![addr(5)]);
    }

    // ---- Validation ----

    #[test]
    fn invalid_name_rejected() {
        let store = InMemoryRefStore::new();
        assert!(matches!(
            store.write_ref("bad name", &addr(1)),
            Err(RefError::InvalidName { .. })
        ));
        assert!(store.list_refs().unwrap().is_empty());
    }
}
