use std::collections::BTreeMap;

use cairn_store::ObjectKind;

/// Point-in-time summary of a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub total_objects: usize,
    /// Bytes on disk across all object files.
    pub total_bytes: u64,
    pub objects_by_kind: BTreeMap<ObjectKind, usize>,
    /// Objects that are corrupted or do not decode.
    pub unreadable: usize,
    pub references: usize,
}

impl StoreStatistics {
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.objects_by_kind.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_defaults_to_zero() {
        let mut stats = StoreStatistics::default();
        stats.objects_by_kind.insert(ObjectKind::Bundle, 2);
        assert_eq!(stats.count(ObjectKind::Bundle), 2);
        assert_eq!(stats.count(ObjectKind::Tree), 0);
    }
}
