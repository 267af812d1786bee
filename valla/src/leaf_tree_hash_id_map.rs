//! Deduplicated storage of sequences of arbitrary values.
use std::{
    fmt,
    hash::{BuildHasher, Hash},
};

use valla_bits::Slot;

use crate::{
    compact_tree_hash_id_map::CompactTreeHashIdMap, error::StoreError, hash::DefaultBuildHasher,
    leaf_table::LeafTable,
};

/// A store of sequences of arbitrary hashable values.
///
/// Each distinct value is interned once in a [`LeafTable`], and the sequence of value ids is
/// stored in a [`CompactTreeHashIdMap`]. Sequences are stored in the given order, which need not
/// be sorted.
pub struct LeafTreeHashIdMap<T, S = DefaultBuildHasher> {
    leaves: LeafTable<T, S>,
    tree: CompactTreeHashIdMap<u32>,
    ids: Vec<u32>,
}

impl<T, S: Default> Default for LeafTreeHashIdMap<T, S> {
    fn default() -> Self {
        Self {
            leaves: LeafTable::default(),
            tree: CompactTreeHashIdMap::new(),
            ids: Vec::new(),
        }
    }
}

impl<T, S> fmt::Debug for LeafTreeHashIdMap<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafTreeHashIdMap")
            .field("len", &self.len())
            .field("leaf_count", &self.leaf_count())
            .field("tree", &self.tree)
            .finish()
    }
}

impl<T, S: Default> LeafTreeHashIdMap<T, S> {
    /// Returns a map containing only the empty sequence.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T, S> LeafTreeHashIdMap<T, S> {
    /// Number of stored sequences, including the empty sequence.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Always `false`, the empty sequence is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of distinct values.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// The table of distinct values.
    pub fn leaves(&self) -> &LeafTable<T, S> {
        &self.leaves
    }

    /// The tree map storing sequences of value ids.
    pub fn tree(&self) -> &CompactTreeHashIdMap<u32> {
        &self.tree
    }

    /// Heap memory used by the map in bytes, not counting memory owned by the values.
    pub fn mem_usage(&self) -> usize {
        self.leaves.mem_usage()
            + self.tree.mem_usage()
            + self.ids.capacity() * std::mem::size_of::<u32>()
    }
}

impl<T: Clone, S> LeafTreeHashIdMap<T, S> {
    /// Replaces the contents of `out` by a stored sequence.
    ///
    /// Panics if the slot was not returned by this map.
    pub fn read(&self, slot: Slot<u32>, out: &mut Vec<T>) {
        out.clear();
        out.extend(
            self.tree
                .iter(slot)
                .map(|id| self.leaves[id as usize].clone()),
        );
    }

    /// Returns a stored sequence.
    pub fn read_vec(&self, slot: Slot<u32>) -> Vec<T> {
        let mut out = vec![];
        self.read(slot, &mut out);
        out
    }
}

impl<T: Hash + Eq + Clone, S: BuildHasher> LeafTreeHashIdMap<T, S> {
    /// Stores a sequence unless present and returns the slot identifying it.
    ///
    /// Fails with [`StoreError::IndexOverflow`] if there are more distinct values than fit into a
    /// `u32`. Values are interned even if storing the sequence fails.
    pub fn try_insert(&mut self, values: &[T]) -> Result<Slot<u32>, StoreError> {
        self.ids.clear();
        for value in values {
            let (id, _) = self.leaves.insert_full(value.clone());
            let id = u32::try_from(id).map_err(|_| StoreError::IndexOverflow {
                value: id as u64,
                bits: u32::BITS,
            })?;
            self.ids.push(id);
        }
        self.tree.try_insert(&self.ids)
    }

    /// Stores a sequence unless present and returns the slot identifying it.
    ///
    /// Panics if [`try_insert`][Self::try_insert] fails.
    pub fn insert(&mut self, values: &[T]) -> Slot<u32> {
        self.try_insert(values)
            .unwrap_or_else(|err| panic!("{err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn strings_in_any_order() {
        let mut map = <LeafTreeHashIdMap<String>>::new();
        let words = |text: &str| -> Vec<String> { text.split(' ').map(String::from).collect() };

        let a = map.insert(&words("on table b"));
        let b = map.insert(&words("b on table"));
        let c = map.insert(&words("on table b"));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(map.leaf_count(), 3);
        assert_eq!(map.len(), 3);
        assert_eq!(map.read_vec(b), words("b on table"));
        assert_eq!(map.insert(&[]), Slot::new(0, 0));
        assert!(map.read_vec(Slot::new(0, 0)).is_empty());
    }

    #[test]
    fn random_sequences_round_trip() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(5);
        let mut map = <LeafTreeHashIdMap<(u8, char)>>::new();
        let mut stored = vec![];
        for _ in 0..500 {
            let len = rng.gen_range(0..30);
            let values: Vec<(u8, char)> = (0..len)
                .map(|_| (rng.gen_range(0..8), rng.gen_range('a'..='e')))
                .collect();
            let slot = map.insert(&values);
            stored.push((slot, values));
        }
        assert!(map.leaf_count() <= 40);
        let mut out = vec![];
        for (slot, values) in &stored {
            map.read(*slot, &mut out);
            assert_eq!(&out, values);
            assert_eq!(map.insert(values), *slot);
        }
        map.tree().check();
        map.leaves().check();
        assert!(map.mem_usage() > 0);
    }
}
