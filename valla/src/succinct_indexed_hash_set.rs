//! A packed, insertion ordered set with stable ids.
use std::{fmt, hash::Hash, marker::PhantomData};

use valla_bits::{bit_width, IntVec, Slot, Uint, UintCodable};

use crate::{hash::hash_value, root_set::RootSet, succinct_flat_hash_set::RawFlatTable};

/// An insertion ordered set of packed keys, identifying each key by its insertion index.
///
/// Keys are encoded with the current part width and stored back to back in a packed vector. A
/// [`RawFlatTable`] maps hashes to insertion indices using the fewest bits that can represent
/// every index. Growing the index table does not move keys, so ids are stable for the lifetime
/// of the set unless explicitly [relocated][Self::relocate].
pub struct SuccinctIndexedHashSet<K> {
    keys: IntVec,
    width: u32,
    index: RawFlatTable,
    _phantom: PhantomData<K>,
}

impl<K> Clone for SuccinctIndexedHashSet<K> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            width: self.width,
            index: self.index.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<K: UintCodable> Default for SuccinctIndexedHashSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: UintCodable> fmt::Debug for SuccinctIndexedHashSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K: UintCodable> SuccinctIndexedHashSet<K> {
    /// Returns an empty set.
    pub fn new() -> Self {
        Self {
            keys: IntVec::new(K::PARTS),
            width: 1,
            index: RawFlatTable::default(),
            _phantom: PhantomData,
        }
    }

    /// Number of keys.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the set is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Current part width in bits.
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the key with the given id.
    #[inline]
    pub fn get(&self, id: usize) -> Option<K> {
        (id < self.len()).then(|| K::decode(self.keys.get(id), self.width))
    }

    /// Returns an iterator over all keys ordered by id.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = K> + '_ {
        self.keys.iter().map(|code| K::decode(code, self.width))
    }

    /// Heap memory used by the set in bytes.
    pub fn mem_usage(&self) -> usize {
        self.keys.mem_usage() + self.index.mem_usage()
    }
}

impl<K: UintCodable + Hash> SuccinctIndexedHashSet<K> {
    fn widen(&mut self, width: u32) {
        let old_width = self.width;
        let mut keys = IntVec::new(K::PARTS * width);
        for code in self.keys.iter() {
            keys.push(K::decode(code, old_width).encode(width));
        }
        self.keys = keys;
        self.width = width;
    }

    /// Inserts a key unless present.
    ///
    /// Returns the id of the existing or new key, and `true` if the key was inserted.
    pub fn insert_full(&mut self, key: K) -> (usize, bool) {
        let required = key.part_width();
        if required > self.width {
            self.widen(required);
        }
        let id = self.keys.len();
        let id_width = bit_width(id as u64).max(1);
        if id_width > self.index.value_width() {
            self.index.map_values(id_width, |id| id);
        }

        let width = self.width;
        let code = key.encode(width);
        let keys = &self.keys;
        let (found, inserted) = self.index.insert_with(
            hash_value(key),
            id as u64,
            |found| keys.get(found as usize) == code,
            |found| hash_value(K::decode(keys.get(found as usize), width)),
        );
        if inserted {
            self.keys.push(code);
        }
        (found as usize, inserted)
    }

    /// Returns the id of `key` if present.
    pub fn get_index_of(&self, key: &K) -> Option<usize> {
        if key.part_width() > self.width {
            return None;
        }
        let code = key.encode(self.width);
        self.index
            .find(hash_value(*key), |found| self.keys.get(found as usize) == code)
            .map(|found| found as usize)
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.get_index_of(key).is_some()
    }

    /// Replaces every key by `f(id, key)`, keeping ids, and rebuilds the index.
    ///
    /// Panics if two keys are mapped to equal keys.
    pub fn relocate(&mut self, mut f: impl FnMut(usize, K) -> K) {
        let keys: Vec<K> = self
            .iter()
            .enumerate()
            .map(|(id, key)| f(id, key))
            .collect();
        *self = Self::new();
        for key in keys {
            let (_, inserted) = self.insert_full(key);
            assert!(inserted, "relocation mapped two keys to the same key");
        }
    }

    #[cfg(test)]
    pub(crate) fn check(&self) {
        let width = self.width;
        self.index
            .check(|id| hash_value(K::decode(self.keys.get(id as usize), width)));
        assert_eq!(self.index.len(), self.len());
        for (id, key) in self.iter().enumerate() {
            assert_eq!(self.get_index_of(&key), Some(id));
        }
    }
}

impl<K: UintCodable + Hash> Extend<K> for SuccinctIndexedHashSet<K> {
    fn extend<T: IntoIterator<Item = K>>(&mut self, iter: T) {
        for key in iter {
            self.insert_full(key);
        }
    }
}

impl<K: UintCodable + Hash> FromIterator<K> for SuccinctIndexedHashSet<K> {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<I: Uint> RootSet<I> for SuccinctIndexedHashSet<Slot<I>> {
    fn insert(&mut self, root: Slot<I>) -> usize {
        self.insert_full(root).0
    }

    fn lookup(&self, id: usize) -> Slot<I> {
        match self.get(id) {
            Some(root) => root,
            None => panic!("unknown root id {id}"),
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn relocate(&mut self, f: impl FnMut(usize, Slot<I>) -> Slot<I>) {
        SuccinctIndexedHashSet::relocate(self, f)
    }

    fn mem_usage(&self) -> usize {
        SuccinctIndexedHashSet::mem_usage(self)
    }
}
