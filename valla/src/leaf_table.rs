//! [`LeafTable`] interns arbitrary hashable values and assigns them stable ids.
use std::{
    borrow::Borrow,
    fmt,
    hash::{BuildHasher, Hash},
    ops::Index,
};

use valla_bits::{Slot, Uint};

use crate::{hash::DefaultBuildHasher, index_table::IndexTable, root_set::RootSet};

/// An insertion ordered set that identifies each value by its insertion index.
///
/// Values are stored in a `Vec`, supplemented by a hashbrown `HashTable` of indices for lookups.
/// Hashes are not stored but recomputed when the table grows. For tables with fewer than 4 billion
/// entries the index table stores `u32` values.
///
/// Ids never change, as values cannot be removed.
#[derive(Clone)]
pub struct LeafTable<T, S = DefaultBuildHasher> {
    index_table: IndexTable,
    items: Vec<T>,
    build_hasher: S,
}

impl<T: fmt::Debug, S> fmt::Debug for LeafTable<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T, S: Default> Default for LeafTable<T, S> {
    fn default() -> Self {
        LeafTable {
            index_table: IndexTable::default(),
            items: Vec::new(),
            build_hasher: S::default(),
        }
    }
}

impl<T, S: Default> LeafTable<T, S> {
    /// Returns an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty table with space for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        LeafTable {
            index_table: IndexTable::with_capacity(capacity),
            items: Vec::with_capacity(capacity),
            build_hasher: S::default(),
        }
    }
}

impl<T, S> LeafTable<T, S> {
    /// Returns an empty table using the provided BuildHasher.
    pub fn with_hasher(build_hasher: S) -> Self {
        LeafTable {
            index_table: IndexTable::default(),
            items: Vec::new(),
            build_hasher,
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the value with the given id, if it exists.
    pub fn get_index(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns all values ordered by id.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Returns an iterator over all values ordered by id.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Heap memory used by the table in bytes, not counting memory owned by the values.
    pub fn mem_usage(&self) -> usize {
        self.items.capacity() * std::mem::size_of::<T>() + self.index_table.mem_usage()
    }
}

impl<T: Hash + Eq, S: BuildHasher> LeafTable<T, S> {
    /// Inserts a value unless an equal value is present.
    ///
    /// Returns the id of the existing or new value, and `true` if the value was inserted.
    pub fn insert_full(&mut self, value: T) -> (usize, bool) {
        let hash = self.build_hasher.hash_one(&value);
        let items = &self.items;
        let build_hasher = &self.build_hasher;
        let (index, inserted) = self.index_table.find_or_insert(
            hash,
            items.len(),
            |index| items[index] == value,
            |index| build_hasher.hash_one(&items[index]),
        );
        if inserted {
            self.items.push(value);
        }
        (index, inserted)
    }

    /// Returns the id of the value equal to `value`, if present.
    pub fn get_index_of<Q>(&self, value: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.build_hasher.hash_one(value);
        self.index_table
            .find(hash, |index| self.items[index].borrow() == value)
    }

    /// Returns `true` if a value equal to `value` is present.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_index_of(value).is_some()
    }

    /// Replaces every value by `f(id, value)`, keeping ids.
    ///
    /// Panics if two values are mapped to equal values.
    pub fn relocate(&mut self, mut f: impl FnMut(usize, &T) -> T) {
        let items: Vec<T> = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| f(index, item))
            .collect();
        self.items.clear();
        self.index_table.clear();
        for item in items {
            let (_, inserted) = self.insert_full(item);
            assert!(inserted, "relocation mapped two values to the same value");
        }
    }

    #[cfg(test)]
    pub(crate) fn check(&self) {
        assert_eq!(self.index_table.len(), self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            assert_eq!(self.get_index_of(item), Some(index));
        }
    }
}

impl<T, S> Index<usize> for LeafTable<T, S> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T, S> IntoIterator for &'a LeafTable<T, S> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Hash + Eq, S: BuildHasher + Default> FromIterator<T> for LeafTable<T, S> {
    fn from_iter<IntoIter: IntoIterator<Item = T>>(iter: IntoIter) -> Self {
        let iter = iter.into_iter();
        let (lower_bound, _) = iter.size_hint();
        let mut table = LeafTable::with_capacity(lower_bound);
        for item in iter {
            table.insert_full(item);
        }
        table
    }
}

impl<T: Hash + Eq, S: BuildHasher> Extend<T> for LeafTable<T, S> {
    fn extend<IntoIter: IntoIterator<Item = T>>(&mut self, iter: IntoIter) {
        let iter = iter.into_iter();
        let (lower_bound, _) = iter.size_hint();
        self.items.reserve(lower_bound);
        let items = &self.items;
        let build_hasher = &self.build_hasher;
        self.index_table
            .reserve(lower_bound, |index| build_hasher.hash_one(&items[index]));
        for item in iter {
            self.insert_full(item);
        }
    }
}

impl<I: Uint, S: BuildHasher + Default> RootSet<I> for LeafTable<Slot<I>, S> {
    fn insert(&mut self, root: Slot<I>) -> usize {
        self.insert_full(root).0
    }

    fn lookup(&self, id: usize) -> Slot<I> {
        self[id]
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn relocate(&mut self, mut f: impl FnMut(usize, Slot<I>) -> Slot<I>) {
        LeafTable::relocate(self, |id, &root| f(id, root))
    }

    fn mem_usage(&self) -> usize {
        LeafTable::mem_usage(self)
    }
}
