//! Open addressing tables that store bit-packed values directly in their slots.
use std::{fmt, hash::Hash, marker::PhantomData};

use valla_bits::{IntVec, UintCodable};

use crate::{
    group::{self, Group, EMPTY, GROUP_WIDTH},
    growth_info::GrowthInfo,
    hash::hash_value,
};

/// Number of hash bits stored in the control byte, taken from the top of the hash.
const TAG_SHIFT: u32 = u64::BITS - 7;

#[inline(always)]
fn tag(hash: u64) -> u8 {
    (hash >> TAG_SHIFT) as u8
}

/// The probing engine shared by [`SuccinctFlatHashSet`] and
/// [`SuccinctIndexedHashSet`][crate::SuccinctIndexedHashSet].
///
/// Every occupied slot stores one packed value of [`value_width`][Self::value_width] bits. The
/// table does not know how values relate to the hashes they were inserted with, so every
/// operation takes the hash and an equality closure, and operations that move values take a
/// closure recomputing a value's hash.
#[derive(Clone)]
pub struct RawFlatTable {
    growth: GrowthInfo,
    ctrl: Vec<u8>,
    values: IntVec,
}

impl fmt::Debug for RawFlatTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Default for RawFlatTable {
    fn default() -> Self {
        Self::with_capacity_and_width(GROUP_WIDTH, 1)
    }
}

impl RawFlatTable {
    /// Returns an empty table with the given capacity and value width.
    ///
    /// Panics unless `capacity` is a power of two of at least [`GROUP_WIDTH`].
    pub fn with_capacity_and_width(capacity: usize, width: u32) -> Self {
        Self {
            growth: GrowthInfo::new(capacity),
            ctrl: group::empty_ctrl(capacity),
            values: IntVec::zeroed(width, capacity),
        }
    }

    /// Number of stored values.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.growth.size()
    }

    /// Returns `true` if no values are stored.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.growth.capacity()
    }

    /// Width of the stored values in bits.
    #[inline(always)]
    pub fn value_width(&self) -> u32 {
        self.values.width()
    }

    /// Capacity and load bookkeeping.
    #[inline(always)]
    pub fn growth_info(&self) -> &GrowthInfo {
        &self.growth
    }

    fn probe(&self, hash: u64, mut eq: impl FnMut(u64) -> bool) -> Result<usize, usize> {
        let mask = self.growth.mask();
        let tag = tag(hash);
        let mut pos = hash as usize & mask;
        for _ in 0..=self.capacity() / GROUP_WIDTH {
            let group = Group::load(&self.ctrl, pos);
            for offset in group.match_byte(tag) {
                let candidate = (pos + offset) & mask;
                if eq(self.values.get(candidate)) {
                    return Ok(candidate);
                }
            }
            if let Some(offset) = group.match_empty().lowest() {
                return Err((pos + offset) & mask);
            }
            pos = (pos + GROUP_WIDTH) & mask;
        }
        unreachable!("probe sequence without vacant slot")
    }

    /// Returns the stored value accepted by `eq`.
    #[inline]
    pub fn find(&self, hash: u64, eq: impl FnMut(u64) -> bool) -> Option<u64> {
        self.probe(hash, eq).ok().map(|pos| self.values.get(pos))
    }

    /// Returns the stored value accepted by `eq`, or inserts `value` and returns it.
    ///
    /// The second component is `true` if `value` was inserted. Doubles the capacity first if the
    /// table is full, recomputing the hash of every stored value using `hasher`.
    ///
    /// Panics if `value` does not fit into the value width.
    pub fn insert_with(
        &mut self,
        hash: u64,
        value: u64,
        mut eq: impl FnMut(u64) -> bool,
        hasher: impl Fn(u64) -> u64,
    ) -> (u64, bool) {
        let pos = match self.probe(hash, &mut eq) {
            Ok(pos) => return (self.values.get(pos), false),
            Err(_) if self.growth.growth_left() == 0 => {
                self.grow(hasher);
                let Err(pos) = self.probe(hash, |_| false) else {
                    unreachable!()
                };
                pos
            }
            Err(pos) => pos,
        };
        self.claim(pos, hash, value);
        (value, true)
    }

    fn claim(&mut self, pos: usize, hash: u64, value: u64) {
        self.values.set(pos, value);
        self.growth.increment_size();
        group::set_ctrl(&mut self.ctrl, self.growth.mask(), pos, tag(hash));
    }

    /// Doubles the capacity, moving every value to its position in the larger table.
    pub fn grow(&mut self, hasher: impl Fn(u64) -> u64) {
        let mut grown =
            Self::with_capacity_and_width(self.capacity() * 2, self.values.width());
        for value in self.iter() {
            let hash = hasher(value);
            let Err(pos) = grown.probe(hash, |_| false) else {
                unreachable!()
            };
            grown.claim(pos, hash, value);
        }
        *self = grown;
    }

    /// Replaces every stored value by `f(value)` and changes the value width to `width`.
    ///
    /// The hash of a value must not change, as values stay in place.
    pub fn map_values(&mut self, width: u32, mut f: impl FnMut(u64) -> u64) {
        let mut values = IntVec::zeroed(width, self.capacity());
        for pos in 0..self.capacity() {
            if group::is_full(self.ctrl[pos]) {
                values.set(pos, f(self.values.get(pos)));
            }
        }
        self.values = values;
    }

    /// Removes all values and shrinks the table to the smallest capacity.
    pub fn clear(&mut self) {
        *self = Self::with_capacity_and_width(GROUP_WIDTH, self.values.width());
    }

    /// Returns an iterator over all stored values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.capacity())
            .filter(|&pos| group::is_full(self.ctrl[pos]))
            .map(|pos| self.values.get(pos))
    }

    /// Heap memory used by the table in bytes.
    pub fn mem_usage(&self) -> usize {
        self.ctrl.capacity() + self.values.mem_usage()
    }

    #[cfg(test)]
    pub(crate) fn check(&self, hasher: impl Fn(u64) -> u64) {
        let mut occupied = 0;
        for pos in 0..self.capacity() {
            if group::is_full(self.ctrl[pos]) {
                occupied += 1;
                let value = self.values.get(pos);
                assert_eq!(self.ctrl[pos], tag(hasher(value)));
                assert_eq!(self.probe(hasher(value), |found| found == value), Ok(pos));
            } else {
                assert_eq!(self.ctrl[pos], EMPTY);
            }
        }
        assert_eq!(occupied, self.len());
    }
}

/// A hash set storing the encoding of each key in a packed slot.
///
/// The part width grows with the widest inserted key, so small keys take few bits. Unlike
/// [`CompactHashIdMap`][crate::CompactHashIdMap] the slot keeps the whole encoded key, which makes
/// lookups independent of the table's hash function and keys never move when the width changes.
pub struct SuccinctFlatHashSet<K> {
    table: RawFlatTable,
    width: u32,
    _phantom: PhantomData<K>,
}

impl<K> Clone for SuccinctFlatHashSet<K> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            width: self.width,
            _phantom: PhantomData,
        }
    }
}

impl<K: UintCodable> Default for SuccinctFlatHashSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: UintCodable> fmt::Debug for SuccinctFlatHashSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: UintCodable> SuccinctFlatHashSet<K> {
    /// Returns an empty set with a part width of one bit.
    pub fn new() -> Self {
        Self {
            table: RawFlatTable::with_capacity_and_width(GROUP_WIDTH, K::PARTS),
            width: 1,
            _phantom: PhantomData,
        }
    }

    /// Number of keys.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of slots.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Current part width in bits.
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns an iterator over all keys in slot order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.table.iter().map(|code| K::decode(code, self.width))
    }

    /// Heap memory used by the set in bytes.
    pub fn mem_usage(&self) -> usize {
        self.table.mem_usage()
    }
}

impl<K: UintCodable + Hash> SuccinctFlatHashSet<K> {
    fn widen(&mut self, width: u32) {
        log::debug!(
            "widening {} flat set keys, part width {} -> {width}",
            self.len(),
            self.width
        );
        let old_width = self.width;
        self.table.map_values(K::PARTS * width, |code| {
            K::decode(code, old_width).encode(width)
        });
        self.width = width;
    }

    /// Inserts a key, returning `true` if it was not present.
    pub fn insert(&mut self, key: K) -> bool {
        let required = key.part_width();
        if required > self.width {
            self.widen(required);
        }
        let width = self.width;
        self.table
            .insert_with(
                hash_value(key),
                key.encode(width),
                |code| K::decode(code, width) == key,
                |code| hash_value(K::decode(code, width)),
            )
            .1
    }

    /// Returns `true` if the key is present.
    pub fn contains(&self, key: &K) -> bool {
        if key.part_width() > self.width {
            return false;
        }
        let code = key.encode(self.width);
        self.table.find(hash_value(*key), |found| found == code).is_some()
    }

    #[cfg(test)]
    fn check(&self) {
        let width = self.width;
        self.table
            .check(|code| hash_value(K::decode(code, width)));
    }
}

impl<K: UintCodable + Hash> Extend<K> for SuccinctFlatHashSet<K> {
    fn extend<T: IntoIterator<Item = K>>(&mut self, iter: T) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: UintCodable + Hash> FromIterator<K> for SuccinctFlatHashSet<K> {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use crate::hash::DefaultBuildHasher;
    use valla_bits::Slot;

    #[test]
    fn matches_hash_set() {
        let mut set = SuccinctFlatHashSet::<Slot<u32>>::new();
        let mut reference = hashbrown::HashSet::<Slot<u32>, DefaultBuildHasher>::default();
        let mut rng = rand_pcg::Pcg64::seed_from_u64(3);
        for round in 0..5000 {
            let bits = rng.gen_range(1..=(1 + round / 200).min(32));
            let key = Slot::new(
                rng.gen::<u32>() >> (32 - bits),
                rng.gen::<u32>() >> (32 - bits),
            );
            assert_eq!(set.insert(key), reference.insert(key));
            assert!(set.contains(&key));
        }
        set.check();
        assert_eq!(set.len(), reference.len());
        assert!(set.len() <= set.capacity() / 8 * 7);
        let keys: hashbrown::HashSet<_, DefaultBuildHasher> = set.iter().collect();
        assert_eq!(keys, reference);
        assert!(!set.contains(&Slot::new(u32::MAX, u32::MAX)));
    }

    #[test]
    fn narrow_keys_stay_narrow() {
        let set: SuccinctFlatHashSet<u64> = (0..1000).collect();
        assert_eq!(set.width(), 10);
        set.check();
        let wide: SuccinctFlatHashSet<u64> = (0..1000).map(|i| i << 40).collect();
        assert_eq!(wide.width(), 50);
        assert!(wide.mem_usage() > set.mem_usage());
    }

    #[test]
    fn raw_table_values_follow_their_hash() {
        let hasher = |value: u64| hash_value(value % 1000);
        let mut table = RawFlatTable::default();
        table.map_values(20, |value| value);
        for value in 0..3000u64 {
            let (found, inserted) = table.insert_with(
                hasher(value),
                value,
                |found| found % 1000 == value % 1000,
                hasher,
            );
            assert_eq!(inserted, value < 1000);
            assert_eq!(found, value % 1000);
        }
        assert_eq!(table.len(), 1000);
        table.check(hasher);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.value_width(), 20);
    }
}
