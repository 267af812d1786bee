//! Open addressing hash set of packed keys that identifies keys by their position.
use std::{fmt, marker::PhantomData};

use hashbrown::HashMap;
use valla_bits::{BijectiveHash, IntVec, UintCodable};

use crate::{
    error::StoreError,
    group::{self, Group, EMPTY, GROUP_WIDTH},
    growth_info::GrowthInfo,
    hash::DefaultBuildHasher,
};

/// Number of hash bits stored in the control byte.
const CTRL_BITS: u32 = 7;
const CTRL_MASK: u64 = (1 << CTRL_BITS) - 1;

/// Displacement byte marking a displacement stored in the overflow table.
const OVERFLOW: u8 = u8::MAX;

/// An open addressing hash set that assigns each distinct key an id, its slot position.
///
/// Keys are never stored. A key is encoded into `K::PARTS * width` bits and hashed with an
/// invertible [`BijectiveHash`]. The low `log2(capacity)` bits of the hash select the key's home
/// position `r`, the remaining quotient `q` is split into the 7 low bits `q2` which become the
/// slot's control byte and the rest `q1` which is stored in a packed array. Each slot also
/// remembers its displacement from the home position, which allows recovering `r`, and thereby the
/// full hash and key, from any occupied position.
///
/// Two keys are equal exactly when their `(r, q1, q2)` triples are equal, as the hash is a
/// bijection.
///
/// Both the capacity and the part width grow on demand. Rebuilding the table for either moves
/// keys to new positions, so ids are only stable between resizes.
#[derive(Clone)]
pub struct CompactHashIdMap<K> {
    growth: GrowthInfo,
    width: u32,
    hasher: BijectiveHash,
    ctrl: Vec<u8>,
    quotients: IntVec,
    displacements: Vec<u8>,
    overflow: HashMap<usize, usize, DefaultBuildHasher>,
    _phantom: PhantomData<K>,
}

impl<K: UintCodable> Default for CompactHashIdMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: UintCodable> fmt::Debug for CompactHashIdMap<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: UintCodable> CompactHashIdMap<K> {
    /// Returns an empty map with the smallest capacity and a part width of one bit.
    pub fn new() -> Self {
        Self::with_capacity_and_width(GROUP_WIDTH, 1)
    }

    /// Returns an empty map with the given capacity and part width.
    ///
    /// Panics unless `capacity` is a power of two of at least [`GROUP_WIDTH`] and `width` is in
    /// `1..=K::MAX_PART_WIDTH`.
    pub fn with_capacity_and_width(capacity: usize, width: u32) -> Self {
        assert!(
            (1..=K::MAX_PART_WIDTH).contains(&width),
            "part width {width} is not in 1..={}",
            K::MAX_PART_WIDTH
        );
        let growth = GrowthInfo::new(capacity);
        let key_bits = K::PARTS * width;
        Self {
            growth,
            width,
            hasher: BijectiveHash::new(key_bits),
            ctrl: group::empty_ctrl(capacity),
            quotients: IntVec::zeroed(Self::quotient_width(key_bits, &growth), capacity),
            displacements: vec![0; capacity],
            overflow: Default::default(),
            _phantom: PhantomData,
        }
    }

    fn quotient_width(key_bits: u32, growth: &GrowthInfo) -> u32 {
        key_bits.saturating_sub(growth.log2_capacity() + CTRL_BITS)
    }

    /// Number of stored keys.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.growth.size()
    }

    /// Returns `true` if no keys are stored.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, all ids are below this.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.growth.capacity()
    }

    /// Current part width in bits.
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Capacity and load bookkeeping.
    #[inline(always)]
    pub fn growth_info(&self) -> &GrowthInfo {
        &self.growth
    }

    /// Returns `true` if the slot at `pos` holds a key.
    #[inline(always)]
    pub fn is_occupied(&self, pos: usize) -> bool {
        group::is_full(self.ctrl[pos])
    }

    #[inline(always)]
    fn split(&self, key: &K) -> (usize, u64, u8) {
        let hash = self.hasher.hash(key.encode(self.width));
        let home = hash as usize & self.growth.mask();
        let quotient = hash >> self.growth.log2_capacity();
        (home, quotient >> CTRL_BITS, (quotient & CTRL_MASK) as u8)
    }

    #[inline(always)]
    fn displacement(&self, pos: usize) -> usize {
        match self.displacements[pos] {
            OVERFLOW => self.overflow[&pos],
            small => small as usize,
        }
    }

    #[inline(always)]
    fn home(&self, pos: usize) -> usize {
        pos.wrapping_sub(self.displacement(pos)) & self.growth.mask()
    }

    /// Returns `Ok` with the position of the matching key or `Err` with the first vacant position
    /// of the probe sequence.
    fn probe(&self, home: usize, quotient: u64, ctrl: u8) -> Result<usize, usize> {
        let mask = self.growth.mask();
        let mut pos = home;
        for _ in 0..=self.capacity() / GROUP_WIDTH {
            let group = Group::load(&self.ctrl, pos);
            for offset in group.match_byte(ctrl) {
                let candidate = (pos + offset) & mask;
                if self.home(candidate) == home && self.quotients.get(candidate) == quotient {
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

    fn claim(&mut self, pos: usize, home: usize, quotient: u64, ctrl: u8) {
        self.growth.increment_size();
        group::set_ctrl(&mut self.ctrl, self.growth.mask(), pos, ctrl);
        self.quotients.set(pos, quotient);
        let displacement = pos.wrapping_sub(home) & self.growth.mask();
        if displacement >= OVERFLOW as usize {
            self.displacements[pos] = OVERFLOW;
            self.overflow.insert(pos, displacement);
        } else {
            self.displacements[pos] = displacement as u8;
        }
    }

    /// Returns the id of `key` if present.
    pub fn find(&self, key: &K) -> Option<usize> {
        if key.part_width() > self.width {
            return None;
        }
        let (home, quotient, ctrl) = self.split(key);
        self.probe(home, quotient, ctrl).ok()
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Inserts a key unless present, without resizing.
    ///
    /// Returns the key's id and `true` if it was newly inserted. Fails with
    /// [`StoreError::WidthExceeded`] if the key needs a larger part width and with
    /// [`StoreError::CapacityExhausted`] if the key is new but the table has no growth left.
    pub fn try_insert(&mut self, key: K) -> Result<(usize, bool), StoreError> {
        let required = key.part_width();
        if required > self.width {
            return Err(StoreError::WidthExceeded {
                required,
                available: self.width,
            });
        }
        let (home, quotient, ctrl) = self.split(&key);
        match self.probe(home, quotient, ctrl) {
            Ok(pos) => Ok((pos, false)),
            Err(_) if self.growth.growth_left() == 0 => Err(StoreError::CapacityExhausted),
            Err(pos) => {
                self.claim(pos, home, quotient, ctrl);
                Ok((pos, true))
            }
        }
    }

    /// Inserts a key unless present, widening or rehashing the table first when required.
    ///
    /// Returns the key's id and `true` if it was newly inserted. A resize moves all previously
    /// returned ids.
    ///
    /// Panics if the key needs more than `K::MAX_PART_WIDTH` bits per part.
    pub fn insert(&mut self, key: K) -> (usize, bool) {
        let required = key.part_width();
        if required > self.width {
            self.resize_width(required);
        }
        match self.try_insert(key) {
            Err(StoreError::CapacityExhausted) => {
                self.rehash();
                self.try_insert(key)
            }
            result => result,
        }
        .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Inserts a key known to be absent into a table known to have growth left.
    fn insert_new(&mut self, key: K) -> usize {
        let (home, quotient, ctrl) = self.split(&key);
        let Err(pos) = self.probe(home, quotient, ctrl) else {
            unreachable!("duplicate key while rebuilding")
        };
        self.claim(pos, home, quotient, ctrl);
        pos
    }

    /// Reconstructs the key stored at position `pos`.
    ///
    /// Panics if the slot is vacant.
    pub fn decode_key(&self, pos: usize) -> K {
        let ctrl = self.ctrl[pos];
        assert!(group::is_full(ctrl), "slot {pos} is vacant");
        let quotient = (self.quotients.get(pos) << CTRL_BITS) | ctrl as u64;
        let hash = (quotient << self.growth.log2_capacity()) | self.home(pos) as u64;
        K::decode(self.hasher.invert(hash), self.width)
    }

    /// Returns an iterator yielding the id and key of every entry in position order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            map: self,
            pos: 0,
            remaining: self.len(),
        }
    }

    fn rebuilt(&self, capacity: usize, width: u32) -> Self {
        let mut rebuilt = Self::with_capacity_and_width(capacity, width);
        for (_, key) in self.iter() {
            rebuilt.insert_new(key);
        }
        rebuilt
    }

    /// Doubles the capacity, reinserting every key.
    ///
    /// This invalidates all ids.
    pub fn rehash(&mut self) {
        let capacity = self.capacity() * 2;
        log::debug!(
            "rehashing {} keys, capacity {} -> {capacity}",
            self.len(),
            self.capacity()
        );
        *self = self.rebuilt(capacity, self.width);
    }

    /// Grows the part width to `width`, reinserting every key.
    ///
    /// Does nothing if the table is already at least as wide. Otherwise this invalidates all ids.
    /// Panics if `width` exceeds `K::MAX_PART_WIDTH`.
    pub fn resize_width(&mut self, width: u32) {
        if width <= self.width {
            return;
        }
        log::debug!(
            "widening {} keys, part width {} -> {width}",
            self.len(),
            self.width
        );
        *self = self.rebuilt(self.capacity(), width);
    }

    /// Heap memory used by the table in bytes.
    pub fn mem_usage(&self) -> usize {
        self.ctrl.capacity()
            + self.displacements.capacity()
            + self.quotients.mem_usage()
            + self.overflow.capacity() * (2 * std::mem::size_of::<usize>() + 1)
    }

    #[cfg(test)]
    pub(crate) fn check(&self) {
        let mut occupied = 0;
        for pos in 0..self.capacity() {
            assert_eq!(
                self.ctrl[pos],
                self.ctrl[(pos.wrapping_sub(GROUP_WIDTH) & self.growth.mask()) + GROUP_WIDTH]
            );
            if self.is_occupied(pos) {
                occupied += 1;
                assert_eq!(self.find(&self.decode_key(pos)), Some(pos));
            } else {
                assert_eq!(self.ctrl[pos], EMPTY);
            }
        }
        assert_eq!(occupied, self.len());
        assert!(self.len() <= self.growth.max_size());
    }
}

/// Iterator over the ids and keys of a [`CompactHashIdMap`].
///
/// This struct is created by the [`iter`](CompactHashIdMap::iter) method.
pub struct Iter<'a, K> {
    map: &'a CompactHashIdMap<K>,
    pos: usize,
    remaining: usize,
}

impl<K: UintCodable> Iterator for Iter<'_, K> {
    type Item = (usize, K);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while !self.map.is_occupied(self.pos) {
            self.pos += 1;
        }
        let pos = self.pos;
        self.pos += 1;
        self.remaining -= 1;
        Some((pos, self.map.decode_key(pos)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: UintCodable> ExactSizeIterator for Iter<'_, K> {}

impl<'a, K: UintCodable> IntoIterator for &'a CompactHashIdMap<K> {
    type Item = (usize, K);
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use valla_bits::{bijective_hash::invert_hash, Slot};

    #[test]
    fn insert_and_decode() {
        let mut map = <CompactHashIdMap<u32>>::new();
        let (a, new_a) = map.insert(5);
        let (b, new_b) = map.insert(7);
        assert!(new_a && new_b);
        assert_ne!(a, b);
        assert_eq!(map.insert(5), (a, false));
        assert_eq!(map.decode_key(a), 5);
        assert_eq!(map.decode_key(b), 7);
        assert_eq!(map.find(&7), Some(b));
        assert_eq!(map.find(&8), None);
        assert_eq!(map.len(), 2);
        map.check();
    }

    #[test]
    fn try_insert_reports_resizes() {
        let mut map = <CompactHashIdMap<Slot<u32>>>::with_capacity_and_width(16, 4);
        assert_eq!(
            map.try_insert(Slot::new(16, 0)),
            Err(StoreError::WidthExceeded {
                required: 5,
                available: 4
            })
        );
        for i in 0..14 {
            assert!(map.try_insert(Slot::new(i, i)).unwrap().1);
        }
        assert_eq!(
            map.try_insert(Slot::new(15, 0)),
            Err(StoreError::CapacityExhausted)
        );
        // Present keys are still found in a full table.
        assert!(!map.try_insert(Slot::new(3, 3)).unwrap().1);
        map.check();
    }

    #[test]
    fn grows_in_capacity_and_width() {
        let mut map = <CompactHashIdMap<Slot<u32>>>::new();
        let mut reference = hashbrown::HashSet::<Slot<u32>, DefaultBuildHasher>::default();
        let mut rng = rand_pcg::Pcg64::seed_from_u64(11);
        let mut capacity = map.capacity();
        let mut width = map.width();
        for round in 0..4000 {
            let bits = rng.gen_range(1..=32);
            let key = Slot::new(
                rng.gen::<u32>() >> (32 - bits),
                rng.gen::<u32>() >> (32 - bits),
            );
            let (id, inserted) = map.insert(key);
            assert_eq!(inserted, reference.insert(key));
            assert_eq!(map.decode_key(id), key);

            assert!(map.capacity().is_power_of_two());
            assert!(map.capacity() >= capacity);
            assert!(map.width() >= width);
            assert!(map.len() <= map.capacity() / 8 * 7);
            capacity = map.capacity();
            width = map.width();

            if round % 500 == 0 {
                map.check();
            }
        }
        assert_eq!(map.len(), reference.len());
        let decoded: hashbrown::HashSet<_, DefaultBuildHasher> = map.iter().map(|(_, key)| key).collect();
        assert_eq!(decoded, reference);
        map.check();
    }

    #[test]
    fn home_and_quotient_disambiguate_colliding_keys() {
        // Keys with small, dense values collide heavily on their control bytes.
        let mut map = <CompactHashIdMap<u16>>::with_capacity_and_width(16, 16);
        for key in 0..=u16::MAX {
            map.insert(key);
        }
        assert_eq!(map.len(), 1 << 16);
        for key in 0..=u16::MAX {
            let id = map.find(&key).unwrap();
            assert_eq!(map.decode_key(id), key);
        }
        map.check();
    }

    #[test]
    fn overflowing_displacements() {
        let capacity = 1024;
        let width = 24;
        let mut map = <CompactHashIdMap<u64>>::with_capacity_and_width(capacity, width);
        // Construct keys that all share the same home position.
        let keys: Vec<u64> = (0..600u64)
            .map(|quotient| invert_hash((quotient << 10) | 77, width))
            .collect();
        for &key in &keys {
            assert!(map.try_insert(key).unwrap().1);
        }
        assert!(!map.overflow.is_empty());
        for &key in &keys {
            let id = map.find(&key).unwrap();
            assert_eq!(map.decode_key(id), key);
        }
        map.check();

        map.rehash();
        for &key in &keys {
            assert!(map.contains(&key));
        }
        map.check();
    }

    #[test]
    #[should_panic]
    fn decode_vacant() {
        <CompactHashIdMap<u32>>::new().decode_key(3);
    }
}
