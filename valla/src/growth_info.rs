//! Capacity and load bookkeeping shared by all open addressing tables.
use crate::group::GROUP_WIDTH;

/// Size and capacity of an open addressing table with a maximal load factor of 7/8.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GrowthInfo {
    capacity: usize,
    size: usize,
    log2_capacity: u32,
    max_size: usize,
    growth_left: usize,
}

impl GrowthInfo {
    /// Returns the bookkeeping for an empty table of the given capacity.
    ///
    /// Panics unless the capacity is a power of two of at least [`GROUP_WIDTH`].
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity >= GROUP_WIDTH,
            "capacity {capacity} is not a power of two of at least {GROUP_WIDTH}"
        );
        let max_size = capacity - capacity / 8;
        Self {
            capacity,
            size: 0,
            log2_capacity: capacity.trailing_zeros(),
            max_size,
            growth_left: max_size,
        }
    }

    /// Returns the smallest valid capacity that can hold `size` entries.
    pub fn capacity_for(size: usize) -> usize {
        let mut capacity = GROUP_WIDTH;
        while capacity - capacity / 8 < size {
            capacity *= 2;
        }
        capacity
    }

    /// Number of slots.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Base 2 logarithm of the capacity.
    #[inline(always)]
    pub fn log2_capacity(&self) -> u32 {
        self.log2_capacity
    }

    /// Mask reducing a hash to a slot position.
    #[inline(always)]
    pub fn mask(&self) -> usize {
        self.capacity - 1
    }

    /// Largest number of entries before a rehash is required.
    #[inline(always)]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of entries that can be inserted before a rehash is required.
    #[inline(always)]
    pub fn growth_left(&self) -> usize {
        self.growth_left
    }

    /// Records an insertion.
    #[inline(always)]
    pub fn increment_size(&mut self) {
        assert!(self.growth_left > 0, "insertion into a full table");
        self.size += 1;
        self.growth_left -= 1;
    }
}
