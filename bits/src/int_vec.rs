//! A bit-packed integer array with a runtime selectable entry width.
use std::fmt;

use bitvec::prelude::*;

use crate::uint::low_mask;

/// Fixed-width integers packed back to back into `u64` words.
///
/// Every entry occupies exactly `width` bits, where `width` is in `0..=64`. A width of zero is
/// allowed and stores nothing, all entries of such a vector read as `0`.
///
/// All accessors are bounds checked.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IntVec {
    bits: BitVec<u64, Lsb0>,
    width: u32,
    len: usize,
}

impl fmt::Debug for IntVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl IntVec {
    /// Returns an empty vector storing entries of the given width.
    pub fn new(width: u32) -> Self {
        assert!(width <= u64::BITS, "entry width {width} exceeds 64 bits");
        Self {
            bits: BitVec::new(),
            width,
            len: 0,
        }
    }

    /// Returns a vector of `len` zero entries of the given width.
    pub fn zeroed(width: u32, len: usize) -> Self {
        assert!(width <= u64::BITS, "entry width {width} exceeds 64 bits");
        Self {
            bits: BitVec::repeat(false, len * width as usize),
            width,
            len,
        }
    }

    /// Width of each entry in bits.
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of entries.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector has no entries.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    fn span(&self, index: usize) -> std::ops::Range<usize> {
        assert!(
            index < self.len,
            "index {index} out of bounds for packed vector of length {}",
            self.len
        );
        let start = index * self.width as usize;
        start..start + self.width as usize
    }

    /// Returns the entry at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        let span = self.span(index);
        if span.is_empty() {
            return 0;
        }
        self.bits[span].load_le::<u64>()
    }

    /// Overwrites the entry at `index`.
    ///
    /// Panics if `value` does not fit into the entry width.
    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        assert!(
            value & !low_mask(self.width) == 0,
            "value {value} does not fit into {} bits",
            self.width
        );
        let span = self.span(index);
        if span.is_empty() {
            return;
        }
        self.bits[span].store_le::<u64>(value);
    }

    /// Appends an entry.
    pub fn push(&mut self, value: u64) {
        self.bits
            .resize(self.bits.len() + self.width as usize, false);
        self.len += 1;
        self.set(self.len - 1, value);
    }

    /// Removes all entries but keeps the entry width.
    pub fn clear(&mut self) {
        self.bits.clear();
        self.len = 0;
    }

    /// Re-encodes all entries using a different width.
    ///
    /// Panics if an entry does not fit into the new width.
    pub fn set_width(&mut self, width: u32) {
        if width == self.width {
            return;
        }
        let mut widened = Self::zeroed(width, self.len);
        for (index, value) in self.iter().enumerate() {
            widened.set(index, value);
        }
        *self = widened;
    }

    /// Returns an iterator over all entries.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = u64> + '_ {
        (0..self.len).map(|index| self.get(index))
    }

    /// Heap memory used by the packed words in bytes.
    pub fn mem_usage(&self) -> usize {
        self.bits.as_raw_slice().len() * std::mem::size_of::<u64>()
    }
}
