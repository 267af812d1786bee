//! Unsigned index types and keys that pack into a bounded number of bits.
use std::{fmt::Debug, hash::Hash};

use crate::Slot;

/// Returns the number of significant bits of `value`, which is `0` for `0`.
#[inline(always)]
pub const fn bit_width(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

/// Returns a mask selecting the low `width` bits of a `u64`.
#[inline(always)]
pub const fn low_mask(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// An unsigned integer type used for indices and sequence elements.
///
/// All implementations convert losslessly into a `u64`.
pub trait Uint: Copy + Eq + Ord + Hash + Debug + Default + Send + Sync + 'static {
    /// Number of bits of the type.
    const BITS: u32;
    /// Largest representable value.
    const MAX: Self;

    /// Widens the value to a `u64`.
    fn to_u64(self) -> u64;

    /// Narrows a `u64`, returning `None` if the value is out of range.
    fn try_from_u64(value: u64) -> Option<Self>;

    /// Narrows a `u64`, panicking if the value is out of range.
    #[inline(always)]
    fn from_u64(value: u64) -> Self {
        match Self::try_from_u64(value) {
            Some(value) => value,
            None => panic!("value {value} exceeds the {}-bit index type", Self::BITS),
        }
    }
}

macro_rules! impl_uint {
    ($($t:ty),*) => {
        $(
            impl Uint for $t {
                const BITS: u32 = <$t>::BITS;
                const MAX: Self = <$t>::MAX;

                #[inline(always)]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline(always)]
                fn try_from_u64(value: u64) -> Option<Self> {
                    <$t>::try_from(value).ok()
                }
            }
        )*
    };
}

impl_uint!(u8, u16, u32, u64, usize);

/// A key that can be encoded into `PARTS * w` bits for a per-part width `w`.
///
/// The hash tables of this crate never store keys verbatim. They only remember the encoding,
/// or even just a fragment of a hash of the encoding, and need to be able to reconstruct the key
/// from that. The tables track a current part width `w` and grow it on demand, so a key only
/// has to report the smallest `w` it fits into.
///
/// `decode(encode(key, w), w) == key` must hold for every `w >= key.part_width()` with
/// `PARTS * w <= 64`.
pub trait UintCodable: Copy + Eq + Debug {
    /// Number of integer components packed into one encoded key.
    const PARTS: u32;

    /// Largest supported part width, such that an encoded key fits into a `u64`.
    const MAX_PART_WIDTH: u32 = u64::BITS / Self::PARTS;

    /// Smallest part width (at least 1) that can encode this key.
    fn part_width(&self) -> u32;

    /// Encodes the key using `part_width` bits per component.
    fn encode(&self, part_width: u32) -> u64;

    /// Decodes a key previously produced by [`encode`][Self::encode] with the same width.
    fn decode(code: u64, part_width: u32) -> Self;
}

impl<T: Uint> UintCodable for T {
    const PARTS: u32 = 1;

    #[inline(always)]
    fn part_width(&self) -> u32 {
        bit_width(self.to_u64()).max(1)
    }

    #[inline(always)]
    fn encode(&self, part_width: u32) -> u64 {
        debug_assert!(self.part_width() <= part_width);
        self.to_u64()
    }

    #[inline(always)]
    fn decode(code: u64, _part_width: u32) -> Self {
        T::from_u64(code)
    }
}

impl<I: Uint> UintCodable for Slot<I> {
    const PARTS: u32 = 2;

    #[inline(always)]
    fn part_width(&self) -> u32 {
        bit_width(self.i1.to_u64() | self.i2.to_u64()).max(1)
    }

    #[inline(always)]
    fn encode(&self, part_width: u32) -> u64 {
        debug_assert!(self.part_width() <= part_width);
        debug_assert!(part_width <= Self::MAX_PART_WIDTH);
        (self.i1.to_u64() << part_width) | self.i2.to_u64()
    }

    #[inline(always)]
    fn decode(code: u64, part_width: u32) -> Self {
        Slot::new(
            I::from_u64(code >> part_width),
            I::from_u64(code & low_mask(part_width)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(bit_width(0), 0);
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(255), 8);
        assert_eq!(bit_width(256), 9);
        assert_eq!(bit_width(u64::MAX), 64);

        assert_eq!(0u32.part_width(), 1);
        assert_eq!(5u8.part_width(), 3);
        assert_eq!(Slot::new(0u32, 0).part_width(), 1);
        assert_eq!(Slot::new(1u32, 1 << 20).part_width(), 21);
    }

    #[test]
    fn slot_codes() {
        let slot = Slot::new(6u32, 9);
        for width in 4..=32 {
            let code = slot.encode(width);
            assert_eq!(code >> width, 6);
            assert_eq!(<Slot<u32>>::decode(code, width), slot);
        }
        let wide = Slot::new(u32::MAX, u32::MAX - 1);
        assert_eq!(<Slot<u32>>::decode(wide.encode(32), 32), wide);
    }

    #[test]
    #[should_panic]
    fn narrowing_out_of_range() {
        u16::from_u64(1 << 16);
    }
}
