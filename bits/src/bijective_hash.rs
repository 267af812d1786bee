//! A width-bounded invertible hash function.
//!
//! The hash tables of this crate only store a fragment of each key's hash and recover the key by
//! inverting the hash. This requires a hash function that is a permutation of `[0, 2^z)` for every
//! width `z` a table may use.

use crate::uint::low_mask;

/// Odd multiplicative constant, a bijection modulo any power of two.
const P: u64 = 0x9e37_79b9_7f4a_7c15;

/// Inverse of [`P`] modulo `2^64`, and therefore modulo every smaller power of two.
const P_INV: u64 = mod_inverse(P);

const _: () = assert!(P.wrapping_mul(P_INV) == 1);

/// Newton iteration for the inverse of an odd number modulo `2^64`.
///
/// Every step doubles the number of correct low bits, starting with 3 correct bits.
const fn mod_inverse(p: u64) -> u64 {
    assert!(p & 1 == 1);
    let mut inv = p;
    let mut step = 0;
    while step < 5 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(p.wrapping_mul(inv)));
        step += 1;
    }
    inv
}

/// Invertible hash over the low `width` bits of a `u64`.
///
/// The hash multiplies by an odd constant, applies an xor-shift by `width / 2 + 1` and multiplies
/// again, all modulo `2^width`. The xor-shift step is self-inverse within `width` bits as twice
/// the shift amount exceeds the width.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BijectiveHash {
    width: u32,
    mask: u64,
    shift: u32,
}

impl BijectiveHash {
    /// Returns the hash for keys of `width` bits, `1 <= width <= 64`.
    pub const fn new(width: u32) -> Self {
        assert!(width >= 1 && width <= u64::BITS);
        Self {
            width,
            mask: low_mask(width),
            shift: width / 2 + 1,
        }
    }

    /// Width of the hash domain in bits.
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask of the hash domain.
    #[inline(always)]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Hashes a value of at most [`width`][Self::width] bits.
    #[inline(always)]
    pub fn hash(&self, value: u64) -> u64 {
        debug_assert_eq!(value & !self.mask, 0);
        let mut x = value.wrapping_mul(P) & self.mask;
        x ^= x >> self.shift;
        x.wrapping_mul(P) & self.mask
    }

    /// Recovers the value from its hash.
    #[inline(always)]
    pub fn invert(&self, hash: u64) -> u64 {
        debug_assert_eq!(hash & !self.mask, 0);
        let mut x = hash.wrapping_mul(P_INV) & self.mask;
        x ^= x >> self.shift;
        x.wrapping_mul(P_INV) & self.mask
    }
}

/// Hashes the low `width` bits of `value`.
pub fn hash(value: u64, width: u32) -> u64 {
    BijectiveHash::new(width).hash(value & low_mask(width))
}

/// Inverse of [`hash`] for the same width.
pub fn invert_hash(hash: u64, width: u32) -> u64 {
    BijectiveHash::new(width).invert(hash & low_mask(width))
}
