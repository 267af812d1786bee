//! Control byte groups matched 16 at a time.
//!
//! Every slot of an open addressing table has a control byte. Occupied slots store a 7-bit hash
//! fragment, vacant slots store [`EMPTY`], which is the only value with the high bit set. Probing
//! loads [`GROUP_WIDTH`] consecutive control bytes and compares them all at once. The control byte
//! array of a table is followed by a copy of its first group, so that a group load starting near
//! the end wraps around without any special casing.
use std::num::NonZeroU16;

/// Number of control bytes matched at once.
pub const GROUP_WIDTH: usize = 16;

/// Control byte of a vacant slot.
pub const EMPTY: u8 = 0x80;

/// Returns an all-vacant control byte array for a table of the given capacity.
pub fn empty_ctrl(capacity: usize) -> Vec<u8> {
    vec![EMPTY; capacity + GROUP_WIDTH]
}

/// Writes a control byte, including its mirror in the trailing group.
#[inline(always)]
pub fn set_ctrl(ctrl: &mut [u8], mask: usize, pos: usize, byte: u8) {
    ctrl[pos] = byte;
    ctrl[(pos.wrapping_sub(GROUP_WIDTH) & mask) + GROUP_WIDTH] = byte;
}

/// Returns `true` if the control byte belongs to an occupied slot.
#[inline(always)]
pub fn is_full(byte: u8) -> bool {
    byte & EMPTY == 0
}

/// A group of consecutive control bytes.
pub struct Group([u8; GROUP_WIDTH]);

impl Group {
    /// Loads the group starting at `pos`, which may be any slot position.
    #[inline(always)]
    pub fn load(ctrl: &[u8], pos: usize) -> Self {
        let bytes = ctrl[pos..pos + GROUP_WIDTH]
            .try_into()
            .expect("control bytes include a trailing group");
        Self(bytes)
    }

    /// Returns the offsets of all bytes equal to `byte`.
    #[inline(always)]
    pub fn match_byte(&self, byte: u8) -> BitMask {
        BitMask(find_byte_among_16(byte, &self.0))
    }

    /// Returns the offsets of all vacant slots.
    #[inline(always)]
    pub fn match_empty(&self) -> BitMask {
        BitMask(high_bits_of_16(&self.0))
    }
}

/// Set of offsets within a group.
#[derive(Clone, Copy)]
pub struct BitMask(u16);

impl BitMask {
    /// Returns the smallest offset.
    #[inline(always)]
    pub fn lowest(self) -> Option<usize> {
        NonZeroU16::new(self.0).map(|bits| bits.trailing_zeros() as usize)
    }
}

impl Iterator for BitMask {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        let lowest = self.lowest()?;
        self.0 &= self.0 - 1;
        Some(lowest)
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86_impl {
    #[cfg(target_arch = "x86")]
    use core::arch::x86;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64 as x86;

    #[inline(always)]
    pub fn find_byte_among_16(needle: u8, haystack: &[u8; 16]) -> u16 {
        // SAFETY: SSE2 is part of the x86_64 baseline, the pointer to haystack is valid and has
        // sufficient size for loadu_si128, which has no alignment requirement
        unsafe {
            let bytes = x86::_mm_loadu_si128((haystack as *const [u8; 16]).cast::<x86::__m128i>());

            let needle = x86::_mm_set1_epi8(needle as i8);

            x86::_mm_movemask_epi8(x86::_mm_cmpeq_epi8(bytes, needle)) as u16
        }
    }

    #[inline(always)]
    pub fn high_bits_of_16(haystack: &[u8; 16]) -> u16 {
        // SAFETY: see `find_byte_among_16`
        unsafe {
            let bytes = x86::_mm_loadu_si128((haystack as *const [u8; 16]).cast::<x86::__m128i>());

            x86::_mm_movemask_epi8(bytes) as u16
        }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use x86_impl::{find_byte_among_16, high_bits_of_16};

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn find_byte_among_16(needle: u8, haystack: &[u8; 16]) -> u16 {
    let mut found = 0;
    for (i, &candidate) in haystack.iter().enumerate() {
        found |= ((candidate == needle) as u16) << i;
    }
    found
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn high_bits_of_16(haystack: &[u8; 16]) -> u16 {
    let mut found = 0;
    for (i, &candidate) in haystack.iter().enumerate() {
        found |= ((candidate >> 7) as u16) << i;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching() {
        let mut ctrl = empty_ctrl(32);
        set_ctrl(&mut ctrl, 31, 3, 0x11);
        set_ctrl(&mut ctrl, 31, 5, 0x11);
        set_ctrl(&mut ctrl, 31, 20, 0x11);

        let group = Group::load(&ctrl, 0);
        assert_eq!(group.match_byte(0x11).collect::<Vec<_>>(), [3, 5]);
        assert_eq!(group.match_empty().count(), 14);
        assert_eq!(group.match_empty().lowest(), Some(0));

        // The trailing group mirrors the first one, so loads wrap around.
        let group = Group::load(&ctrl, 30);
        assert_eq!(group.match_byte(0x11).collect::<Vec<_>>(), [5, 7]);
        assert!(!is_full(EMPTY));
        assert!(is_full(0x7f));
    }
}
