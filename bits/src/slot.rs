//! The universal two-field node representation.

/// A pair of unsigned integers.
///
/// Depending on where it is stored, a slot is an internal tree node `(left_id, right_id)`, a pair
/// of sequence elements `(value1, value2)` or a root wrapper `(root_id, length)`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Slot<I> {
    /// First component.
    pub i1: I,
    /// Second component.
    pub i2: I,
}

impl<I> Slot<I> {
    /// Creates a slot from its two components.
    #[inline(always)]
    pub const fn new(i1: I, i2: I) -> Self {
        Self { i1, i2 }
    }
}

impl<I> From<(I, I)> for Slot<I> {
    #[inline(always)]
    fn from((i1, i2): (I, I)) -> Self {
        Self { i1, i2 }
    }
}

impl<I> From<Slot<I>> for (I, I) {
    #[inline(always)]
    fn from(slot: Slot<I>) -> Self {
        (slot.i1, slot.i2)
    }
}
