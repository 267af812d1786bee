//! Tables that can hold the roots of a tree map.
use valla_bits::{Slot, Uint};

/// A set of root slots with stable ids.
///
/// A [`CompactTreeHashIdMap`][crate::CompactTreeHashIdMap] stores `(tree_id, len)` pairs in a root
/// set. The ids handed out by the root set are the ids callers see, so they may never change.
/// The tree ids inside the pairs do change whenever the node table is rebuilt, which is what
/// [`relocate`][Self::relocate] is for.
pub trait RootSet<I: Uint>: Default {
    /// Inserts a root unless present and returns its id.
    fn insert(&mut self, root: Slot<I>) -> usize;

    /// Returns the root with the given id.
    ///
    /// Panics if no root has this id.
    fn lookup(&self, id: usize) -> Slot<I>;

    /// Number of roots.
    fn len(&self) -> usize;

    /// Returns `true` if the set contains no roots.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces each root by `f(id, root)`, keeping all ids.
    fn relocate(&mut self, f: impl FnMut(usize, Slot<I>) -> Slot<I>);

    /// Heap memory used by the set in bytes.
    fn mem_usage(&self) -> usize;
}
