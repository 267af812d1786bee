//! Deduplicated storage of integer sequences as shared balanced binary trees.
use std::fmt;

use hashbrown::HashMap;
use valla_bits::{bit_width, Slot, Uint, UintCodable};

use crate::{
    compact_hash_id_map::CompactHashIdMap,
    error::StoreError,
    group::GROUP_WIDTH,
    growth_info::GrowthInfo,
    hash::DefaultBuildHasher,
    pool::{Pooled, ScratchPool},
    root_set::RootSet,
    succinct_indexed_hash_set::SuccinctIndexedHashSet,
};

/// Number of elements in the left subtree of a subtree with `len > 2` elements.
///
/// This is the largest power of two below `len`, so all left subtrees are perfect.
#[inline(always)]
fn split_point(len: usize) -> usize {
    debug_assert!(len > 2);
    1 << (len - 1).ilog2()
}

#[inline(always)]
fn to_index<I: Uint>(value: u64, bits: u32) -> Result<I, StoreError> {
    I::try_from_u64(value).ok_or(StoreError::IndexOverflow { value, bits })
}

type Memo<I> = HashMap<(I, usize), I, DefaultBuildHasher>;

/// A store of integer sequences that shares storage between sequences with common parts.
///
/// Every non-empty sequence is decomposed into a balanced binary tree. A subtree of `n > 2`
/// elements is split after the first `bit_floor(n - 1)` elements, a subtree of two elements is a
/// pair node of both elements and a subtree of a single element is the element itself. All nodes
/// are interned in a [`CompactHashIdMap`], so equal subtrees, within one sequence or across
/// sequences, are stored once.
///
/// The tree's id and the sequence length are interned as a root in the root set `R`, and a
/// sequence is identified by the [`Slot`] `(root_id, len)`. Root ids are stable, even though node
/// ids change whenever the node table is rebuilt. The empty sequence is always stored as root
/// `(0, 0)` with id 0.
///
/// Node ids and sequence elements share the node table's part width, which grows to the larger
/// of the widest element and the width of the largest node id.
pub struct CompactTreeHashIdMap<I: Uint, R = SuccinctIndexedHashSet<Slot<I>>> {
    nodes: CompactHashIdMap<Slot<I>>,
    roots: R,
    stack: ScratchPool<(I, usize)>,
    elements: ScratchPool<I>,
}

impl<I: Uint, R: RootSet<I>> Default for CompactTreeHashIdMap<I, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Uint, R: RootSet<I> + Clone> Clone for CompactTreeHashIdMap<I, R> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            roots: self.roots.clone(),
            stack: ScratchPool::new(),
            elements: ScratchPool::new(),
        }
    }
}

impl<I: Uint, R: RootSet<I>> fmt::Debug for CompactTreeHashIdMap<I, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactTreeHashIdMap")
            .field("len", &self.len())
            .field("node_count", &self.node_count())
            .field("capacity", &self.capacity())
            .field("width", &self.width())
            .finish()
    }
}

impl<I: Uint, R: RootSet<I>> CompactTreeHashIdMap<I, R> {
    /// Returns a map containing only the empty sequence, using the smallest capacity and a part
    /// width of one bit.
    pub fn new() -> Self {
        Self::with_capacity_and_width(GROUP_WIDTH, 1)
    }

    /// Returns a map containing only the empty sequence with the given node table capacity and
    /// part width.
    ///
    /// Panics unless `capacity` is a power of two of at least [`GROUP_WIDTH`] whose node ids fit
    /// into `I` and `width` is in `1..=32`.
    pub fn with_capacity_and_width(capacity: usize, width: u32) -> Self {
        assert!(
            I::try_from_u64(capacity.saturating_sub(1) as u64).is_some(),
            "capacity {capacity} exceeds the {}-bit index type",
            I::BITS
        );
        let mut roots = R::default();
        let sentinel = roots.insert(Slot::default());
        debug_assert_eq!(sentinel, 0);
        Self {
            nodes: CompactHashIdMap::with_capacity_and_width(capacity, width),
            roots,
            stack: ScratchPool::new(),
            elements: ScratchPool::new(),
        }
    }

    /// Number of stored sequences, including the empty sequence.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Always `false`, the empty sequence is always present.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of interned tree nodes.
    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Capacity of the node table.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    /// Part width of the node table in bits.
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.nodes.width()
    }

    /// Capacity and load bookkeeping of the node table.
    #[inline(always)]
    pub fn growth_info(&self) -> &GrowthInfo {
        self.nodes.growth_info()
    }

    /// The node table.
    pub fn nodes(&self) -> &CompactHashIdMap<Slot<I>> {
        &self.nodes
    }

    /// The root set.
    pub fn roots(&self) -> &R {
        &self.roots
    }

    /// Heap memory used by the map in bytes.
    pub fn mem_usage(&self) -> usize {
        self.nodes.mem_usage()
            + self.roots.mem_usage()
            + self.stack.mem_usage()
            + self.elements.mem_usage()
    }

    /// Stores a sequence unless present and returns the slot identifying it.
    ///
    /// Resizes the node table first if the sequence could need more capacity or a larger part
    /// width. Fails with [`StoreError::IndexOverflow`] if an element, node id, root id or the
    /// length does not fit into the index type or into the largest supported part width. No
    /// sequence is stored in that case.
    pub fn try_insert(&mut self, elements: &[I]) -> Result<Slot<I>, StoreError> {
        if elements.is_empty() {
            return Ok(Slot::default());
        }
        let len = to_index::<I>(elements.len() as u64, I::BITS)?;
        if bit_width(elements.len() as u64) > Slot::<I>::MAX_PART_WIDTH {
            return Err(StoreError::IndexOverflow {
                value: elements.len() as u64,
                bits: Slot::<I>::MAX_PART_WIDTH,
            });
        }
        let next_root = self.roots.len() as u64;
        to_index::<I>(next_root, I::BITS)?;

        self.resize_to_fit(elements)?;
        let tree = insert_subtree(&mut self.nodes, elements)?;
        let root_id = self.roots.insert(Slot::new(tree, len));
        to_index(root_id as u64, I::BITS).map(|root_id| Slot::new(root_id, len))
    }

    /// Stores a sequence unless present and returns the slot identifying it.
    ///
    /// Panics if [`try_insert`][Self::try_insert] fails.
    pub fn insert(&mut self, elements: &[I]) -> Slot<I> {
        self.try_insert(elements)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Stores a sequence in ascending order.
    ///
    /// Panics if the sequence is not sorted.
    pub fn insert_sorted(&mut self, elements: &[I]) -> Slot<I> {
        assert!(
            elements.windows(2).all(|pair| pair[0] <= pair[1]),
            "sequence is not sorted"
        );
        self.insert(elements)
    }

    /// Stores the sequence produced by an iterator.
    pub fn insert_iter(&mut self, elements: impl IntoIterator<Item = I>) -> Slot<I> {
        let mut buffer = self.elements.detach();
        buffer.extend(elements);
        let result = self.try_insert(&buffer);
        self.elements.restore(buffer);
        result.unwrap_or_else(|err| panic!("{err}"))
    }

    /// Returns an iterator over the elements of a stored sequence.
    ///
    /// Panics if the slot was not returned by this map.
    pub fn iter(&self, slot: Slot<I>) -> SequenceIter<'_, I> {
        let root = self.roots.lookup(slot.i1.to_u64() as usize);
        assert_eq!(root.i2, slot.i2, "slot length does not match the stored root");
        let len = root.i2.to_u64() as usize;
        let mut stack = self.stack.take();
        if len > 0 {
            stack.push((root.i1, len));
        }
        SequenceIter {
            nodes: &self.nodes,
            stack,
            pending: None,
            remaining: len,
        }
    }

    /// Replaces the contents of `out` by the elements of a stored sequence.
    ///
    /// Panics if the slot was not returned by this map.
    pub fn read(&self, slot: Slot<I>, out: &mut Vec<I>) {
        out.clear();
        out.extend(self.iter(slot));
    }

    /// Returns the elements of a stored sequence.
    pub fn read_vec(&self, slot: Slot<I>) -> Vec<I> {
        self.iter(slot).collect()
    }

    /// Resizes the node table so that inserting `elements` cannot exceed its capacity or width.
    ///
    /// A sequence of length `n` adds at most `n - 1` nodes. The part width must fit the largest
    /// element and every node id. As rebuilding may itself add nodes, the table is grown until the
    /// rebuilt table has enough growth left.
    pub fn resize_to_fit(&mut self, elements: &[I]) -> Result<(), StoreError> {
        let Some(max) = elements.iter().map(|element| element.to_u64()).max() else {
            return Ok(());
        };
        if bit_width(max) > Slot::<I>::MAX_PART_WIDTH {
            return Err(StoreError::IndexOverflow {
                value: max,
                bits: Slot::<I>::MAX_PART_WIDTH,
            });
        }

        let new_nodes = elements.len() - 1;
        let capacity = self
            .capacity()
            .max(GrowthInfo::capacity_for(self.node_count() + new_nodes));
        let width = self
            .width()
            .max(bit_width(max))
            .max(bit_width(capacity as u64 - 1));
        if capacity > self.capacity() || width > self.width() {
            self.rebuild(capacity, width)?;
        }
        // A rebuild can add nodes: a node read both as an element pair and as an inner node is
        // relocated into two distinct nodes.
        while self.growth_info().growth_left() < new_nodes {
            let capacity = GrowthInfo::capacity_for(self.node_count() + new_nodes);
            self.rebuild(capacity, self.width())?;
        }
        Ok(())
    }

    /// Doubles the capacity of the node table.
    ///
    /// Moves all nodes but keeps all slots valid.
    pub fn rehash(&mut self) -> Result<(), StoreError> {
        self.rebuild(self.capacity() * 2, self.width())
    }

    /// Grows the part width of the node table to `width`.
    ///
    /// Does nothing if the table is already at least as wide. Moves all nodes but keeps all slots
    /// valid.
    pub fn resize_width(&mut self, width: u32) -> Result<(), StoreError> {
        if width <= self.width() {
            return Ok(());
        }
        self.rebuild(self.capacity(), width)
    }

    /// Moves all nodes into a fresh table and re-points the roots.
    ///
    /// The part width is raised to fit every node id of the new table. If the new table runs out
    /// of capacity, the attempt is repeated with twice the capacity. The map is unchanged on error.
    fn rebuild(&mut self, mut capacity: usize, width: u32) -> Result<(), StoreError> {
        loop {
            let max_id = capacity as u64 - 1;
            to_index::<I>(max_id, I::BITS)?;
            let width = width.max(bit_width(max_id));
            if width > Slot::<I>::MAX_PART_WIDTH {
                return Err(StoreError::IndexOverflow {
                    value: max_id,
                    bits: Slot::<I>::MAX_PART_WIDTH,
                });
            }

            log::debug!(
                "rebuilding {} nodes of {} roots, capacity {} -> {capacity}, width {} -> {width}",
                self.node_count(),
                self.len(),
                self.capacity(),
                self.width()
            );
            match self.relocated(capacity, width) {
                Ok((nodes, memo)) => {
                    self.nodes = nodes;
                    self.roots.relocate(|_, root| {
                        let len = root.i2.to_u64() as usize;
                        if len <= 1 {
                            root
                        } else {
                            Slot::new(memo[&(root.i1, len)], root.i2)
                        }
                    });
                    return Ok(());
                }
                Err(StoreError::CapacityExhausted) => {
                    log::trace!("capacity {capacity} too small for rebuild, retrying");
                    capacity *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Inserts every tree reachable from a root into a fresh table.
    ///
    /// Returns the table and a map from `(old_id, size)` to the new id of every subtree.
    fn relocated(
        &self,
        capacity: usize,
        width: u32,
    ) -> Result<(CompactHashIdMap<Slot<I>>, Memo<I>), StoreError> {
        let mut nodes = CompactHashIdMap::with_capacity_and_width(capacity, width);
        let mut memo = Memo::default();
        for id in 1..self.roots.len() {
            let root = self.roots.lookup(id);
            relocate_subtree(
                &self.nodes,
                &mut nodes,
                &mut memo,
                root.i1,
                root.i2.to_u64() as usize,
            )?;
        }
        Ok((nodes, memo))
    }

    #[cfg(test)]
    pub(crate) fn check(&self) {
        self.nodes.check();
        assert_eq!(self.roots.lookup(0), Slot::default());
        for id in 0..self.len() {
            let root = self.roots.lookup(id);
            let slot = Slot::new(I::from_u64(id as u64), root.i2);
            let iter = self.iter(slot);
            assert_eq!(iter.len(), root.i2.to_u64() as usize);
            assert_eq!(iter.count(), root.i2.to_u64() as usize);
        }
    }
}

#[inline(always)]
fn insert_node<I: Uint>(
    nodes: &mut CompactHashIdMap<Slot<I>>,
    node: Slot<I>,
) -> Result<I, StoreError> {
    let (id, _) = nodes.try_insert(node)?;
    to_index(id as u64, I::BITS)
}

/// Interns the tree of a non-empty sequence, returning its id.
fn insert_subtree<I: Uint>(
    nodes: &mut CompactHashIdMap<Slot<I>>,
    elements: &[I],
) -> Result<I, StoreError> {
    match *elements {
        [element] => Ok(element),
        [first, second] => insert_node(nodes, Slot::new(first, second)),
        _ => {
            let (left, right) = elements.split_at(split_point(elements.len()));
            let left = insert_subtree(nodes, left)?;
            let right = insert_subtree(nodes, right)?;
            insert_node(nodes, Slot::new(left, right))
        }
    }
}

/// Reinserts the subtree of `size` elements with id `id` in `old` into `new`, children first.
fn relocate_subtree<I: Uint>(
    old: &CompactHashIdMap<Slot<I>>,
    new: &mut CompactHashIdMap<Slot<I>>,
    memo: &mut Memo<I>,
    id: I,
    size: usize,
) -> Result<I, StoreError> {
    if size <= 1 {
        return Ok(id);
    }
    if let Some(&new_id) = memo.get(&(id, size)) {
        return Ok(new_id);
    }
    let node = old.decode_key(id.to_u64() as usize);
    let node = if size == 2 {
        node
    } else {
        let mid = split_point(size);
        Slot::new(
            relocate_subtree(old, new, memo, node.i1, mid)?,
            relocate_subtree(old, new, memo, node.i2, size - mid)?,
        )
    };
    let new_id = insert_node(new, node)?;
    memo.insert((id, size), new_id);
    Ok(new_id)
}

/// Iterator over the elements of a sequence stored in a [`CompactTreeHashIdMap`].
///
/// This struct is created by the [`iter`](CompactTreeHashIdMap::iter) method.
pub struct SequenceIter<'a, I: Uint> {
    nodes: &'a CompactHashIdMap<Slot<I>>,
    stack: Pooled<'a, (I, usize)>,
    pending: Option<I>,
    remaining: usize,
}

impl<I: Uint> Iterator for SequenceIter<'_, I> {
    type Item = I;

    fn next(&mut self) -> Option<I> {
        if let Some(element) = self.pending.take() {
            self.remaining -= 1;
            return Some(element);
        }
        loop {
            let (id, size) = self.stack.pop()?;
            match size {
                1 => {
                    self.remaining -= 1;
                    return Some(id);
                }
                2 => {
                    let pair = self.nodes.decode_key(id.to_u64() as usize);
                    self.pending = Some(pair.i2);
                    self.remaining -= 1;
                    return Some(pair.i1);
                }
                _ => {
                    let node = self.nodes.decode_key(id.to_u64() as usize);
                    let mid = split_point(size);
                    self.stack.push((node.i2, size - mid));
                    self.stack.push((node.i1, mid));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<I: Uint> ExactSizeIterator for SequenceIter<'_, I> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LeafTable;
    use rand::prelude::*;

    macro_rules! weighted_choose {
        ($rng:expr, $($name:ident: $weight:expr => $body:expr),+) => {
            {
                enum Branches { $( $name,  )* }
                let weights = [$((Branches::$name, $weight)),+];
                match weights.choose_weighted($rng, |x| x.1).unwrap().0 {
                    $(Branches::$name => $body),*
                }
            }
        }
    }

    type Map = CompactTreeHashIdMap<u32>;

    #[test]
    fn split_points() {
        assert_eq!(split_point(3), 2);
        assert_eq!(split_point(4), 2);
        assert_eq!(split_point(5), 4);
        assert_eq!(split_point(8), 4);
        assert_eq!(split_point(9), 8);
        assert_eq!(split_point(17), 16);
    }

    #[test]
    fn empty_sequence_is_the_sentinel() {
        let mut map = Map::new();
        assert_eq!(map.len(), 1);
        assert_eq!(map.insert(&[]), Slot::new(0, 0));
        assert_eq!(map.len(), 1);
        assert_eq!(map.node_count(), 0);
        assert!(map.read_vec(Slot::new(0, 0)).is_empty());
        map.check();
    }

    #[test]
    fn singleton_needs_no_node() {
        let mut map = Map::new();
        let slot = map.insert(&[3]);
        assert_eq!(slot.i2, 1);
        assert_ne!(slot.i1, 0);
        assert_eq!(map.node_count(), 0);
        assert_eq!(map.read_vec(slot), [3]);
        map.check();
    }

    #[test]
    fn pairs_are_deduplicated() {
        let mut map = Map::new();
        let slot = map.insert(&[5, 7]);
        assert_eq!(slot.i2, 2);
        let nodes = map.node_count();
        assert_eq!(nodes, 1);
        assert_eq!(map.insert(&[5, 7]), slot);
        assert_eq!(map.node_count(), nodes);
        assert_eq!(map.len(), 2);

        let other = map.insert(&[7, 5]);
        assert_ne!(other, slot);
        assert_eq!(map.read_vec(slot), [5, 7]);
        assert_eq!(map.read_vec(other), [7, 5]);
        map.check();
    }

    #[test]
    fn nine_distinct_elements() {
        let mut map = Map::new();
        let elements = [100, 200, 300, 400, 500, 600, 700, 800, 900];
        let slot = map.insert(&elements);
        assert_eq!(slot.i2, 9);
        // Four pairs, two quadruples, the first eight and the root node. This count holds for
        // distinct elements that cannot alias node ids; shared subtrees would need repeated values.
        assert_eq!(map.node_count(), 8);
        let mut out = vec![42];
        map.read(slot, &mut out);
        assert_eq!(out, elements);
        assert_eq!(map.iter(slot).len(), 9);
        map.check();
    }

    #[test]
    fn repeated_subtrees_are_shared_within_a_sequence() {
        let mut map = Map::new();
        let slot = map.insert(&[1, 2, 1, 2, 1, 2, 1, 2]);
        // (1,2), ((1,2),(1,2)) and the root.
        assert_eq!(map.node_count(), 3);
        assert_eq!(map.read_vec(slot), [1, 2, 1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn sharing_reduces_new_nodes() {
        let mut map = Map::new();
        let base: Vec<u32> = (0..64).map(|i| 100_000 + i * 3).collect();
        map.insert(&base);
        assert_eq!(map.node_count(), 63);

        let mut successor = base.clone();
        successor[40] += 1;
        let before = map.node_count();
        let slot = map.insert(&successor);
        let added = map.node_count() - before;
        assert!(added < 63);
        assert_eq!(added, 6);
        assert_eq!(map.read_vec(slot), successor);
    }

    #[test]
    fn sorted_and_iter_inserts() {
        let mut map = Map::new();
        let a = map.insert_sorted(&[1, 4, 4, 9]);
        let b = map.insert_iter([1, 4, 4, 9]);
        assert_eq!(a, b);
        let c = map.insert_iter((0..100).map(|i| i * i));
        assert!(map.iter(c).eq((0..100).map(|i| i * i)));
        map.check();
    }

    #[test]
    #[should_panic]
    fn insert_sorted_rejects_unsorted() {
        Map::new().insert_sorted(&[3, 1]);
    }

    #[test]
    #[should_panic]
    fn read_unknown_root() {
        Map::new().read_vec(Slot::new(5, 2));
    }

    #[test]
    fn slots_survive_rehash_and_widening() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(17);
        let mut map = Map::new();
        let mut stored: Vec<(Slot<u32>, Vec<u32>)> = vec![];
        let mut state: Vec<u32> = (0..40).map(|i| i * 2).collect();

        let mut capacity = map.capacity();
        let mut width = map.width();
        for _ in 0..3000 {
            weighted_choose! {&mut rng,
                Successor: 20.0 => {
                    let flips = rng.gen_range(1..4);
                    for _ in 0..flips {
                        let pos = rng.gen_range(0..state.len());
                        let bits = rng.gen_range(1..20);
                        state[pos] = rng.gen_range(0..1 << bits);
                    }
                    let slot = map.insert(&state);
                    stored.push((slot, state.clone()));
                },
                Fresh: 3.0 => {
                    let len = rng.gen_range(0..70);
                    let elements: Vec<u32> = (0..len).map(|_| rng.gen_range(0..50)).collect();
                    let slot = map.insert(&elements);
                    stored.push((slot, elements));
                },
                Rehash: 0.03 => {
                    map.rehash().unwrap();
                },
                Widen: 0.1 => {
                    let width = (map.width() + 1).min(32);
                    map.resize_width(width).unwrap();
                    assert_eq!(map.width(), width);
                },
                Read: 5.0 => {
                    if !stored.is_empty() {
                        let (slot, elements) = &stored[rng.gen_range(0..stored.len())];
                        assert_eq!(&map.read_vec(*slot), elements);
                        assert_eq!(map.insert(elements), *slot);
                    }
                }
            }
            assert!(map.capacity().is_power_of_two());
            assert!(map.capacity() >= capacity);
            assert!(map.width() >= width);
            assert!(map.node_count() <= map.capacity() / 8 * 7);
            capacity = map.capacity();
            width = map.width();
        }
        for (slot, elements) in &stored {
            assert_eq!(&map.read_vec(*slot), elements);
        }
        map.check();
    }

    /// Stores `groups` sequences `[a, b, c]` and, for each, the pair `[id(a, b), c]`, which is
    /// interned as the same node as the inner node of the triple.
    fn insert_aliased_groups(map: &mut Map, groups: u32) -> Vec<(Slot<u32>, Vec<u32>)> {
        let mut stored = vec![];
        for k in 0..groups {
            let triple = vec![2000 + 2 * k, 2001 + 2 * k, 3000 + k];
            let slot = map.insert(&triple);
            let pair_id = map.nodes().find(&Slot::new(triple[0], triple[1])).unwrap() as u32;
            let nodes = map.node_count();
            let pair = vec![pair_id, triple[2]];
            let alias = map.insert(&pair);
            assert_eq!(map.node_count(), nodes);
            stored.push((slot, triple));
            stored.push((alias, pair));
        }
        stored
    }

    #[test]
    fn aliased_nodes_split_when_rebuilt() {
        let mut map = Map::with_capacity_and_width(1024, 16);
        let mut stored = insert_aliased_groups(&mut map, 250);
        assert_eq!(map.node_count(), 500);
        assert_eq!(map.capacity(), 1024);

        let fresh: Vec<u32> = (10_000..11_123).collect();
        let slot = map.try_insert(&fresh).unwrap();
        stored.push((slot, fresh));
        assert!(map.node_count() <= map.growth_info().max_size());

        for (slot, elements) in &stored {
            assert_eq!(&map.read_vec(*slot), elements);
        }
        map.check();
    }

    #[test]
    fn rebuild_escalates_when_relocation_overflows() {
        let mut map = Map::with_capacity_and_width(1024, 16);
        let stored = insert_aliased_groups(&mut map, 440);
        assert_eq!(map.node_count(), 880);
        assert_eq!(map.capacity(), 1024);

        map.resize_width(17).unwrap();
        assert!(map.capacity() > 1024);
        assert!(map.width() >= 17);
        assert!(map.node_count() > 880);

        for (slot, elements) in &stored {
            assert_eq!(&map.read_vec(*slot), elements);
            assert_eq!(map.insert(elements), *slot);
        }
        map.check();
    }

    #[test]
    fn leaf_table_roots() {
        let mut map = CompactTreeHashIdMap::<u32, LeafTable<Slot<u32>>>::new();
        let sequences: Vec<Vec<u32>> = (0..200)
            .map(|i| (0..i % 23).map(|j| (i * j) % 31).collect())
            .collect();
        let slots: Vec<_> = sequences.iter().map(|seq| map.insert(seq)).collect();
        map.rehash().unwrap();
        for (slot, seq) in slots.iter().zip(&sequences) {
            assert_eq!(&map.read_vec(*slot), seq);
            assert_eq!(map.insert(seq), *slot);
        }
        map.check();
    }

    #[test]
    fn overflowing_indices() {
        let mut map = <CompactTreeHashIdMap<u64>>::new();
        assert_eq!(
            map.try_insert(&[1 << 40, 1]),
            Err(StoreError::IndexOverflow {
                value: 1 << 40,
                bits: 32
            })
        );
        assert_eq!(map.len(), 1);

        let mut map = <CompactTreeHashIdMap<u8>>::new();
        let mut inserted = 0;
        'outer: for a in 0..=u8::MAX {
            for b in 0..=u8::MAX {
                match map.try_insert(&[a, b]) {
                    Ok(_) => inserted += 1,
                    Err(err) => {
                        assert_eq!(
                            err,
                            StoreError::IndexOverflow {
                                value: 511,
                                bits: 8
                            }
                        );
                        break 'outer;
                    }
                }
            }
        }
        assert_eq!(inserted, 224);
        assert_eq!(map.capacity(), 256);
        map.check();
    }
}
