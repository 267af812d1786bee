//! Succinct content-addressed storage for sequences of unsigned integers.
//!
//! Search over large state spaces stores millions of states, each a sorted sequence of integer
//! indices. Consecutive states differ in only a few positions, so storing each sequence verbatim
//! wastes most of the memory on repeated data. A [`CompactTreeHashIdMap`] instead decomposes every
//! inserted sequence into a perfectly balanced binary tree and interns all tree nodes in a shared
//! hash table. Sequences sharing an aligned subsequence share the corresponding subtree.
//!
//! ## Tables
//!
//! * [`CompactHashIdMap`] is the node table. It never stores keys. Each key is encoded into a
//!   bounded number of bits and hashed with a [`BijectiveHash`][valla_bits::BijectiveHash]. The
//!   low bits of the hash select the home position, the remaining bits are split into a 7-bit
//!   control byte used for SIMD group matching and a packed remainder. Together with the distance
//!   from the home position this is enough to recompute the key, so the table behaves as a set
//!   while the position of a key serves as its id. Ids move when the table is rebuilt.
//!
//! * [`SuccinctIndexedHashSet`] stores keys densely in insertion order and hashes their ids. Its
//!   ids never move, which makes it the default root table of a tree map.
//!
//! * [`SuccinctFlatHashSet`] stores packed keys directly in its slots.
//!
//! * [`LeafTable`] interns arbitrary hashable values with stable ids, it backs the general
//!   [`LeafTreeHashIdMap`] and can serve as a root table.
//!
//! ## Resizing
//!
//! All tables grow in capacity by doubling and in entry width whenever a wider key is inserted.
//! The tree map resizes before starting an insertion, never in the middle of one, as a rebuild
//! invalidates the node ids already computed for the partially inserted tree.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

mod group;
mod hash;
mod index_table;

pub mod compact_hash_id_map;
pub mod compact_tree_hash_id_map;
pub mod error;
pub mod growth_info;
pub mod leaf_table;
pub mod leaf_tree_hash_id_map;
pub mod pool;
pub mod root_set;
pub mod succinct_flat_hash_set;
pub mod succinct_indexed_hash_set;

pub use compact_hash_id_map::CompactHashIdMap;
pub use compact_tree_hash_id_map::CompactTreeHashIdMap;
pub use error::StoreError;
pub use group::GROUP_WIDTH;
pub use growth_info::GrowthInfo;
pub use leaf_table::LeafTable;
pub use leaf_tree_hash_id_map::LeafTreeHashIdMap;
pub use pool::ScratchPool;
pub use root_set::RootSet;
pub use succinct_flat_hash_set::SuccinctFlatHashSet;
pub use succinct_indexed_hash_set::SuccinctIndexedHashSet;

pub use valla_bits::{Slot, Uint, UintCodable};
