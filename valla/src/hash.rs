//! Hashing for tables that do not recover keys from their hash.
use std::hash::{BuildHasher, BuildHasherDefault};

use zwohash::ZwoHasher;

/// Default hasher for leaf and root tables.
pub type DefaultBuildHasher = BuildHasherDefault<ZwoHasher>;

/// Computes the hash of a value using the default hasher.
#[inline]
pub fn hash_value<T: std::hash::Hash>(value: T) -> u64 {
    DefaultBuildHasher::default().hash_one(value)
}
