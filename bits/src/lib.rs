//! Bit level building blocks for the valla sequence store.
//!
//! This crate provides the integer plumbing shared by all hash tables of the store: unsigned index
//! types ([`Uint`]), keys that can be packed into a bounded number of bits ([`UintCodable`]), the
//! universal two-field node representation ([`Slot`]), a bit-packed integer array with a runtime
//! selectable entry width ([`IntVec`]) and a width-bounded invertible hash function
//! ([`BijectiveHash`]).
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

pub mod bijective_hash;
pub mod int_vec;
pub mod slot;
pub mod uint;

pub use bijective_hash::BijectiveHash;
pub use int_vec::IntVec;
pub use slot::Slot;
pub use uint::{bit_width, low_mask, Uint, UintCodable};
