#![allow(missing_docs)] // test only
use std::{fmt::Debug, hash::BuildHasherDefault};

use hashbrown::HashMap;
use rand::prelude::*;
use valla::{CompactTreeHashIdMap, LeafTable, RootSet, Slot, SuccinctIndexedHashSet, Uint};
use zwohash::ZwoHasher;

pub struct TestStore<I: Uint, R = SuccinctIndexedHashSet<Slot<I>>> {
    under_test: CompactTreeHashIdMap<I, R>,
    spec: HashMap<Vec<I>, Slot<I>, BuildHasherDefault<ZwoHasher>>,
}

impl<I: Uint, R: RootSet<I>> Default for TestStore<I, R> {
    fn default() -> Self {
        Self {
            under_test: Default::default(),
            spec: Default::default(),
        }
    }
}

impl<I: Uint + Debug, R: RootSet<I>> TestStore<I, R> {
    pub fn insert(&mut self, elements: &[I]) -> Slot<I> {
        let nodes = self.under_test.node_count();
        let slot = self.under_test.insert(elements);
        assert_eq!(slot.i2.to_u64() as usize, elements.len());
        match self.spec.get(elements) {
            Some(&expected) => {
                assert_eq!(slot, expected);
                assert_eq!(self.under_test.node_count(), nodes);
            }
            None => {
                self.spec.insert(elements.to_vec(), slot);
            }
        }
        // The sentinel is never part of the reference.
        assert_eq!(
            self.under_test.len(),
            self.spec.len() + !self.spec.contains_key::<[I]>(&[]) as usize
        );
        slot
    }

    pub fn test_read_all(&self) {
        let mut out = vec![];
        for (elements, &slot) in &self.spec {
            self.under_test.read(slot, &mut out);
            assert_eq!(&out, elements);
            assert_eq!(self.under_test.iter(slot).len(), elements.len());
        }
    }

    pub fn test_growth(&self) {
        let info = self.under_test.growth_info();
        assert!(info.capacity().is_power_of_two());
        assert!(info.size() <= info.max_size());
        assert_eq!(info.size(), self.under_test.node_count());
    }
}

fn divisors(n: u32) -> Vec<u32> {
    (1..=n).filter(|d| n % d == 0).collect()
}

#[test]
fn test_divisor_sequences() {
    let mut store = <TestStore<u32>>::default();
    for n in 1..2000 {
        store.insert(&divisors(n));
    }
    store.test_growth();
    store.test_read_all();
    for n in (1..2000).rev() {
        store.insert(&divisors(n));
    }
    store.test_read_all();
}

#[test]
fn test_planning_states() {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(1);
    let mut store = <TestStore<u32>>::default();
    let atoms = 600;

    let mut frontier: Vec<Vec<u32>> = vec![(0..atoms).filter(|a| a % 3 == 0).collect()];
    for _ in 0..3000 {
        let parent = frontier[rng.gen_range(0..frontier.len())].clone();
        let mut successor = parent;
        for _ in 0..rng.gen_range(1..5) {
            let atom = rng.gen_range(0..atoms);
            match successor.binary_search(&atom) {
                Ok(pos) => {
                    successor.remove(pos);
                }
                Err(pos) => successor.insert(pos, atom),
            }
        }
        store.under_test.insert_sorted(&successor);
        store.insert(&successor);
        frontier.push(successor);
    }
    store.test_growth();
    store.test_read_all();
}

#[test]
fn test_fixed_layout_states() {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(3);
    let mut store = <TestStore<u32>>::default();
    let variables = 256;

    let mut frontier: Vec<Vec<u32>> = vec![vec![0; variables]];
    for _ in 0..3000 {
        let mut successor = frontier[rng.gen_range(0..frontier.len())].clone();
        for _ in 0..rng.gen_range(1..5) {
            successor[rng.gen_range(0..variables)] = rng.gen_range(0..8);
        }
        store.insert(&successor);
        frontier.push(successor);
    }
    store.test_growth();
    store.test_read_all();

    // Successors share all subtrees not containing a changed value with their parents.
    let elements: usize = store.spec.keys().map(|state| state.len()).sum();
    assert!(store.under_test.node_count() < elements / 4);
}

#[test]
fn test_interleaved_resizing() {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(2);
    let mut store = <TestStore<u32>>::default();
    for round in 0..2000 {
        let len = rng.gen_range(0..100);
        let scale = rng.gen_range(1..=32);
        let elements: Vec<u32> = (0..len).map(|_| rng.gen::<u32>() >> (32 - scale)).collect();
        store.insert(&elements);
        if round % 700 == 0 {
            store.under_test.rehash().unwrap();
            store.test_read_all();
        }
        if round % 300 == 0 {
            let width = store.under_test.width() + 1;
            store.under_test.resize_width(width.min(32)).unwrap();
            store.test_read_all();
        }
    }
    store.test_growth();
    store.test_read_all();
}

#[test]
fn test_leaf_table_roots() {
    let mut store = <TestStore<u16, LeafTable<Slot<u16>>>>::default();
    for n in 1..1500u32 {
        let elements: Vec<u16> = divisors(n).into_iter().map(|d| d as u16).collect();
        store.insert(&elements);
        if n % 500 == 0 {
            store.under_test.rehash().unwrap();
        }
    }
    store.test_growth();
    store.test_read_all();
}

#[test]
fn test_insert_iter() {
    let mut store = <TestStore<u64>>::default();
    for n in 0..300u64 {
        let slot = store.under_test.insert_iter((0..n).map(|i| i * n));
        let elements: Vec<u64> = (0..n).map(|i| i * n).collect();
        assert_eq!(store.insert(&elements), slot);
    }
    store.test_read_all();
}
