//! Drives per-channel sequence stores with synthetic search states and reports memory telemetry.
#![allow(missing_docs)]

use std::hash::BuildHasherDefault;

use clap::Parser;
use color_eyre::eyre::{bail, ensure};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde_json::json;
use valla::{CompactTreeHashIdMap, Slot};
use zwohash::ZwoHasher;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of successor states to generate.
    #[clap(short = 'n', long, default_value = "100000")]
    states: usize,
    /// Number of fluent atoms, each state holds a sorted subset.
    #[clap(short = 'a', long, default_value = "1000")]
    atoms: u32,
    /// Number of numeric variables of each state.
    #[clap(short = 'm', long, default_value = "16")]
    numeric: usize,
    /// Maximal number of atoms or numeric values changed per successor.
    #[clap(short = 'f', long, default_value = "3")]
    flips: usize,
    #[clap(short = 's', long, default_value = "0")]
    seed: u64,
    /// Initial node table capacity of each store.
    #[clap(long, default_value = "16")]
    capacity: usize,
    /// Initial part width of each store.
    #[clap(long, default_value = "1")]
    width: u32,
    /// Keep a plain copy of every state and check that all of them read back.
    #[clap(long)]
    verify: bool,

    #[clap(long)]
    jsonl_output: bool,
}

type StateKey = [u32; 4];

/// One store per state channel and the set of distinct states.
struct StateStore {
    atoms: CompactTreeHashIdMap<u32>,
    numeric: CompactTreeHashIdMap<u32>,
    keys: hashbrown::HashSet<StateKey, BuildHasherDefault<ZwoHasher>>,
    states: Vec<StateKey>,
}

impl StateStore {
    fn new(capacity: usize, width: u32) -> Self {
        Self {
            atoms: CompactTreeHashIdMap::with_capacity_and_width(capacity, width),
            numeric: CompactTreeHashIdMap::with_capacity_and_width(capacity, width),
            keys: Default::default(),
            states: vec![],
        }
    }

    /// Stores a state, returning its key and whether it is new.
    fn insert(&mut self, atoms: &[u32], numeric: &[u32]) -> color_eyre::Result<(StateKey, bool)> {
        let atoms = self.atoms.try_insert(atoms)?;
        let numeric = self.numeric.try_insert(numeric)?;
        let key = [atoms.i1, atoms.i2, numeric.i1, numeric.i2];
        let new = self.keys.insert(key);
        if new {
            self.states.push(key);
        }
        Ok((key, new))
    }

    fn read(&self, key: StateKey, atoms: &mut Vec<u32>, numeric: &mut Vec<u32>) {
        self.atoms.read(Slot::new(key[0], key[1]), atoms);
        self.numeric.read(Slot::new(key[2], key[3]), numeric);
    }

    fn mem_usage(&self) -> usize {
        self.atoms.mem_usage() + self.numeric.mem_usage()
    }

    fn report(&self, generated: usize, jsonl_output: bool) {
        let unique = self.states.len();
        let mem = self.mem_usage();
        let per_state = mem as f64 / unique.max(1) as f64;
        log::info!(
            "{generated} states generated, {unique} unique, {mem} bytes, {per_state:.1} bytes/state"
        );
        for (channel, store) in [("atoms", &self.atoms), ("numeric", &self.numeric)] {
            log::info!(
                "{channel}: {} sequences, {} nodes, capacity {}, width {}, {} bytes",
                store.len(),
                store.node_count(),
                store.capacity(),
                store.width(),
                store.mem_usage(),
            );
        }
        if jsonl_output {
            println!(
                "{}",
                json!({
                    "generated": generated,
                    "unique": unique,
                    "mem_bytes": mem,
                    "bytes_per_state": per_state,
                    "atom_nodes": self.atoms.node_count(),
                    "atom_capacity": self.atoms.capacity(),
                    "numeric_nodes": self.numeric.node_count(),
                    "numeric_capacity": self.numeric.capacity(),
                })
            );
        }
    }
}

/// Toggles `flips` random atoms of a sorted state.
fn flip_atoms(rng: &mut SmallRng, atoms: &mut Vec<u32>, atom_count: u32, flips: usize) {
    for _ in 0..flips {
        let atom = rng.gen_range(0..atom_count);
        match atoms.binary_search(&atom) {
            Ok(pos) => {
                atoms.remove(pos);
            }
            Err(pos) => atoms.insert(pos, atom),
        }
    }
}

fn main() -> color_eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    valla_logger::setup();

    ensure!(
        args.capacity.is_power_of_two() && args.capacity >= valla::GROUP_WIDTH,
        "capacity must be a power of two of at least {}",
        valla::GROUP_WIDTH
    );
    ensure!(
        (1..=32).contains(&args.width),
        "width must be between 1 and 32"
    );
    ensure!(args.atoms > 0, "at least one atom is required");

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut store = StateStore::new(args.capacity, args.width);

    let initial_atoms: Vec<u32> = (0..args.atoms).step_by(4).collect();
    let initial_numeric: Vec<u32> = vec![0; args.numeric];
    store.insert(&initial_atoms, &initial_numeric)?;

    let mut plain: Vec<(Vec<u32>, Vec<u32>)> = vec![];
    if args.verify {
        plain.push((initial_atoms, initial_numeric));
    }

    let mut atoms = vec![];
    let mut numeric = vec![];
    let progress = (args.states / 10).max(1);
    for generated in 1..=args.states {
        let parent = store.states[rng.gen_range(0..store.states.len())];
        store.read(parent, &mut atoms, &mut numeric);

        let flips = rng.gen_range(1..=args.flips.max(1));
        if numeric.is_empty() || rng.gen_bool(0.7) {
            flip_atoms(&mut rng, &mut atoms, args.atoms, flips);
        } else {
            for _ in 0..flips {
                let var = rng.gen_range(0..numeric.len());
                numeric[var] = numeric[var].wrapping_add(rng.gen_range(1..4)) % 1000;
            }
        }

        let (_, new) = store.insert(&atoms, &numeric)?;
        if new && args.verify {
            plain.push((atoms.clone(), numeric.clone()));
        }
        if generated % progress == 0 {
            log::debug!("{generated} states generated");
        }
    }

    store.report(args.states, args.jsonl_output);

    if args.verify {
        for (&key, (expected_atoms, expected_numeric)) in store.states.iter().zip(&plain) {
            store.read(key, &mut atoms, &mut numeric);
            if atoms != *expected_atoms || numeric != *expected_numeric {
                bail!("state {key:?} does not read back");
            }
        }
        log::info!("verified {} states", plain.len());
    }

    Ok(())
}
