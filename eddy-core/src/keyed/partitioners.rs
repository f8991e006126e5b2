//! Partitioning functions for distributing keys across multiple workers.
//!
//! A partitioner must be deterministic: the same key must always be routed to the same
//! worker, otherwise the accumulators of one key would be split between workers.
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;
use seahash::SeaHasher;

use crate::types::WorkerId;

/// Function selecting a worker for a key out of the set of available workers
pub type Partitioner<K> = fn(&K, &IndexSet<WorkerId>) -> WorkerId;

/// Select a value from a set of choices by applying [rendezvous hashing](https://en.wikipedia.org/wiki/Rendezvous_hashing).
/// Rendezvous hashing ensures minimal shuffling when the set of options changes
/// at the cost of being O(n) with n == options.len()
///
/// Hashing uses [SeaHasher], which is stable across processes and versions.
///
/// **PANIC:** if the set is empty
pub fn rendezvous_select<V: Hash, T: Hash + Copy>(value: &V, options: &IndexSet<T>) -> T {
    let mut hasher = SeaHasher::new();
    value.hash(&mut hasher);

    #[allow(clippy::expect_used)]
    options
        .iter()
        .map(|x| {
            let mut h = hasher.clone();
            x.hash(&mut h);
            (h.finish(), x)
        })
        .max_by_key(|x| x.0)
        .map(|x| x.1)
        .expect("Collection not empty")
        .to_owned()
}

/// A partitioner which just uses the key as a wrapping index
/// on the set of available workers.
/// This is fast and spreads sequential integer keys evenly.
///
/// **PANIC:** if the set is empty
pub fn index_select<T: Copy>(i: &u64, s: &IndexSet<T>) -> T {
    let idx = (*i % s.len() as u64) as usize;
    #[allow(clippy::unwrap_used)]
    *s.get_index(idx).unwrap()
}
