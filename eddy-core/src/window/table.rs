use std::{collections::BTreeMap, hash::Hash};

use indexmap::{map::Entry, IndexMap};
use itertools::Itertools;
use tracing::trace;

use crate::{aggregate::Aggregator, types::Window};

/// Running accumulators per key and window.
///
/// Entries are grouped by window so a complete window can be removed in one go.
/// Windows are kept in ascending order, keys within a window in insertion order until
/// they are flushed, at which point they are sorted.
#[derive(Debug)]
pub struct AggregationTable<K, A> {
    windows: BTreeMap<Window, IndexMap<K, A>>,
}

impl<K, A> Default for AggregationTable<K, A> {
    fn default() -> Self {
        Self {
            windows: BTreeMap::new(),
        }
    }
}

impl<K, A> AggregationTable<K, A>
where
    K: Hash + Eq + Ord,
{
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a value into the accumulator of `(key, window)`, creating the accumulator
    /// if it does not exist yet. Returns `true` if a new accumulator was created.
    pub fn fold<V, G>(&mut self, aggregator: &G, key: K, window: Window, value: V) -> bool
    where
        G: Aggregator<V, Accumulator = A>,
    {
        let keys = self.windows.entry(window).or_default();
        match keys.entry(key) {
            Entry::Occupied(mut acc) => {
                aggregator.combine(acc.get_mut(), value);
                false
            }
            Entry::Vacant(slot) => {
                trace!("Creating accumulator for window {window}");
                slot.insert(aggregator.create(value));
                true
            }
        }
    }

    /// Remove and return all entries of the given window sorted by key.
    /// After this call the table holds no entry for `window`.
    pub fn flush(&mut self, window: &Window) -> Vec<(K, Window, A)> {
        let window = *window;
        self.windows
            .remove(&window)
            .map(|keys| {
                keys.into_iter()
                    .sorted_by(|a, b| a.0.cmp(&b.0))
                    .map(|(k, acc)| (k, window, acc))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove and return all entries, ordered by window start and then key
    pub fn drain_all(&mut self) -> Vec<(K, Window, A)> {
        let windows = self.open_windows().copied().collect_vec();
        windows.iter().flat_map(|w| self.flush(w)).collect()
    }

    /// All windows holding at least one accumulator in ascending order
    pub fn open_windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.keys()
    }

    /// Get the accumulator for a key and window if it exists
    pub fn get(&self, key: &K, window: &Window) -> Option<&A> {
        self.windows.get(window).and_then(|keys| keys.get(key))
    }

    /// Number of accumulators across all windows
    pub fn len(&self) -> usize {
        self.windows.values().map(IndexMap::len).sum()
    }

    /// True if no window holds an accumulator
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Average, AverageAccumulator, Sum};

    fn w(start: u64) -> Window {
        Window::new(start, start + 3000)
    }

    #[test]
    fn fold_creates_then_combines() {
        let mut table = AggregationTable::new();
        assert!(table.fold(&Average, "car9", w(0), 3.0));
        assert!(!table.fold(&Average, "car9", w(0), 5.0));
        assert_eq!(
            table.get(&"car9", &w(0)),
            Some(&AverageAccumulator { sum: 8.0, count: 2 })
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn keys_and_windows_are_independent() {
        let mut table = AggregationTable::new();
        table.fold(&Sum, "carA", w(0), 2.0);
        table.fold(&Sum, "carB", w(0), 4.0);
        table.fold(&Sum, "carA", w(3000), 1.0);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&"carA", &w(0)), Some(&2.0));
        assert_eq!(table.get(&"carB", &w(0)), Some(&4.0));
        assert_eq!(table.get(&"carA", &w(3000)), Some(&1.0));
    }

    /// flushing removes exactly the given window and sorts by key
    #[test]
    fn flush_removes_window() {
        let mut table = AggregationTable::new();
        table.fold(&Sum, "carB", w(0), 4.0);
        table.fold(&Sum, "carA", w(0), 2.0);
        table.fold(&Sum, "carA", w(3000), 1.0);

        let flushed = table.flush(&w(0));
        assert_eq!(flushed, vec![("carA", w(0), 2.0), ("carB", w(0), 4.0)]);
        assert_eq!(table.open_windows().collect_vec(), vec![&w(3000)]);
        assert!(table.get(&"carA", &w(0)).is_none());
    }

    /// A second flush only returns entries folded in between
    #[test]
    fn flush_twice() {
        let mut table = AggregationTable::new();
        table.fold(&Sum, "car1", w(0), 1.0);
        assert_eq!(table.flush(&w(0)).len(), 1);
        assert!(table.flush(&w(0)).is_empty());

        table.fold(&Sum, "car1", w(0), 7.0);
        assert_eq!(table.flush(&w(0)), vec![("car1", w(0), 7.0)]);
    }

    #[test]
    fn drain_all_is_ordered() {
        let mut table = AggregationTable::new();
        table.fold(&Sum, "b", w(3000), 1.0);
        table.fold(&Sum, "a", w(3000), 2.0);
        table.fold(&Sum, "c", w(0), 3.0);

        let drained = table.drain_all();
        assert_eq!(
            drained,
            vec![("c", w(0), 3.0), ("a", w(3000), 2.0), ("b", w(3000), 1.0)]
        );
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}
