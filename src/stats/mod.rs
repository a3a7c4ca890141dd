//! Count storage
//!
//! Hash-based key counters used on both sides of a run.
//!
//! - **Local tables**: one per participant, filled from its assigned work
//!   units, encoded once and then dropped
//! - **Global table**: owned by the coordinator, filled only during the merge
//!
//! Both roles use [`CountTable`]. Tables are sized up front from a capacity
//! hint; they only ever grow, so there is no removal path.
//!
//! # Example
//!
//! ```
//! use corpuscount::stats::CountTable;
//!
//! let mut table = CountTable::with_capacity(16);
//! table.increment("love", 1);
//! table.increment("love", 2);
//! table.increment("war", 1);
//!
//! assert_eq!(table.get("love"), Some(3));
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.total(), 4);
//! ```

pub mod aggregator;

use std::collections::HashMap;

/// Default capacity hint for a participant's local table
pub const LOCAL_CAPACITY: usize = 1 << 15;

/// Default capacity hint for the coordinator's global table
pub const GLOBAL_CAPACITY: usize = 1 << 16;

/// Key → count store
///
/// Every present count is at least 1.
#[derive(Debug, Clone, Default)]
pub struct CountTable {
    counts: HashMap<String, u64>,
    capacity_hint: usize,
}

impl CountTable {
    /// Create a table pre-sized for `capacity` distinct keys
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            counts: HashMap::with_capacity(capacity),
            capacity_hint: capacity,
        }
    }

    /// Table sized for a participant's local counts
    pub fn local() -> Self {
        Self::with_capacity(LOCAL_CAPACITY)
    }

    /// Table sized for the coordinator's merged counts
    pub fn global() -> Self {
        Self::with_capacity(GLOBAL_CAPACITY)
    }

    /// Add `delta` to `key`
    ///
    /// Empty keys and zero deltas are ignored. Counts saturate at `u64::MAX`.
    #[inline]
    pub fn increment(&mut self, key: &str, delta: u64) {
        if key.is_empty() || delta == 0 {
            return;
        }
        // Probe first so hits never allocate
        if let Some(count) = self.counts.get_mut(key) {
            *count = count.saturating_add(delta);
        } else {
            self.counts.insert(key.to_owned(), delta);
        }
    }

    /// Count for `key`, if present
    pub fn get(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, &c| acc.saturating_add(c))
    }

    /// Capacity the table was sized for
    pub fn capacity_hint(&self) -> usize {
        self.capacity_hint
    }

    /// Visit every (key, count) pair exactly once, in unspecified order
    ///
    /// Each call starts a fresh traversal.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(k, &c)| (k.as_str(), c))
    }

    /// Entries ordered by count descending, then key ascending
    pub fn sorted_by_count(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

/// Tables are equal when they hold the same (key, count) pairs
impl PartialEq for CountTable {
    fn eq(&self, other: &Self) -> bool {
        self.counts == other.counts
    }
}

impl Eq for CountTable {}

impl<'a> Extend<(&'a str, u64)> for CountTable {
    fn extend<T: IntoIterator<Item = (&'a str, u64)>>(&mut self, iter: T) {
        for (key, count) in iter {
            self.increment(key, count);
        }
    }
}

impl<'a> FromIterator<&'a str> for CountTable {
    /// Count each key once per occurrence
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut table = CountTable::local();
        for key in iter {
            table.increment(key, 1);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_creates_then_adds() {
        let mut table = CountTable::with_capacity(8);
        table.increment("love", 1);
        assert_eq!(table.get("love"), Some(1));
        table.increment("love", 5);
        assert_eq!(table.get("love"), Some(6));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_insertion_takes_full_delta() {
        // A fresh key merged with count c must end at exactly c
        let mut table = CountTable::global();
        table.increment("war", 7);
        assert_eq!(table.get("war"), Some(7));
    }

    #[test]
    fn test_empty_key_is_noop() {
        let mut table = CountTable::local();
        table.increment("", 3);
        assert!(table.is_empty());
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let mut table = CountTable::local();
        table.increment("peace", 0);
        assert!(table.get("peace").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_keys_are_byte_exact() {
        let mut table = CountTable::local();
        table.increment("Love", 1);
        table.increment("love", 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_iter_visits_each_entry_once() {
        let mut table = CountTable::local();
        for key in ["a", "b", "c", "a", "b", "a"] {
            table.increment(key, 1);
        }

        let mut seen: Vec<_> = table.iter().collect();
        seen.sort();
        assert_eq!(seen, vec![("a", 3), ("b", 2), ("c", 1)]);

        // Fresh traversal yields the same entries
        assert_eq!(table.iter().count(), 3);
    }

    #[test]
    fn test_total_sums_counts() {
        let mut table = CountTable::local();
        table.increment("x", 2);
        table.increment("y", 3);
        assert_eq!(table.total(), 5);
    }

    #[test]
    fn test_sorted_by_count_breaks_ties_by_key() {
        let mut table = CountTable::local();
        table.increment("b", 2);
        table.increment("a", 2);
        table.increment("c", 5);
        assert_eq!(table.sorted_by_count(), vec![("c", 5), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn test_many_distinct_keys() {
        let mut table = CountTable::local();
        for i in 0..200_000u32 {
            table.increment(&format!("k{}", i), 1);
        }
        assert_eq!(table.len(), 200_000);
        assert_eq!(table.get("k199999"), Some(1));
    }

    #[test]
    fn test_capacity_hints() {
        assert_eq!(CountTable::local().capacity_hint(), LOCAL_CAPACITY);
        assert_eq!(CountTable::global().capacity_hint(), GLOBAL_CAPACITY);
    }

    #[test]
    fn test_from_iter_and_extend() {
        let mut table: CountTable = ["x", "y", "x"].into_iter().collect();
        assert_eq!(table.get("x"), Some(2));
        table.extend([("y", 4u64), ("z", 1u64)]);
        assert_eq!(table.get("y"), Some(5));
        assert_eq!(table.get("z"), Some(1));
    }
}
