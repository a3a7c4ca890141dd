//! Merge aggregation
//!
//! Folds the encoded partials gathered from every participant into one global
//! [`CountTable`], keeping a per-participant record of what each one
//! contributed.
//!
//! # Example
//!
//! ```
//! use corpuscount::distributed::wire::WireCodec;
//! use corpuscount::stats::aggregator::MergeAggregator;
//!
//! let mut aggregator = MergeAggregator::new(WireCodec::default());
//! aggregator.fold(1, b"love\t2\nwar\t1\n");
//! aggregator.fold(2, b"love\t1\npeace\t1\n");
//!
//! let global = aggregator.into_global();
//! assert_eq!(global.get("love"), Some(3));
//! assert_eq!(global.len(), 3);
//! ```

use crate::distributed::wire::WireCodec;
use crate::stats::CountTable;
use serde::Serialize;
use tracing::debug;

/// What one participant's partial added to the merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Contribution {
    pub rank: usize,
    /// Encoded partial size
    pub bytes: u64,
    /// Valid records folded
    pub records: u64,
    /// Sum of the folded counts
    pub total: u64,
    /// Lines dropped as malformed
    pub dropped: u64,
}

/// Global table plus per-participant merge records
///
/// Every record goes through plain [`CountTable::increment`], whether or not
/// the key is already present.
#[derive(Debug)]
pub struct MergeAggregator {
    codec: WireCodec,
    global: CountTable,
    contributions: Vec<Contribution>,
}

impl MergeAggregator {
    pub fn new(codec: WireCodec) -> Self {
        Self {
            codec,
            global: CountTable::global(),
            contributions: Vec::new(),
        }
    }

    /// Decode one participant's partial and add it to the global table
    pub fn fold(&mut self, rank: usize, region: &[u8]) -> &Contribution {
        let mut contribution = Contribution {
            rank,
            bytes: region.len() as u64,
            ..Default::default()
        };

        let mut records = self.codec.decode(region);
        for (key, count) in records.by_ref() {
            self.global.increment(key, count);
            contribution.records += 1;
            contribution.total = contribution.total.saturating_add(count);
        }
        contribution.dropped = records.dropped();

        if contribution.dropped > 0 {
            debug!(rank, dropped = contribution.dropped, "dropped malformed wire records");
        }

        self.contributions.push(contribution);
        &self.contributions[self.contributions.len() - 1]
    }

    /// Number of partials folded so far
    pub fn num_partials(&self) -> usize {
        self.contributions.len()
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    /// Malformed wire lines across every partial
    pub fn dropped(&self) -> u64 {
        self.contributions.iter().map(|c| c.dropped).sum()
    }

    pub fn global(&self) -> &CountTable {
        &self.global
    }

    pub fn into_global(self) -> CountTable {
        self.global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregator_new() {
        let aggregator = MergeAggregator::new(WireCodec::default());
        assert_eq!(aggregator.num_partials(), 0);
        assert!(aggregator.global().is_empty());
        assert_eq!(aggregator.dropped(), 0);
    }

    #[test]
    fn test_first_insertion_takes_full_count() {
        let mut aggregator = MergeAggregator::new(WireCodec::default());
        aggregator.fold(1, b"love\t7\n");
        assert_eq!(aggregator.global().get("love"), Some(7));
    }

    #[test]
    fn test_fold_is_additive() {
        let mut aggregator = MergeAggregator::new(WireCodec::default());
        aggregator.fold(0, b"");
        aggregator.fold(1, b"love\t2\nwar\t1\n");
        aggregator.fold(2, b"love\t1\npeace\t1");

        let global = aggregator.global();
        assert_eq!(global.get("love"), Some(3));
        assert_eq!(global.get("war"), Some(1));
        assert_eq!(global.get("peace"), Some(1));
        assert_eq!(global.total(), 5);
        assert_eq!(aggregator.num_partials(), 3);
    }

    #[test]
    fn test_contributions_recorded() {
        let mut aggregator = MergeAggregator::new(WireCodec::default());
        let c = *aggregator.fold(3, b"a\t2\nbroken\nb\t5\n");

        assert_eq!(c.rank, 3);
        assert_eq!(c.bytes, 15);
        assert_eq!(c.records, 2);
        assert_eq!(c.total, 7);
        assert_eq!(c.dropped, 1);
        assert_eq!(aggregator.dropped(), 1);
    }

    #[test]
    fn test_malformed_lines_do_not_touch_table() {
        let mut aggregator = MergeAggregator::new(WireCodec::default());
        aggregator.fold(1, b"\t4\nkey\t\nkey\tx1\nkey\t0\n");

        assert!(aggregator.global().is_empty());
        assert_eq!(aggregator.dropped(), 4);
    }

    #[test]
    fn test_rightmost_separator_wins() {
        let mut aggregator = MergeAggregator::new(WireCodec::default());
        aggregator.fold(1, b"two\tpart\t3\n");
        assert_eq!(aggregator.global().get("two\tpart"), Some(3));
    }
}
