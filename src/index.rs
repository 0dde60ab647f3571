//! `Index`: an append-only log of change batches, and `Bag`: a materialized multiset at
//! a point in time.
//!
//! Grounded on `differential-dataflow`'s trace (`src/trace/mod.rs`): a trace is an
//! append-only sequence of batches that can be queried for "the accumulation as of a
//! time" by filtering batches whose lower bound has passed and then per-change
//! timestamps within the surviving batches.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use fnv::FnvHasher;

use crate::change::ChangeBatch;
use crate::timestamp::Timestamp;
use crate::value::Row;

/// A materialized multiset: row → net count, with zero counts always removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bag {
    counts: HashMap<Row, i64, BuildHasherDefault<FnvHasher>>,
}

impl Bag {
    /// An empty bag.
    pub fn new() -> Self {
        Bag { counts: Default::default() }
    }

    /// The net count for `row`, or zero if absent.
    pub fn count(&self, row: &Row) -> i64 {
        self.counts.get(row).copied().unwrap_or(0)
    }

    /// Iterates `(row, count)` pairs; every count is non-zero.
    pub fn iter(&self) -> impl Iterator<Item = (&Row, i64)> {
        self.counts.iter().map(|(r, c)| (r, *c))
    }

    /// Adds `diff` to `row`'s count, removing the entry if it nets to zero.
    fn add(&mut self, row: Row, diff: i64) {
        let entry = self.counts.entry(row.clone()).or_insert(0);
        *entry += diff;
        if *entry == 0 {
            self.counts.remove(&row);
        }
    }

    /// The number of rows with non-zero count.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True if every row has zero count.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// An append-only list of [`ChangeBatch`]es, queryable as of any timestamp.
#[derive(Debug, Clone, Default)]
pub struct Index {
    batches: Vec<ChangeBatch>,
}

impl Index {
    /// An empty index.
    pub fn new() -> Self {
        Index { batches: Vec::new() }
    }

    /// Appends a batch. O(1).
    pub fn append(&mut self, batch: ChangeBatch) {
        self.batches.push(batch);
    }

    /// All appended batches, in append order.
    pub fn batches(&self) -> &[ChangeBatch] {
        &self.batches
    }

    /// Sums diffs for every row across batches whose lower bound has passed `t` and
    /// whose individual change timestamps have passed `t`, returning the resulting
    /// [`Bag`] with zero counts removed.
    ///
    /// Batches whose lower bound has *not* passed `t` are skipped wholesale (no change
    /// in them could have a timestamp that has passed `t` either, since the lower bound
    /// is the antichain of minima).
    pub fn bag_as_of(&self, t: &Timestamp) -> Bag {
        let mut bag = Bag::new();
        for batch in &self.batches {
            if !batch.lower_bound().has_passed(t) {
                continue;
            }
            for change in batch.changes() {
                if change.timestamp.causal_order(t).has_passed() {
                    bag.add(change.row.clone(), change.diff);
                }
            }
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Change, ChangeBatchBuilder};
    use crate::value::Value;

    fn row(n: i64) -> Row {
        Row::new([Value::Number(n as f64)])
    }

    #[test]
    fn bag_as_of_is_monotone_in_batch_history() {
        let mut index = Index::new();
        let mut b = ChangeBatchBuilder::new();
        b.push(Change::new(row(1), Timestamp::from_coords([0]), 1));
        index.append(b.finish().unwrap());

        let before = index.bag_as_of(&Timestamp::from_coords([0]));

        let mut later = ChangeBatchBuilder::new();
        later.push(Change::new(row(2), Timestamp::from_coords([5]), 1));
        index.append(later.finish().unwrap());

        let after = index.bag_as_of(&Timestamp::from_coords([0]));
        assert_eq!(before, after);
    }

    #[test]
    fn bag_collapses_double_counted_rows() {
        let mut index = Index::new();
        let mut b = ChangeBatchBuilder::new();
        let t = Timestamp::from_coords([0]);
        b.push(Change::new(row(1), t.clone(), 1));
        index.append(b.finish().unwrap());
        let mut b2 = ChangeBatchBuilder::new();
        b2.push(Change::new(row(1), t.clone(), 1));
        index.append(b2.finish().unwrap());

        let bag = index.bag_as_of(&t);
        assert_eq!(bag.count(&row(1)), 2);
    }
}
