//! `Change`, `ChangeBatch`, and `ChangeBatchBuilder`.
//!
//! The builder's sort-and-coalesce step is lifted directly from
//! `differential-dataflow::consolidation::consolidate_updates_slice`: sort by the
//! (data, time) key, walk runs of equal keys accumulating the diff, drop runs that sum
//! to zero.

use thiserror::Error;

use crate::frontier::Frontier;
use crate::timestamp::Timestamp;
use crate::value::Row;

/// A single incremental update: `diff` copies of `row` appear (if positive) or are
/// retracted (if negative) as of `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The affected row.
    pub row: Row,
    /// The logical time at which the change takes effect.
    pub timestamp: Timestamp,
    /// Signed multiplicity delta.
    pub diff: i64,
}

impl Change {
    /// Builds a change.
    pub fn new(row: Row, timestamp: Timestamp, diff: i64) -> Self {
        Change { row, timestamp, diff }
    }
}

/// Building an empty batch is a programmer error: every batch that reaches a downstream
/// queue or index must carry at least one change.
#[derive(Debug, Error)]
pub enum ChangeBatchError {
    /// Every accumulated change cancelled to a zero diff.
    #[error("change batch builder produced no non-zero changes")]
    Empty,
}

/// An immutable, non-empty, sorted and coalesced group of changes, plus the antichain of
/// minimal timestamps appearing in it (the batch's lower bound).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    changes: Vec<Change>,
    lower_bound: Frontier,
}

impl ChangeBatch {
    /// The changes, sorted by `(row, timestamp)` with no duplicate `(row, timestamp)`
    /// pairs and no zero diffs.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// The antichain of minimal timestamps among this batch's changes.
    pub fn lower_bound(&self) -> &Frontier {
        &self.lower_bound
    }
}

/// Accumulates changes, then sorts, coalesces, and computes a lower bound to produce an
/// immutable [`ChangeBatch`].
#[derive(Debug, Default)]
pub struct ChangeBatchBuilder {
    changes: Vec<Change>,
}

impl ChangeBatchBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        ChangeBatchBuilder { changes: Vec::new() }
    }

    /// True if no changes have been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Appends a change to the (as yet unsorted) builder.
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Sorts, coalesces identical `(row, timestamp)` pairs by summing diffs (dropping
    /// the pair entirely if the sum is zero), and derives the lower-bound antichain by
    /// retreating an empty frontier through every surviving change's timestamp.
    ///
    /// # Errors
    /// Returns [`ChangeBatchError::Empty`] if every change cancelled to zero (S2): the
    /// caller must not forward or index an empty batch.
    pub fn finish(mut self) -> Result<ChangeBatch, ChangeBatchError> {
        self.changes
            .sort_by(|a, b| (&a.row, &a.timestamp).cmp(&(&b.row, &b.timestamp)));

        let mut coalesced: Vec<Change> = Vec::with_capacity(self.changes.len());
        let mut iter = self.changes.into_iter();
        if let Some(first) = iter.next() {
            let mut current = first;
            for next in iter {
                if next.row == current.row && next.timestamp == current.timestamp {
                    current.diff += next.diff;
                } else {
                    if current.diff != 0 {
                        coalesced.push(current);
                    }
                    current = next;
                }
            }
            if current.diff != 0 {
                coalesced.push(current);
            }
        }

        if coalesced.is_empty() {
            return Err(ChangeBatchError::Empty);
        }

        let mut lower_bound = Frontier::new();
        let mut scratch = Vec::new();
        for change in &coalesced {
            scratch.clear();
            lower_bound.retreat(change.timestamp.clone(), &mut scratch);
        }

        Ok(ChangeBatch {
            changes: coalesced,
            lower_bound,
        })
    }
}
