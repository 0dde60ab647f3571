//! Vector timestamps and the causal order over them.
//!
//! Modeled after the legacy `PointStamp<T>` vocabulary (product order, comparison that
//! extends a shorter vector with a minimum element) but specialized to fixed-length
//! coordinate vectors of `u64`, since every timestamp that meets another in this engine
//! is required to share a length (they live in the same subgraph scope path).

use std::cmp::Ordering as StdOrdering;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Inline storage for the common case of a handful of nested scopes.
pub type Coords = SmallVec<[u64; 4]>;

/// A fixed-length vector of unsigned coordinates: one per enclosing subgraph scope, the
/// root scope's counter first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    coords: Coords,
}

/// The result of comparing two timestamps (or a frontier and a timestamp) under the
/// causal order: a three-valued (plus incomparable) partial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// Strictly less.
    Lt,
    /// Equal.
    Eq,
    /// Strictly greater.
    Gt,
    /// Pairwise coordinates disagree: no order relation holds.
    None,
}

impl CausalOrder {
    /// True for `Lt` or `Eq` — "has passed" in frontier terminology.
    pub fn has_passed(self) -> bool {
        matches!(self, CausalOrder::Lt | CausalOrder::Eq)
    }
}

impl Timestamp {
    /// The all-zeros timestamp of the given length.
    pub fn least(len: usize) -> Self {
        Timestamp {
            coords: std::iter::repeat(0).take(len).collect(),
        }
    }

    /// Builds a timestamp from explicit coordinates.
    pub fn from_coords<I: IntoIterator<Item = u64>>(coords: I) -> Self {
        Timestamp {
            coords: coords.into_iter().collect(),
        }
    }

    /// The number of coordinates (nesting depth + 1).
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// True if this timestamp has no coordinates (only possible for the unnested root,
    /// which never actually appears as a live timestamp but is useful as a default).
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Read-only view of the coordinates.
    pub fn coords(&self) -> &[u64] {
        &self.coords
    }

    /// Enters a nested scope: appends a zero coordinate.
    pub fn push_coord(&self) -> Self {
        let mut coords = self.coords.clone();
        coords.push(0);
        Timestamp { coords }
    }

    /// Leaves the innermost scope: drops the last coordinate.
    ///
    /// # Panics
    /// Panics if the timestamp has no coordinates — this is a programmer error (popping
    /// the root).
    pub fn pop_coord(&self) -> Self {
        assert!(!self.coords.is_empty(), "popCoord on a length-0 timestamp");
        let mut coords = self.coords.clone();
        coords.pop();
        Timestamp { coords }
    }

    /// Iterates the innermost scope: adds one to the last coordinate.
    ///
    /// # Panics
    /// Panics if the timestamp has no coordinates.
    pub fn increment_coord(&self) -> Self {
        assert!(!self.coords.is_empty(), "incrementCoord on a length-0 timestamp");
        let mut coords = self.coords.clone();
        *coords.last_mut().unwrap() += 1;
        Timestamp { coords }
    }

    /// Coordinate-wise partial order. Both timestamps must have the same length.
    ///
    /// # Panics
    /// Panics if the lengths differ — timestamps of unequal length are never meant to be
    /// compared directly (they live in different scope paths).
    pub fn causal_order(&self, other: &Timestamp) -> CausalOrder {
        assert_eq!(
            self.coords.len(),
            other.coords.len(),
            "causal order compares timestamps of unequal length"
        );
        let mut any_lt = false;
        let mut any_gt = false;
        for (a, b) in self.coords.iter().zip(other.coords.iter()) {
            match a.cmp(b) {
                StdOrdering::Less => any_lt = true,
                StdOrdering::Greater => any_gt = true,
                StdOrdering::Equal => {}
            }
        }
        match (any_lt, any_gt) {
            (false, false) => CausalOrder::Eq,
            (true, false) => CausalOrder::Lt,
            (false, true) => CausalOrder::Gt,
            (true, true) => CausalOrder::None,
        }
    }

    /// A total order extending the causal order, used only as a tiebreaker (e.g. to
    /// schedule Distinct reactions so each timestamp sees its causally-earlier siblings
    /// resolved first). Lexicographic over coordinates.
    pub fn lexical_order(&self, other: &Timestamp) -> StdOrdering {
        self.coords.cmp(&other.coords)
    }

    /// Coordinate-wise maximum: the least timestamp dominating both arguments.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    pub fn least_upper_bound(&self, other: &Timestamp) -> Timestamp {
        assert_eq!(
            self.coords.len(),
            other.coords.len(),
            "least upper bound of timestamps of unequal length"
        );
        let coords = self
            .coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| (*a).max(*b))
            .collect();
        Timestamp { coords }
    }
}

// `PartialOrd`/`Ord` give timestamps a total order for use as e.g. `BTreeMap` keys and
// for the lexical sort used by batch consolidation; they agree with `lexical_order`
// exactly and are distinct from the causal partial order exposed above.
impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<StdOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> StdOrdering {
        self.lexical_order(other)
    }
}
