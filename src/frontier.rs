//! `Frontier` (an antichain of timestamps) and `SupportedFrontier` (a reference-counted
//! multiset whose frontier is the antichain of its minima).
//!
//! Grounded on the `Antichain`/`MutableAntichain` pair from the timely-dataflow progress
//! tracker: an immutable-shape antichain that only ever grows by evicting dominated
//! elements, plus a mutable, ref-counted version used to track "how many things still
//! want this timestamp to remain possible."

use std::collections::HashMap;

use crate::timestamp::{CausalOrder, Timestamp};

/// A signed change to a frontier: `+1` means a timestamp entered the antichain, `-1`
/// that it left.
pub type FrontierChange = (Timestamp, i64);

/// A set of pairwise causally-incomparable timestamps.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    elements: Vec<Timestamp>,
}

impl Frontier {
    /// An empty frontier (the frontier of "everything is still possible").
    pub fn new() -> Self {
        Frontier { elements: Vec::new() }
    }

    /// The antichain's elements.
    pub fn elements(&self) -> &[Timestamp] {
        &self.elements
    }

    /// Compares `t` against every element of the frontier. Returns `Lt`/`Eq` if some
    /// element is `<=` t (the frontier "has passed" t), `Gt` if every element is
    /// strictly greater than t (t is in the future of the frontier), `None` if neither
    /// holds for every element uniformly (elements disagree, or the frontier is empty
    /// and t is vacuously in its future -> `Gt`... see below for the empty case).
    pub fn causal_order(&self, t: &Timestamp) -> CausalOrder {
        if self.elements.is_empty() {
            // No element bounds the future: every timestamp is still possible, i.e.
            // strictly ahead of (beyond) the frontier.
            return CausalOrder::Gt;
        }
        let mut saw_lt = false;
        let mut saw_eq = false;
        let mut all_gt = true;
        for e in &self.elements {
            match e.causal_order(t) {
                CausalOrder::Lt => {
                    saw_lt = true;
                    all_gt = false;
                }
                CausalOrder::Eq => {
                    saw_eq = true;
                    all_gt = false;
                }
                CausalOrder::Gt => {}
                CausalOrder::None => {
                    all_gt = false;
                }
            }
        }
        if saw_lt {
            CausalOrder::Lt
        } else if saw_eq {
            CausalOrder::Eq
        } else if all_gt {
            CausalOrder::Gt
        } else {
            CausalOrder::None
        }
    }

    /// True iff the frontier has passed `t` (comparison is `Lt` or `Eq`): some frontier
    /// element is still at or below `t`, i.e. updates at `t` remain admissible.
    pub fn has_passed(&self, t: &Timestamp) -> bool {
        self.causal_order(t).has_passed()
    }

    /// True iff the frontier has strictly finalized `t` (comparison is `Gt`): every
    /// frontier element is beyond `t`, so no further update at or before `t` can ever
    /// arrive and anything pending at `t` may be released.
    pub fn has_finalized(&self, t: &Timestamp) -> bool {
        matches!(self.causal_order(t), CausalOrder::Gt)
    }

    /// Advances the antichain to include `t`, evicting any elements `t` dominates.
    ///
    /// # Panics
    /// Panics if `t` is strictly less than some existing element — advancing backwards
    /// is a programmer error.
    pub fn advance(&mut self, t: Timestamp, out: &mut Vec<FrontierChange>) {
        if self.elements.iter().any(|e| e == &t) {
            return; // already present, no-op
        }
        assert!(
            !self.elements.iter().any(|e| matches!(e.causal_order(&t), CausalOrder::Gt)),
            "frontier advancing backwards"
        );
        // t already dominated by an existing, strictly smaller element: no-op.
        if self
            .elements
            .iter()
            .any(|e| matches!(e.causal_order(&t), CausalOrder::Lt))
        {
            return;
        }
        let mut i = 0;
        while i < self.elements.len() {
            if matches!(self.elements[i].causal_order(&t), CausalOrder::Gt) {
                let removed = self.elements.remove(i);
                out.push((removed, -1));
            } else {
                i += 1;
            }
        }
        out.push((t.clone(), 1));
        self.elements.push(t);
    }

    /// Retreats the antichain to include `t`, evicting any elements greater than `t`.
    ///
    /// A no-op if `t` is already present, or if an existing element already establishes
    /// a tighter (causally less-than) bound than `t` would — that element is a genuine
    /// lower minimum and `t` carries no new information.
    pub fn retreat(&mut self, t: Timestamp, out: &mut Vec<FrontierChange>) {
        if self.elements.iter().any(|e| e == &t) {
            return;
        }
        // t is dominated by an existing, strictly smaller element: no-op.
        if self
            .elements
            .iter()
            .any(|e| matches!(e.causal_order(&t), CausalOrder::Lt))
        {
            return;
        }
        let mut i = 0;
        while i < self.elements.len() {
            if matches!(self.elements[i].causal_order(&t), CausalOrder::Gt) {
                let removed = self.elements.remove(i);
                out.push((removed, -1));
            } else {
                i += 1;
            }
        }
        out.push((t.clone(), 1));
        self.elements.push(t);
    }
}

/// A timestamp → positive reference count map whose derived `Frontier` is the antichain
/// of minima of the support set.
#[derive(Debug, Clone, Default)]
pub struct SupportedFrontier {
    support: HashMap<Timestamp, i64>,
    frontier: Frontier,
}

impl SupportedFrontier {
    /// An empty supported frontier.
    pub fn new() -> Self {
        SupportedFrontier {
            support: HashMap::new(),
            frontier: Frontier::new(),
        }
    }

    /// The derived frontier (antichain of minima of the support set).
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Applies a signed change to the support count of `t`, rebuilding the minima where
    /// necessary, and appends the resulting frontier changes to `out`.
    pub fn update(&mut self, t: Timestamp, diff: i64, out: &mut Vec<FrontierChange>) {
        if diff == 0 {
            return;
        }
        let was_on_frontier = self.frontier.elements.iter().any(|e| e == &t);
        let entry = self.support.entry(t.clone()).or_insert(0);
        *entry += diff;
        let count = *entry;
        assert!(count >= 0, "support count went negative for a timestamp");

        if count == 0 {
            self.support.remove(&t);
            if was_on_frontier {
                self.remove_from_frontier_and_admit_minima(&t, out);
            }
        } else if !was_on_frontier {
            // A timestamp with positive support that isn't (yet) on the frontier: admit
            // it if the frontier hasn't already passed it, evicting anything it
            // dominates.
            if !self.frontier.has_passed(&t) {
                self.insert_into_frontier(t, out);
            }
        }
    }

    fn insert_into_frontier(&mut self, t: Timestamp, out: &mut Vec<FrontierChange>) {
        let mut i = 0;
        while i < self.frontier.elements.len() {
            if matches!(self.frontier.elements[i].causal_order(&t), CausalOrder::Gt) {
                let removed = self.frontier.elements.remove(i);
                out.push((removed, -1));
            } else {
                i += 1;
            }
        }
        out.push((t.clone(), 1));
        self.frontier.elements.push(t);
    }

    /// Removes `t` from the frontier (it dropped to zero support) and scans the
    /// remaining support for timestamps that were shadowed by `t` but now qualify as new
    /// minima.
    fn remove_from_frontier_and_admit_minima(&mut self, t: &Timestamp, out: &mut Vec<FrontierChange>) {
        if let Some(pos) = self.frontier.elements.iter().position(|e| e == t) {
            self.frontier.elements.remove(pos);
            out.push((t.clone(), -1));
        }
        // Any remaining-support timestamp not dominated by the (new, smaller) frontier
        // is a candidate minimum; insert those that the frontier hasn't already passed
        // and that aren't dominated by another candidate.
        let mut candidates: Vec<Timestamp> = self
            .support
            .keys()
            .filter(|candidate| !self.frontier.has_passed(candidate))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.lexical_order(b));
        for candidate in candidates {
            if !self.frontier.elements.iter().any(|e| e == &candidate)
                && !self.frontier.has_passed(&candidate)
            {
                self.insert_into_frontier(candidate, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retreat_example_s3() {
        let mut f = Frontier::new();
        let mut changes = Vec::new();
        f.advance(Timestamp::from_coords([2, 1]), &mut changes);
        f.advance(Timestamp::from_coords([1, 2]), &mut changes);
        changes.clear();
        f.retreat(Timestamp::from_coords([1, 1]), &mut changes);
        assert_eq!(f.elements(), &[Timestamp::from_coords([1, 1])]);
        changes.sort_by(|a, b| a.0.lexical_order(&b.0));
        let mut expected = vec![
            (Timestamp::from_coords([1, 1]), 1),
            (Timestamp::from_coords([1, 2]), -1),
            (Timestamp::from_coords([2, 1]), -1),
        ];
        expected.sort_by(|a, b| a.0.lexical_order(&b.0));
        assert_eq!(changes, expected);
    }

    #[test]
    fn supported_frontier_admits_shadowed_minima() {
        let mut sf = SupportedFrontier::new();
        let mut out = Vec::new();
        sf.update(Timestamp::from_coords([1]), 1, &mut out);
        sf.update(Timestamp::from_coords([2]), 1, &mut out);
        // [2] has positive support but is dominated by [1], so it never entered the
        // frontier and shouldn't appear in `out` as a +1 on the frontier.
        assert_eq!(sf.frontier().elements(), &[Timestamp::from_coords([1])]);

        out.clear();
        sf.update(Timestamp::from_coords([1]), -1, &mut out);
        // Now [2] should be admitted as the new minimum.
        assert_eq!(sf.frontier().elements(), &[Timestamp::from_coords([2])]);
    }

    #[test]
    fn no_two_frontier_elements_are_comparable() {
        let mut sf = SupportedFrontier::new();
        let mut out = Vec::new();
        for coords in [[1, 5], [5, 1], [3, 3]] {
            sf.update(Timestamp::from_coords(coords), 1, &mut out);
        }
        let elems = sf.frontier().elements();
        for i in 0..elems.len() {
            for j in 0..elems.len() {
                if i != j {
                    assert!(matches!(elems[i].causal_order(&elems[j]), CausalOrder::None));
                }
            }
        }
    }
}
