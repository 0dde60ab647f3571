//! Property-based checks for the timestamp, frontier, change-batch, and index
//! invariants the executor leans on.

use proptest::prelude::*;

use differential_core::{CausalOrder, Change, ChangeBatchBuilder, Index, SupportedFrontier, Timestamp};
use differential_core::value::{Row, Value};

fn coords(size: impl Into<proptest::collection::SizeRange>) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..50, size)
}

fn row(n: i64) -> Row {
    Row::new([Value::Number(n as f64)])
}

proptest! {
    /// pushCoord appends a zero coordinate; popCoord removes the last one. Round-tripping
    /// through both must be the identity, for any starting coordinate vector.
    #[test]
    fn push_then_pop_is_identity(c in coords(0..4usize)) {
        let t = Timestamp::from_coords(c);
        prop_assert_eq!(t.push_coord().pop_coord(), t);
    }

    /// incrementCoord touches only the last coordinate, and only ever increases it.
    #[test]
    fn increment_only_changes_last_coord(c in coords(1..4usize)) {
        let t = Timestamp::from_coords(c.clone());
        let incremented = t.increment_coord();
        prop_assert_eq!(&incremented.coords()[..c.len() - 1], &c[..c.len() - 1]);
        prop_assert_eq!(incremented.coords()[c.len() - 1], c[c.len() - 1] + 1);
    }

    /// A `SupportedFrontier` built from nothing but `+1` updates (so support counts never
    /// go negative) always keeps its frontier an antichain: no two elements are causally
    /// comparable.
    #[test]
    fn supported_frontier_elements_are_pairwise_incomparable(
        raw in prop::collection::vec(coords(2usize), 0..20)
    ) {
        let mut sf = SupportedFrontier::new();
        let mut scratch = Vec::new();
        for c in raw {
            sf.update(Timestamp::from_coords(c), 1, &mut scratch);
            scratch.clear();
        }
        let elems = sf.frontier().elements();
        for i in 0..elems.len() {
            for j in 0..elems.len() {
                if i != j {
                    prop_assert!(matches!(elems[i].causal_order(&elems[j]), CausalOrder::None));
                }
            }
        }
    }

    /// Every change in a finished batch has a timestamp the batch's own lower bound has
    /// passed: the lower bound, by construction, never sits strictly ahead of anything
    /// the batch actually carries.
    #[test]
    fn change_batch_lower_bound_is_passed_by_every_change(
        entries in prop::collection::vec((0i64..8, 0u64..12, -3i64..4), 1..30)
    ) {
        let mut builder = ChangeBatchBuilder::new();
        for (r, t, diff) in entries {
            if diff != 0 {
                builder.push(Change::new(row(r), Timestamp::from_coords([t]), diff));
            }
        }
        if let Ok(batch) = builder.finish() {
            for change in batch.changes() {
                prop_assert!(batch.lower_bound().has_passed(&change.timestamp));
            }
            // single-coordinate timestamps are totally ordered, so the antichain of
            // minima can only ever hold one element.
            prop_assert!(batch.lower_bound().elements().len() <= 1);
        }
    }

    /// Appending a batch whose every timestamp lies strictly beyond `t` must never change
    /// what `bag_as_of(t)` reports.
    #[test]
    fn bag_as_of_ignores_batches_entirely_beyond_t(
        future in prop::collection::vec((0i64..8, 1u64..20), 1..15)
    ) {
        let pivot = Timestamp::from_coords([0u64]);
        let mut index = Index::new();
        let before = index.bag_as_of(&pivot);
        prop_assert!(before.is_empty());

        let mut builder = ChangeBatchBuilder::new();
        for (r, t) in future {
            builder.push(Change::new(row(r), Timestamp::from_coords([t]), 1));
        }
        if let Ok(batch) = builder.finish() {
            index.append(batch);
        }

        let after = index.bag_as_of(&pivot);
        prop_assert!(after.is_empty(), "a batch entirely beyond the pivot must not affect bag_as_of(pivot)");
    }
}
