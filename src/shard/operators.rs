//! Per-operator change-batch transforms.
//!
//! Each operator either rewrites and re-emits a batch immediately (`Map`, `Join`,
//! `TimestampPush/Increment/Pop`, `Union`), queues it without transformation (`Output`),
//! or defers all work to a later frontier-driven reaction (`Index`, `Distinct`), in which
//! case dispatch only registers a capability at the changed timestamps. Grounded on
//! `differential-dataflow`'s join/arrange operator bodies for the batch-rewrite shape and
//! on `consolidation.rs` for re-coalescing after a rewrite.

use std::collections::HashSet;

use crate::change::{Change, ChangeBatch, ChangeBatchBuilder};
use crate::graph::{Node, NodeSpec};
use crate::index::Index;
use crate::timestamp::Timestamp;

use super::state::NodeState;

/// What dispatching a batch at a node produced.
pub struct DispatchResult {
    /// A batch to enqueue on every downstream `NodeInput`, if any survived coalescing.
    pub emit: Option<ChangeBatch>,
    /// Capability diffs to post at this node's own pointstamp (`NodeInput::new(node,
    /// 0)`), for operators (`Index`, `Distinct`, `Reduce`) that hold back timestamps
    /// pending a frontier reaction.
    pub capability_diffs: Vec<(Timestamp, i64)>,
}

impl DispatchResult {
    fn emit_only(batch: Option<ChangeBatch>) -> Self {
        DispatchResult { emit: batch, capability_diffs: Vec::new() }
    }

    fn none() -> Self {
        DispatchResult { emit: None, capability_diffs: Vec::new() }
    }
}

/// Dispatches one incoming batch, arriving at input port `port`, to `node`'s operator.
///
/// `other_index` is `Some` only for `Join`, and must be the materialized index of the
/// *other* input (the one not matching `port`).
///
/// # Panics
/// Panics if `spec` is `Input` (an Input node never receives a batch on an input port —
/// it is only ever driven by `push_input`/`flush_input`) or if `state`'s variant doesn't
/// match `spec`'s shape (a `Shard` invariant violation, not a caller error).
pub fn dispatch(
    node: Node,
    port: usize,
    spec: &NodeSpec,
    other_index: Option<&Index>,
    state: &mut NodeState,
    batch: &ChangeBatch,
) -> DispatchResult {
    match spec {
        NodeSpec::Input => panic!("Input node {node:?} received a change batch on its input port"),

        NodeSpec::Map { f, .. } => {
            let mut builder = ChangeBatchBuilder::new();
            for change in batch.changes() {
                builder.push(Change::new(f(&change.row), change.timestamp.clone(), change.diff));
            }
            DispatchResult::emit_only(builder.finish().ok())
        }

        NodeSpec::Index { .. } => {
            let pending_changes = match state {
                NodeState::Index { pending_changes, .. } => pending_changes,
                _ => unreachable!("Index node without Index state"),
            };
            let mut diffs = Vec::with_capacity(batch.changes().len());
            for change in batch.changes() {
                pending_changes.push(change.clone());
                diffs.push((change.timestamp.clone(), 1));
            }
            DispatchResult { emit: None, capability_diffs: diffs }
        }

        NodeSpec::Join { key_columns, .. } => {
            let other = other_index.expect("Join dispatch requires the other input's index");
            let mut builder = ChangeBatchBuilder::new();
            for change in batch.changes() {
                let key = change.row.key_prefix(*key_columns);
                for other_batch in other.batches() {
                    for other_change in other_batch.changes() {
                        if other_change.row.key_prefix(*key_columns) == key {
                            let row = if port == 0 {
                                change.row.concat(&other_change.row)
                            } else {
                                other_change.row.concat(&change.row)
                            };
                            let diff = change.diff * other_change.diff;
                            let ts = change.timestamp.least_upper_bound(&other_change.timestamp);
                            builder.push(Change::new(row, ts, diff));
                        }
                    }
                }
            }
            DispatchResult::emit_only(builder.finish().ok())
        }

        NodeSpec::Output { .. } => {
            match state {
                NodeState::Output { queue } => queue.push_back(batch.clone()),
                _ => unreachable!("Output node without Output state"),
            }
            DispatchResult::none()
        }

        NodeSpec::TimestampPush { .. } => rewrite_timestamps(batch, Timestamp::push_coord),
        NodeSpec::TimestampIncrement { .. } => rewrite_timestamps(batch, Timestamp::increment_coord),
        NodeSpec::TimestampPop { .. } => rewrite_timestamps(batch, Timestamp::pop_coord),

        NodeSpec::Union { .. } => DispatchResult::emit_only(Some(batch.clone())),

        NodeSpec::Distinct { .. } => {
            let (pending_timestamps, seen) = match state {
                NodeState::Distinct { pending_timestamps, seen, .. } => (pending_timestamps, seen),
                _ => unreachable!("Distinct node without Distinct state"),
            };
            let mut diffs = Vec::new();
            for change in batch.changes() {
                register_pending_timestamp(pending_timestamps, seen, change.timestamp.clone(), &mut diffs);
            }
            DispatchResult { emit: None, capability_diffs: diffs }
        }

        #[cfg(feature = "reduce")]
        NodeSpec::Reduce { .. } => {
            let (pending_timestamps, seen) = match state {
                NodeState::Reduce { pending_timestamps, seen, .. } => (pending_timestamps, seen),
                _ => unreachable!("Reduce node without Reduce state"),
            };
            let mut diffs = Vec::new();
            for change in batch.changes() {
                register_pending_timestamp(pending_timestamps, seen, change.timestamp.clone(), &mut diffs);
            }
            DispatchResult { emit: None, capability_diffs: diffs }
        }
    }
}

fn rewrite_timestamps(batch: &ChangeBatch, f: impl Fn(&Timestamp) -> Timestamp) -> DispatchResult {
    let mut builder = ChangeBatchBuilder::new();
    for change in batch.changes() {
        builder.push(Change::new(change.row.clone(), f(&change.timestamp), change.diff));
    }
    DispatchResult::emit_only(builder.finish().ok())
}

/// Registers `t` in `pending_timestamps`/`seen` if new, and the least upper bound of `t`
/// with every timestamp already pending before this call. Each newly-registered
/// timestamp contributes `(+1)` to `diffs`.
fn register_pending_timestamp(
    pending_timestamps: &mut Vec<Timestamp>,
    seen: &mut HashSet<Timestamp>,
    t: Timestamp,
    diffs: &mut Vec<(Timestamp, i64)>,
) {
    if !insert_pending(pending_timestamps, seen, t.clone(), diffs) {
        return;
    }
    // `t` was new: register leastUpperBound(t, u) for every timestamp that was already
    // pending (captured before `t` itself was pushed, hence the clone up front).
    let existing: Vec<Timestamp> = pending_timestamps[..pending_timestamps.len() - 1].to_vec();
    for u in existing {
        let lub = t.least_upper_bound(&u);
        insert_pending(pending_timestamps, seen, lub, diffs);
    }
}

fn insert_pending(
    pending_timestamps: &mut Vec<Timestamp>,
    seen: &mut HashSet<Timestamp>,
    t: Timestamp,
    diffs: &mut Vec<(Timestamp, i64)>,
) -> bool {
    if seen.insert(t.clone()) {
        pending_timestamps.push(t.clone());
        diffs.push((t, 1));
        true
    } else {
        false
    }
}
