//! `NodeState`: per-node mutable state, parallel to [`crate::graph::NodeSpec`].
//!
//! Grounded on `differential-dataflow`'s split between a static operator description and
//! the mutable trace/buffer state an operator instance carries at runtime (see
//! `src/operators/arrange/arrangement.rs`'s `TraceAgent` holding a trace plus pending
//! batches) — here flattened into one enum per node kind, since this engine dispatches
//! through a single `match` rather than trait objects.

use std::collections::{HashSet, VecDeque};

use crate::change::{Change, ChangeBatch, ChangeBatchBuilder};
use crate::frontier::Frontier;
use crate::graph::NodeSpec;
use crate::index::Index;
use crate::timestamp::Timestamp;

/// Per-node mutable state. One variant per [`NodeSpec`] shape that needs to carry state
/// across calls; stateless operators (`Map`, `Join`, `TimestampPush/Increment/Pop`,
/// `Union`) still get an entry so that `Shard` can index state by node id uniformly.
#[derive(Debug)]
pub enum NodeState {
    /// An external input: an unflushed builder plus the frontier of admissible future
    /// pushes.
    Input {
        builder: ChangeBatchBuilder,
        frontier: Frontier,
    },
    /// A stateless pass-through or transform operator (`Map`, `Join`, `TimestampPush`,
    /// `TimestampIncrement`, `TimestampPop`, `Union`).
    Stateless,
    /// Materializes its input: changes accumulate in `pending_changes` until the input
    /// frontier releases them into `index` and downstream.
    Index {
        index: Index,
        pending_changes: Vec<Change>,
    },
    /// A sink: unpopped batches queue here for `pop_output`.
    Output { queue: VecDeque<ChangeBatch> },
    /// Materializes its input as a set. `seen` tracks every timestamp ever admitted to
    /// `pending_timestamps` so the least-upper-bound closure doesn't re-register a
    /// timestamp (and re-count its capability) twice.
    Distinct {
        index: Index,
        pending_timestamps: Vec<Timestamp>,
        seen: HashSet<Timestamp>,
    },
    #[cfg(feature = "reduce")]
    Reduce {
        index: Index,
        pending_timestamps: Vec<Timestamp>,
        seen: HashSet<Timestamp>,
    },
}

impl NodeState {
    /// The initial state for a node with the given spec.
    pub fn for_spec(spec: &NodeSpec) -> Self {
        match spec {
            NodeSpec::Input => NodeState::Input {
                builder: ChangeBatchBuilder::new(),
                frontier: Frontier::new(),
            },
            NodeSpec::Index { .. } => NodeState::Index {
                index: Index::new(),
                pending_changes: Vec::new(),
            },
            NodeSpec::Output { .. } => NodeState::Output { queue: VecDeque::new() },
            NodeSpec::Distinct { .. } => NodeState::Distinct {
                index: Index::new(),
                pending_timestamps: Vec::new(),
                seen: HashSet::new(),
            },
            #[cfg(feature = "reduce")]
            NodeSpec::Reduce { .. } => NodeState::Reduce {
                index: Index::new(),
                pending_timestamps: Vec::new(),
                seen: HashSet::new(),
            },
            NodeSpec::Map { .. }
            | NodeSpec::Join { .. }
            | NodeSpec::TimestampPush { .. }
            | NodeSpec::TimestampIncrement { .. }
            | NodeSpec::TimestampPop { .. }
            | NodeSpec::Union { .. } => NodeState::Stateless,
        }
    }

    /// The node's own materialized index, for operators that have one (`Index`,
    /// `Distinct`, and `Reduce` behind its feature). `None` for every other kind.
    pub fn index(&self) -> Option<&Index> {
        match self {
            NodeState::Index { index, .. } | NodeState::Distinct { index, .. } => Some(index),
            #[cfg(feature = "reduce")]
            NodeState::Reduce { index, .. } => Some(index),
            _ => None,
        }
    }
}
