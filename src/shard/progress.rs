//! Pointstamps, the could-result-in order, and the diff map the propagation algorithm
//! drains.
//!
//! Modeled on the pointstamp/"summary" vocabulary of timely's progress-tracking
//! subgraphs: progress is tracked as signed counts at (location, timestamp) pairs, and
//! must be resolved in an order that respects nesting so that a feedback edge's effect on
//! an outer scope is only observed once the inner scope has fully settled for that
//! iteration.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::graph::{Graph, NodeInput};
use crate::timestamp::Timestamp;

/// A location in the graph at a specific timestamp — the atom progress tracking reasons
/// about. The location's scope path is not stored here; it is always looked up from the
/// [`Graph`], since it is static and recomputing it is cheaper than keeping two copies in
/// sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pointstamp {
    pub node_input: NodeInput,
    pub timestamp: Timestamp,
}

impl Pointstamp {
    pub fn new(node_input: NodeInput, timestamp: Timestamp) -> Self {
        Pointstamp { node_input, timestamp }
    }
}

/// The could-result-in order: walks the shared prefix of both pointstamps' scope paths,
/// comparing subgraph id then timestamp coordinate at each depth; the first inequality
/// decides. If the shared prefix is exhausted with no decision (one scope path is a
/// prefix of the other, or the paths are identical and so are the timestamps), falls
/// through to node id then input port as a stable tiebreaker.
pub fn could_result_in_order(graph: &Graph, a: &Pointstamp, b: &Pointstamp) -> Ordering {
    let path_a = graph.scope_path(a.node_input.node);
    let path_b = graph.scope_path(b.node_input.node);
    let depth = path_a.len().min(path_b.len());

    for i in 0..depth {
        match path_a[i].0.cmp(&path_b[i].0) {
            Ordering::Equal => {}
            other => return other,
        }
        let ca = a.timestamp.coords().get(i).copied().unwrap_or(0);
        let cb = b.timestamp.coords().get(i).copied().unwrap_or(0);
        match ca.cmp(&cb) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    match a.node_input.node.0.cmp(&b.node_input.node.0) {
        Ordering::Equal => {}
        other => return other,
    }
    a.node_input.port.cmp(&b.node_input.port)
}

/// The `unprocessed_frontier_diffs` map: pointstamp -> signed count, zero entries always
/// removed so `is_empty` is exact.
#[derive(Debug, Default)]
pub struct PointstampDiffs {
    diffs: HashMap<Pointstamp, i64>,
}

impl PointstampDiffs {
    pub fn new() -> Self {
        PointstampDiffs { diffs: HashMap::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        PointstampDiffs { diffs: HashMap::with_capacity(cap) }
    }

    /// Adds a signed diff at `(node_input, timestamp)`, removing the entry if it nets to
    /// zero.
    pub fn add(&mut self, node_input: NodeInput, timestamp: Timestamp, diff: i64) {
        if diff == 0 {
            return;
        }
        let key = Pointstamp::new(node_input, timestamp);
        let entry = self.diffs.entry(key.clone()).or_insert(0);
        *entry += diff;
        if *entry == 0 {
            self.diffs.remove(&key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    /// Removes and returns the pointstamp diff minimal under the could-result-in order,
    /// or `None` if empty. Linear scan: the core favors a straightforward, obviously
    /// correct priority selection over a specialized heap keyed by an order that depends
    /// on external graph state.
    pub fn pop_min(&mut self, graph: &Graph) -> Option<(Pointstamp, i64)> {
        let min_key = self
            .diffs
            .keys()
            .min_by(|a, b| could_result_in_order(graph, a, b))
            .cloned()?;
        let diff = self.diffs.remove(&min_key)?;
        Some((min_key, diff))
    }
}
