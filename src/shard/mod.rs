//! `Shard`: the executor. Owns every node's mutable state, the work queues, and the
//! progress tracker, and exposes the public API external collaborators drive.
//!
//! Modeled on a single-owner worker loop that polls queued batches and periodically
//! reconciles trace frontiers, draining queued batches before propagating progress on
//! each cooperative tick.

mod operators;
mod progress;
mod state;

pub use progress::{could_result_in_order, Pointstamp};
pub use state::NodeState;

#[cfg(feature = "reduce")]
use std::collections::HashMap;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::change::{Change, ChangeBatch, ChangeBatchBuilder};
use crate::error::ShardError;
use crate::frontier::SupportedFrontier;
use crate::graph::{Graph, Node, NodeInput, NodeSpec};
use crate::index::Index;
use crate::observer::{
    AdvanceInputEvent, ApplyFrontierUpdateEvent, DoWorkEvent, EmitChangeBatchEvent,
    FlushInputEvent, NoopObserver, PopOutputEvent, ProcessChangeBatchEvent,
    ProcessFrontierUpdateEvent, ProcessFrontierUpdateReactionEvent, ProcessFrontierUpdatesEvent,
    PushInputEvent, QueueFrontierUpdateEvent, ShardObserver,
};
use crate::timestamp::Timestamp;
use crate::value::Row;
use progress::PointstampDiffs;

/// Constructor knobs for a [`Shard`].
pub struct ShardConfig {
    /// Pre-sizing hint for per-node queues and the pointstamp-diff map. `0` means no
    /// pre-sizing.
    pub initial_capacity: usize,
    /// The debug-event sink. Defaults to a no-op.
    pub observer: Arc<dyn ShardObserver>,
}

impl Default for ShardConfig {
    fn default() -> Self {
        ShardConfig { initial_capacity: 0, observer: Arc::new(NoopObserver) }
    }
}

/// The executor: one instance per running dataflow.
pub struct Shard {
    graph: Graph,
    states: Vec<NodeState>,
    node_output_frontier: Vec<SupportedFrontier>,
    pointstamps: PointstampDiffs,
    pending_batches: VecDeque<(NodeInput, Arc<ChangeBatch>)>,
    observer: Arc<dyn ShardObserver>,
}

impl Shard {
    /// Builds a Shard over `graph` with default configuration.
    pub fn new(graph: Graph) -> Self {
        Shard::with_config(graph, ShardConfig::default())
    }

    /// Builds a Shard over `graph` with explicit configuration.
    pub fn with_config(graph: Graph, config: ShardConfig) -> Self {
        log::trace!("constructing Shard with {} nodes", graph.len());
        let states = graph.nodes().map(|n| NodeState::for_spec(graph.spec(n))).collect();
        let node_output_frontier = (0..graph.len()).map(|_| SupportedFrontier::new()).collect();
        Shard {
            graph,
            states,
            node_output_frontier,
            pointstamps: PointstampDiffs::with_capacity(config.initial_capacity),
            pending_batches: VecDeque::with_capacity(config.initial_capacity),
            observer: config.observer,
        }
    }

    /// The graph this Shard executes.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Appends one change to an Input node's unflushed builder, rejecting pushes at a
    /// timestamp the input frontier has already strictly finalized.
    pub fn try_push_input(
        &mut self,
        node: Node,
        row: Row,
        timestamp: Timestamp,
        diff: i64,
    ) -> Result<(), ShardError> {
        let (builder, frontier) = match &mut self.states[node.0] {
            NodeState::Input { builder, frontier } => (builder, frontier),
            _ => panic!("push_input: node {node:?} is not an Input"),
        };
        if frontier.has_finalized(&timestamp) {
            return Err(ShardError::InputBehindFrontier(NodeInput::new(node, 0)));
        }
        builder.push(Change::new(row, timestamp.clone(), diff));
        self.observer.push_input(&PushInputEvent { node, timestamp, diff });
        Ok(())
    }

    /// As [`Shard::try_push_input`], but panics on a behind-frontier push: the ergonomic
    /// entry point for callers that treat the precondition as a programmer error.
    pub fn push_input(&mut self, node: Node, row: Row, timestamp: Timestamp, diff: i64) {
        self.try_push_input(node, row, timestamp, diff)
            .expect("push_input: timestamp behind the input's current frontier")
    }

    /// Drains an Input node's unflushed builder into a batch and emits it downstream, if
    /// any changes were pending.
    pub fn flush_input(&mut self, node: Node) {
        let builder = match &mut self.states[node.0] {
            NodeState::Input { builder, .. } => std::mem::take(builder),
            _ => panic!("flush_input: node {node:?} is not an Input"),
        };
        if builder.is_empty() {
            self.observer.flush_input(&FlushInputEvent { node, emitted: false });
            return;
        }
        match builder.finish() {
            Ok(batch) => {
                self.emit_batch(node, batch);
                self.observer.flush_input(&FlushInputEvent { node, emitted: true });
            }
            Err(_) => {
                self.observer.flush_input(&FlushInputEvent { node, emitted: false });
            }
        }
    }

    /// Implicitly flushes, then advances an Input node's frontier to include `timestamp`.
    pub fn advance_input(&mut self, node: Node, timestamp: Timestamp) {
        self.flush_input(node);
        let frontier = match &mut self.states[node.0] {
            NodeState::Input { frontier, .. } => frontier,
            _ => panic!("advance_input: node {node:?} is not an Input"),
        };
        let mut changes = Vec::new();
        frontier.advance(timestamp.clone(), &mut changes);
        for (ts, diff) in changes {
            self.add_pointstamp_diff(NodeInput::new(node, 0), ts, diff);
        }
        self.observer.advance_input(&AdvanceInputEvent { node, timestamp });
    }

    /// True while there is queued work: either a change batch awaiting operator dispatch
    /// or an unprocessed pointstamp diff.
    pub fn has_work(&self) -> bool {
        !self.pending_batches.is_empty() || !self.pointstamps.is_empty()
    }

    /// One cooperative tick: processes one queued change batch if any exist, else runs
    /// one full pointstamp-propagation pass (followed by Index/Distinct/Reduce
    /// reactions), else does nothing.
    pub fn do_work(&mut self) {
        if let Some((node_input, batch)) = self.pending_batches.pop_front() {
            log::trace!("doWork: dispatching a queued batch to {node_input:?}");
            self.process_batch(node_input, batch);
            self.observer.do_work(&DoWorkEvent::ProcessedBatch);
        } else if !self.pointstamps.is_empty() {
            log::trace!("doWork: propagating pointstamp diffs");
            self.propagate();
            self.observer.do_work(&DoWorkEvent::Propagated);
        } else {
            self.observer.do_work(&DoWorkEvent::Idle);
        }
    }

    /// Pops one change batch off an Output node's queue, if any are unpopped.
    pub fn pop_output(&mut self, node: Node) -> Option<ChangeBatch> {
        let popped = match &mut self.states[node.0] {
            NodeState::Output { queue } => queue.pop_front(),
            _ => panic!("pop_output: node {node:?} is not an Output"),
        };
        self.observer.pop_output(&PopOutputEvent { node, popped: popped.is_some() });
        popped
    }

    fn add_pointstamp_diff(&mut self, node_input: NodeInput, timestamp: Timestamp, diff: i64) {
        if diff == 0 {
            return;
        }
        self.observer.queue_frontier_update(&QueueFrontierUpdateEvent {
            destination: node_input,
            timestamp: timestamp.clone(),
            diff,
        });
        self.pointstamps.add(node_input, timestamp, diff);
    }

    /// Queues `batch` on every downstream `NodeInput` of `source`, registering a `+1`
    /// pointstamp diff at each destination for every timestamp in the batch's lower
    /// bound.
    fn emit_batch(&mut self, source: Node, batch: ChangeBatch) {
        let batch = Arc::new(batch);
        self.observer
            .emit_change_batch(&EmitChangeBatchEvent { source, batch: (*batch).clone() });
        let downstream: Vec<NodeInput> = self.graph.downstream_of(source).to_vec();
        for node_input in downstream {
            for ts in batch.lower_bound().elements() {
                self.add_pointstamp_diff(node_input, ts.clone(), 1);
            }
            self.pending_batches.push_back((node_input, batch.clone()));
        }
    }

    /// Dequeues a batch's `-1` lower-bound contribution (it is no longer merely queued)
    /// and dispatches it to its destination node's operator.
    fn process_batch(&mut self, node_input: NodeInput, batch: Arc<ChangeBatch>) {
        for ts in batch.lower_bound().elements() {
            self.add_pointstamp_diff(node_input, ts.clone(), -1);
        }
        self.observer
            .process_change_batch(&ProcessChangeBatchEvent { destination: node_input, batch: (*batch).clone() });

        let node = node_input.node;
        let spec = self.graph.spec(node).clone();

        let other_index: Option<Index> = match &spec {
            NodeSpec::Join { inputs, .. } => {
                let other_node = inputs[1 - node_input.port];
                self.states[other_node.0].index().cloned()
            }
            _ => None,
        };

        let result = {
            let state = &mut self.states[node.0];
            operators::dispatch(node, node_input.port, &spec, other_index.as_ref(), state, &batch)
        };

        if let Some(out_batch) = result.emit {
            self.emit_batch(node, out_batch);
        }
        for (ts, diff) in result.capability_diffs {
            self.add_pointstamp_diff(NodeInput::new(node, 0), ts, diff);
        }
    }

    /// Pops pointstamp diffs in could-result-in order until none remain, then runs every
    /// Index/Distinct(/Reduce) node's frontier reaction exactly once.
    fn propagate(&mut self) {
        let mut updates_applied = 0usize;
        while let Some((pointstamp, diff)) = self.pointstamps.pop_min(&self.graph) {
            let node = pointstamp.node_input.node;
            self.observer.apply_frontier_update(&ApplyFrontierUpdateEvent {
                destination: pointstamp.node_input,
                timestamp: pointstamp.timestamp.clone(),
                diff,
            });
            let output_ts = match self.graph.spec(node) {
                NodeSpec::TimestampPush { .. } => pointstamp.timestamp.push_coord(),
                NodeSpec::TimestampIncrement { .. } => pointstamp.timestamp.increment_coord(),
                NodeSpec::TimestampPop { .. } => pointstamp.timestamp.pop_coord(),
                _ => pointstamp.timestamp.clone(),
            };
            let mut changes = Vec::new();
            self.node_output_frontier[node.0].update(output_ts, diff, &mut changes);
            if !changes.is_empty() {
                self.observer.process_frontier_update(&ProcessFrontierUpdateEvent {
                    node,
                    changes: changes.clone(),
                });
            }
            let downstream: Vec<NodeInput> = self.graph.downstream_of(node).to_vec();
            for (ts, sign) in changes {
                for node_input in &downstream {
                    self.add_pointstamp_diff(*node_input, ts.clone(), sign);
                }
            }
            updates_applied += 1;
        }
        self.observer
            .process_frontier_updates(&ProcessFrontierUpdatesEvent { updates_applied });

        let index_nodes: Vec<(Node, Node)> = self
            .graph
            .nodes()
            .filter_map(|n| match self.graph.spec(n) {
                NodeSpec::Index { input } => Some((n, *input)),
                _ => None,
            })
            .collect();
        for (node, input_node) in index_nodes {
            self.react_index(node, input_node);
        }

        let distinct_nodes: Vec<(Node, Node)> = self
            .graph
            .nodes()
            .filter_map(|n| match self.graph.spec(n) {
                NodeSpec::Distinct { input } => Some((n, *input)),
                _ => None,
            })
            .collect();
        for (node, input_node) in distinct_nodes {
            self.react_distinct(node, input_node);
        }

        #[cfg(feature = "reduce")]
        {
            let reduce_nodes: Vec<(Node, Node, usize)> = self
                .graph
                .nodes()
                .filter_map(|n| match self.graph.spec(n) {
                    NodeSpec::Reduce { input, key_columns, .. } => Some((n, *input, *key_columns)),
                    _ => None,
                })
                .collect();
            for (node, input_node, key_columns) in reduce_nodes {
                self.react_reduce(node, input_node, key_columns);
            }
        }
    }

    /// An Index node's reaction: releases every pending change whose timestamp the input
    /// frontier has strictly finalized, coalescing them into a batch appended to the
    /// node's own index and forwarded downstream.
    fn react_index(&mut self, node: Node, input_node: Node) {
        let input_frontier = self.node_output_frontier[input_node.0].frontier().clone();

        let (passed, remaining) = {
            let pending_changes = match &mut self.states[node.0] {
                NodeState::Index { pending_changes, .. } => std::mem::take(pending_changes),
                _ => unreachable!("Index reaction on non-Index node"),
            };
            let mut passed = Vec::new();
            let mut remaining = Vec::new();
            for change in pending_changes {
                if input_frontier.has_finalized(&change.timestamp) {
                    passed.push(change);
                } else {
                    remaining.push(change);
                }
            }
            (passed, remaining)
        };
        if let NodeState::Index { pending_changes, .. } = &mut self.states[node.0] {
            *pending_changes = remaining;
        }
        if passed.is_empty() {
            return;
        }

        let released = passed.len();
        let mut builder = ChangeBatchBuilder::new();
        for change in passed {
            self.add_pointstamp_diff(NodeInput::new(node, 0), change.timestamp.clone(), -1);
            builder.push(change);
        }
        if let Ok(batch) = builder.finish() {
            if let NodeState::Index { index, .. } = &mut self.states[node.0] {
                index.append(batch.clone());
            }
            self.emit_batch(node, batch);
        }
        self.observer
            .process_frontier_update_reaction(&ProcessFrontierUpdateReactionEvent { node, released });
    }

    /// A Distinct node's reaction: for every pending timestamp the input frontier has
    /// strictly finalized, diffs the upstream index's bag against this node's own output
    /// index and emits the at-most-one-copy-per-row result.
    fn react_distinct(&mut self, node: Node, input_node: Node) {
        let input_frontier = self.node_output_frontier[input_node.0].frontier().clone();

        let mut finalized: Vec<Timestamp> = match &self.states[node.0] {
            NodeState::Distinct { pending_timestamps, .. } => pending_timestamps
                .iter()
                .filter(|t| input_frontier.has_finalized(t))
                .cloned()
                .collect(),
            _ => unreachable!("Distinct reaction on non-Distinct node"),
        };
        if finalized.is_empty() {
            return;
        }
        finalized.sort_by(|a, b| a.lexical_order(b));

        let mut builder = ChangeBatchBuilder::new();
        for t in &finalized {
            let new_bag = self
                .states[input_node.0]
                .index()
                .expect("Distinct input must be indexable")
                .bag_as_of(t);
            let old_bag = match &self.states[node.0] {
                NodeState::Distinct { index, .. } => index.bag_as_of(t),
                _ => unreachable!(),
            };
            for (row, count) in new_bag.iter() {
                let target = if count > 0 { 1 } else { 0 };
                let old = old_bag.count(row);
                if target != old {
                    builder.push(Change::new(row.clone(), t.clone(), target - old));
                }
            }
            for (row, old_count) in old_bag.iter() {
                if new_bag.count(row) == 0 {
                    builder.push(Change::new(row.clone(), t.clone(), -old_count));
                }
            }
        }

        if let Ok(batch) = builder.finish() {
            if let NodeState::Distinct { index, .. } = &mut self.states[node.0] {
                index.append(batch.clone());
            }
            self.emit_batch(node, batch);
        }

        let finalized_set: HashSet<Timestamp> = finalized.iter().cloned().collect();
        if let NodeState::Distinct { pending_timestamps, seen, .. } = &mut self.states[node.0] {
            pending_timestamps.retain(|t| !finalized_set.contains(t));
            for t in &finalized {
                seen.remove(t);
            }
        }
        for t in &finalized {
            self.add_pointstamp_diff(NodeInput::new(node, 0), t.clone(), -1);
        }
        self.observer.process_frontier_update_reaction(&ProcessFrontierUpdateReactionEvent {
            node,
            released: finalized.len(),
        });
    }

    /// A Reduce node's reaction (feature `reduce`): the same capability/pending-timestamp
    /// shape as Distinct, but grouping by key prefix and replacing each group with the
    /// caller-supplied associative-commutative combiner's result instead of thresholding
    /// membership at one.
    #[cfg(feature = "reduce")]
    fn react_reduce(&mut self, node: Node, input_node: Node, key_columns: usize) {
        let combine = match self.graph.spec(node) {
            NodeSpec::Reduce { combine, .. } => combine.clone(),
            _ => unreachable!("Reduce reaction on non-Reduce node"),
        };
        let input_frontier = self.node_output_frontier[input_node.0].frontier().clone();

        let mut finalized: Vec<Timestamp> = match &self.states[node.0] {
            NodeState::Reduce { pending_timestamps, .. } => pending_timestamps
                .iter()
                .filter(|t| input_frontier.has_finalized(t))
                .cloned()
                .collect(),
            _ => unreachable!("Reduce reaction on non-Reduce node"),
        };
        if finalized.is_empty() {
            return;
        }
        finalized.sort_by(|a, b| a.lexical_order(b));

        let mut builder = ChangeBatchBuilder::new();
        for t in &finalized {
            let new_bag = self
                .states[input_node.0]
                .index()
                .expect("Reduce input must be indexable")
                .bag_as_of(t);
            let old_bag = match &self.states[node.0] {
                NodeState::Reduce { index, .. } => index.bag_as_of(t),
                _ => unreachable!(),
            };

            let mut groups: HashMap<Vec<crate::value::Value>, Vec<Row>> = HashMap::new();
            for (row, count) in new_bag.iter() {
                if count > 0 {
                    let key = row.key_prefix(key_columns).to_vec();
                    let entry = groups.entry(key).or_default();
                    for _ in 0..count {
                        entry.push(row.clone());
                    }
                }
            }

            let mut old_by_key: HashMap<Vec<crate::value::Value>, Row> = HashMap::new();
            for (row, count) in old_bag.iter() {
                if count > 0 {
                    old_by_key.insert(row.key_prefix(key_columns).to_vec(), row.clone());
                }
            }

            for (key, rows) in &groups {
                let combined = combine(rows);
                match old_by_key.get(key) {
                    Some(old_row) if old_row == &combined => {}
                    Some(old_row) => {
                        builder.push(Change::new(old_row.clone(), t.clone(), -1));
                        builder.push(Change::new(combined, t.clone(), 1));
                    }
                    None => {
                        builder.push(Change::new(combined, t.clone(), 1));
                    }
                }
            }
            for (key, old_row) in &old_by_key {
                if !groups.contains_key(key) {
                    builder.push(Change::new(old_row.clone(), t.clone(), -1));
                }
            }
        }

        if let Ok(batch) = builder.finish() {
            if let NodeState::Reduce { index, .. } = &mut self.states[node.0] {
                index.append(batch.clone());
            }
            self.emit_batch(node, batch);
        }

        let finalized_set: HashSet<Timestamp> = finalized.iter().cloned().collect();
        if let NodeState::Reduce { pending_timestamps, seen, .. } = &mut self.states[node.0] {
            pending_timestamps.retain(|t| !finalized_set.contains(t));
            for t in &finalized {
                seen.remove(t);
            }
        }
        for t in &finalized {
            self.add_pointstamp_diff(NodeInput::new(node, 0), t.clone(), -1);
        }
        self.observer.process_frontier_update_reaction(&ProcessFrontierUpdateReactionEvent {
            node,
            released: finalized.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::value::Value;

    fn row(n: i64) -> Row {
        Row::new([Value::Number(n as f64)])
    }

    fn drain(shard: &mut Shard) {
        while shard.has_work() {
            shard.do_work();
        }
    }

    #[test]
    fn map_pipeline_doubles_every_row() {
        let mut builder = GraphBuilder::new();
        let input = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Input);
        let doubled = builder.add_node(
            crate::graph::Subgraph::ROOT,
            NodeSpec::Map {
                input,
                f: Arc::new(|r: &Row| {
                    let Value::Number(n) = r.0[0] else { unreachable!() };
                    Row::new([Value::Number(n * 2.0)])
                }),
            },
        );
        let output = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Output { input: doubled });
        let graph = builder.finish().unwrap();

        let mut shard = Shard::new(graph);
        shard.push_input(input, row(1), Timestamp::least(1), 1);
        shard.push_input(input, row(2), Timestamp::least(1), 1);
        shard.advance_input(input, Timestamp::from_coords([1]));
        drain(&mut shard);

        let batch = shard.pop_output(output).expect("expected a batch");
        let mut rows: Vec<i64> = batch
            .changes()
            .iter()
            .map(|c| match c.row.0[0] {
                Value::Number(n) => n as i64,
                _ => unreachable!(),
            })
            .collect();
        rows.sort();
        assert_eq!(rows, vec![2, 4]);
        assert!(shard.pop_output(output).is_none());
    }

    #[test]
    fn distinct_collapses_duplicate_rows_s4() {
        let mut builder = GraphBuilder::new();
        let input = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Input);
        let index = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Index { input });
        let distinct = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Distinct { input: index });
        let output = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Output { input: distinct });
        let graph = builder.finish().unwrap();

        let mut shard = Shard::new(graph);
        shard.push_input(input, row(1), Timestamp::least(1), 1);
        shard.push_input(input, row(1), Timestamp::least(1), 1);
        shard.advance_input(input, Timestamp::from_coords([1]));
        drain(&mut shard);

        let batch = shard.pop_output(output).expect("expected a batch");
        assert_eq!(batch.changes().len(), 1);
        assert_eq!(batch.changes()[0].row, row(1));
        assert_eq!(batch.changes()[0].diff, 1);
        assert!(shard.pop_output(output).is_none());
    }

    #[test]
    fn push_behind_frontier_is_rejected() {
        let mut builder = GraphBuilder::new();
        let input = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Input);
        let _output = builder.add_node(crate::graph::Subgraph::ROOT, NodeSpec::Output { input });
        let graph = builder.finish().unwrap();

        let mut shard = Shard::new(graph);
        shard.advance_input(input, Timestamp::from_coords([5]));
        let result = shard.try_push_input(input, row(1), Timestamp::from_coords([1]), 1);
        assert!(matches!(result, Err(ShardError::InputBehindFrontier(_))));
    }
}
