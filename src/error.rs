//! The crate's two `Result`-returning error taxonomies: graph-construction errors
//! (surfaced at `GraphBuilder::finish`) and the one recoverable Shard policy error
//! (`ShardError`, for callers at a host-language boundary who would rather get a
//! `Result` than crash the process — see §7 of the design spec).
//!
//! Every other failure mode in this crate (popping an empty timestamp, building an
//! empty change batch, feeding an Input node a batch on its input port, ...) is a
//! programmer error and panics, matching how `differential-dataflow` treats violations
//! of its own dataflow-shape invariants.

use thiserror::Error;

use crate::graph::{Node, NodeInput};

/// A graph failed [`crate::graph::GraphBuilder::finish`]'s validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A `NodeInput` referenced a node id that doesn't exist.
    #[error("node {0:?} has an input referencing nonexistent node {1:?}")]
    DanglingInput(Node, Node),

    /// An input referenced a node that doesn't come earlier in the graph, and the
    /// referencing node isn't a `TimestampIncrement` (the one operator allowed to close
    /// a loop by referencing a later node).
    #[error("node {0:?} references node {1:?}, which is not an earlier node, and {0:?} is not a TimestampIncrement")]
    InputNotEarlier(Node, Node),

    /// A `Join` or `Distinct` node's input is not one of the indexable operator kinds
    /// (`Index` or `Distinct`).
    #[error("node {0:?} (Join/Distinct) has a non-indexable input {1:?}")]
    InputNotIndexable(Node, Node),

    /// A `TimestampPush`'s output subgraph is not a child of its input's subgraph.
    #[error("TimestampPush node {0:?}: output subgraph is not the input's child subgraph")]
    PushScopeMismatch(Node),

    /// A `TimestampPop`'s input subgraph is not a child of its output's subgraph.
    #[error("TimestampPop node {0:?}: input subgraph is not the output's child subgraph")]
    PopScopeMismatch(Node),

    /// Any other operator's input and output must share a subgraph.
    #[error("node {0:?}: input and output must share a subgraph")]
    ScopeMismatch(Node),

    /// A subgraph other than the root (id 0) has no parent, or its parent id is not
    /// strictly smaller than its own.
    #[error("subgraph {0} has an invalid parent")]
    InvalidSubgraphParent(usize),
}

/// A recoverable policy violation raised by the Shard's checked entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShardError {
    /// [`crate::shard::Shard::try_push_input`] was called with a timestamp strictly
    /// less than the Input node's current frontier.
    #[error("pushed input at a timestamp the input frontier has already passed: {0:?}")]
    InputBehindFrontier(NodeInput),
}
