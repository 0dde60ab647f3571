//! The frozen dataflow graph: `Node`, `NodeInput`, `NodeSpec`, `Subgraph`.
//!
//! The graph is an arena of nodes addressed by integer id — no pointer cycles, even
//! though the topology itself is cyclic (feedback edges, late-bound by
//! `TimestampIncrement`). Modeled on the subgraph/edge-validation shape of timely's
//! progress-tracking subgraph builder.

mod builder;

pub use builder::GraphBuilder;

/// Opaque identity of a node within a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(pub usize);

/// A node together with an input-port index (0 or 1 — every operator here is at most
/// binary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeInput {
    /// The node the input belongs to.
    pub node: Node,
    /// Which input port (0 or 1).
    pub port: usize,
}

impl NodeInput {
    /// Builds a `NodeInput`.
    pub fn new(node: Node, port: usize) -> Self {
        NodeInput { node, port }
    }
}

/// Identity of a nesting scope. Subgraph 0 is the root; every other subgraph has a
/// parent with a strictly smaller id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subgraph(pub usize);

impl Subgraph {
    /// The root scope.
    pub const ROOT: Subgraph = Subgraph(0);
}

/// A user-supplied row-to-row function, carried as a boxed closure. The engine never
/// reflects on it — it only ever calls it on a `Row` and uses the `Row` it returns.
pub type RowFn = std::sync::Arc<dyn Fn(&crate::value::Row) -> crate::value::Row + Send + Sync>;

/// The shape of a node: what it computes, and which other nodes feed it.
///
/// `Join` and `Distinct` require their input to be one of the *indexable* variants
/// (`Index` or `Distinct`) — enforced by [`GraphBuilder::finish`], not by the type
/// system, since the graph is built dynamically.
#[derive(Clone)]
pub enum NodeSpec {
    /// An external input: never has its own input edge.
    Input,
    /// Applies `f` to every change's row, keeping timestamp and diff.
    Map { input: Node, f: RowFn },
    /// Materializes its input as an [`crate::index::Index`], holding a capability at
    /// each pending timestamp until the input frontier passes it.
    Index { input: Node },
    /// Equi-joins two indexable inputs on their first `key_columns` values.
    Join { inputs: [Node; 2], key_columns: usize },
    /// A sink: batches accumulate in a queue for `pop_output`.
    Output { input: Node },
    /// Enters a nested scope: appends a zero coordinate to every change's timestamp.
    TimestampPush { input: Node },
    /// Closes a feedback loop: increments the last coordinate. `input` is late-bound
    /// (it is allowed, uniquely among operators, to reference a node that appears later
    /// in the node list).
    TimestampIncrement { input: Option<Node> },
    /// Leaves a nested scope: drops the last coordinate.
    TimestampPop { input: Node },
    /// Forwards both inputs' batches unchanged.
    Union { inputs: [Node; 2] },
    /// Materializes its input as a set (multiplicity capped at 1).
    Distinct { input: Node },
    /// Associative-commutative reduction over equal-key groups. Gated behind the
    /// `reduce` feature — not part of the default build.
    #[cfg(feature = "reduce")]
    Reduce {
        input: Node,
        key_columns: usize,
        combine: std::sync::Arc<dyn Fn(&[crate::value::Row]) -> crate::value::Row + Send + Sync>,
    },
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSpec::Input => write!(f, "Input"),
            NodeSpec::Map { input, .. } => write!(f, "Map({input:?})"),
            NodeSpec::Index { input } => write!(f, "Index({input:?})"),
            NodeSpec::Join { inputs, key_columns } => {
                write!(f, "Join({inputs:?}, key_columns={key_columns})")
            }
            NodeSpec::Output { input } => write!(f, "Output({input:?})"),
            NodeSpec::TimestampPush { input } => write!(f, "TimestampPush({input:?})"),
            NodeSpec::TimestampIncrement { input } => write!(f, "TimestampIncrement({input:?})"),
            NodeSpec::TimestampPop { input } => write!(f, "TimestampPop({input:?})"),
            NodeSpec::Union { inputs } => write!(f, "Union({inputs:?})"),
            NodeSpec::Distinct { input } => write!(f, "Distinct({input:?})"),
            #[cfg(feature = "reduce")]
            NodeSpec::Reduce { input, key_columns, .. } => {
                write!(f, "Reduce({input:?}, key_columns={key_columns})")
            }
        }
    }
}

impl NodeSpec {
    /// True for the operator variants `Join`/`Distinct` may take as input.
    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            NodeSpec::Index { .. } | NodeSpec::Distinct { .. }
        ) || Self::is_indexable_reduce(self)
    }

    #[cfg(feature = "reduce")]
    fn is_indexable_reduce(spec: &NodeSpec) -> bool {
        matches!(spec, NodeSpec::Reduce { .. })
    }
    #[cfg(not(feature = "reduce"))]
    fn is_indexable_reduce(_spec: &NodeSpec) -> bool {
        false
    }

    /// The node's declared input edges, in port order. `TimestampIncrement` may have
    /// none bound yet (`None`), which is only legal before [`GraphBuilder::finish`].
    pub fn inputs(&self) -> Vec<Node> {
        match self {
            NodeSpec::Input => vec![],
            NodeSpec::Map { input, .. }
            | NodeSpec::Index { input }
            | NodeSpec::Output { input }
            | NodeSpec::TimestampPush { input }
            | NodeSpec::TimestampPop { input }
            | NodeSpec::Distinct { input } => vec![*input],
            NodeSpec::Join { inputs, .. } | NodeSpec::Union { inputs } => inputs.to_vec(),
            NodeSpec::TimestampIncrement { input } => input.iter().copied().collect(),
            #[cfg(feature = "reduce")]
            NodeSpec::Reduce { input, .. } => vec![*input],
        }
    }
}

/// A node's chain of enclosing subgraphs, root first, its own subgraph last.
pub type ScopePath = Vec<Subgraph>;

/// The frozen, validated dataflow graph. Built via [`GraphBuilder::finish`].
pub struct Graph {
    specs: Vec<NodeSpec>,
    subgraphs: Vec<Subgraph>,
    subgraph_of: Vec<Subgraph>,
    scope_paths: Vec<ScopePath>,
    downstream: Vec<Vec<NodeInput>>,
}

impl Graph {
    /// The number of nodes.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The spec for `node`.
    pub fn spec(&self, node: Node) -> &NodeSpec {
        &self.specs[node.0]
    }

    /// The subgraph `node` lives in.
    pub fn subgraph_of(&self, node: Node) -> Subgraph {
        self.subgraph_of[node.0]
    }

    /// `node`'s scope path: the chain of subgraphs from root to its own subgraph.
    pub fn scope_path(&self, node: Node) -> &[Subgraph] {
        &self.scope_paths[node.0]
    }

    /// The declared subgraphs, in id order (subgraph `i` is at index `i`).
    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.subgraphs
    }

    /// Every `NodeInput` downstream of `node` (i.e. that has `node` as one of its
    /// inputs).
    pub fn downstream_of(&self, node: Node) -> &[NodeInput] {
        &self.downstream[node.0]
    }

    /// Iterates all node ids in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = Node> {
        (0..self.specs.len()).map(Node)
    }
}
