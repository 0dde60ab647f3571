//! `GraphBuilder`: mutable graph construction, frozen by [`GraphBuilder::finish`].

use crate::error::GraphError;
use crate::graph::{Graph, Node, NodeInput, NodeSpec, ScopePath, Subgraph};

/// Accumulates subgraphs and nodes, then validates and freezes them into a [`Graph`].
#[derive(Default)]
pub struct GraphBuilder {
    specs: Vec<NodeSpec>,
    subgraph_of: Vec<Subgraph>,
    subgraph_parents: Vec<Option<Subgraph>>,
}

impl GraphBuilder {
    /// A builder with just the root subgraph (id 0, no parent) declared.
    pub fn new() -> Self {
        GraphBuilder {
            specs: Vec::new(),
            subgraph_of: Vec::new(),
            subgraph_parents: vec![None],
        }
    }

    /// Declares a new subgraph nested inside `parent`, returning its id.
    pub fn add_subgraph(&mut self, parent: Subgraph) -> Subgraph {
        let id = Subgraph(self.subgraph_parents.len());
        self.subgraph_parents.push(Some(parent));
        id
    }

    /// Adds a node with the given spec, living in `subgraph`, returning its id.
    pub fn add_node(&mut self, subgraph: Subgraph, spec: NodeSpec) -> Node {
        let id = Node(self.specs.len());
        self.specs.push(spec);
        self.subgraph_of.push(subgraph);
        id
    }

    /// Late-binds a `TimestampIncrement` node's input, typically to a node added after
    /// it — this is how feedback loops are connected.
    ///
    /// # Panics
    /// Panics if `node` is not a `TimestampIncrement`.
    pub fn connect_loop(&mut self, node: Node, input: Node) {
        match &mut self.specs[node.0] {
            NodeSpec::TimestampIncrement { input: slot } => *slot = Some(input),
            other => panic!("connect_loop called on non-TimestampIncrement node: {other:?}"),
        }
    }

    /// Validates the graph and freezes it.
    ///
    /// Each rule is checked here in order and the first failure is returned.
    pub fn finish(self) -> Result<Graph, GraphError> {
        let n = self.specs.len();

        for (id, parent) in self.subgraph_parents.iter().enumerate() {
            match (id, parent) {
                (0, None) => {}
                (0, Some(_)) => return Err(GraphError::InvalidSubgraphParent(0)),
                (_, None) => return Err(GraphError::InvalidSubgraphParent(id)),
                (_, Some(p)) if p.0 >= id => return Err(GraphError::InvalidSubgraphParent(id)),
                _ => {}
            }
        }

        // 1. scope paths, root first.
        let mut scope_paths: Vec<ScopePath> = Vec::with_capacity(n);
        for node in 0..n {
            let mut path = vec![self.subgraph_of[node]];
            let mut current = self.subgraph_of[node];
            while let Some(parent) = self.subgraph_parents[current.0] {
                path.push(parent);
                current = parent;
            }
            path.reverse();
            scope_paths.push(path);
        }

        // 2. downstream-edge index.
        let mut downstream: Vec<Vec<NodeInput>> = vec![Vec::new(); n];
        for (idx, spec) in self.specs.iter().enumerate() {
            let this = Node(idx);
            for (port, input) in spec.inputs().into_iter().enumerate() {
                if input.0 >= n {
                    return Err(GraphError::DanglingInput(this, input));
                }
                downstream[input.0].push(NodeInput::new(this, port));
            }
        }

        // 3. validation.
        for (idx, spec) in self.specs.iter().enumerate() {
            let this = Node(idx);
            for input in spec.inputs() {
                if input.0 >= n {
                    return Err(GraphError::DanglingInput(this, input));
                }
                let is_loop_edge = matches!(spec, NodeSpec::TimestampIncrement { .. });
                if !is_loop_edge && input.0 >= idx {
                    return Err(GraphError::InputNotEarlier(this, input));
                }
            }

            match spec {
                NodeSpec::Join { inputs, .. } => {
                    for input in inputs {
                        if !self.specs[input.0].is_indexable() {
                            return Err(GraphError::InputNotIndexable(this, *input));
                        }
                    }
                }
                NodeSpec::Distinct { input } => {
                    if !self.specs[input.0].is_indexable() {
                        return Err(GraphError::InputNotIndexable(this, *input));
                    }
                }
                #[cfg(feature = "reduce")]
                NodeSpec::Reduce { input, .. } => {
                    if !self.specs[input.0].is_indexable() {
                        return Err(GraphError::InputNotIndexable(this, *input));
                    }
                }
                _ => {}
            }

            match spec {
                NodeSpec::TimestampPush { input } => {
                    let input_scope = self.subgraph_of[input.0];
                    let output_parent = self.subgraph_parents[self.subgraph_of[idx].0];
                    if output_parent != Some(input_scope) {
                        return Err(GraphError::PushScopeMismatch(this));
                    }
                }
                NodeSpec::TimestampPop { input } => {
                    let input_scope = self.subgraph_of[input.0];
                    let input_parent = self.subgraph_parents[input_scope.0];
                    if input_parent != Some(self.subgraph_of[idx]) {
                        return Err(GraphError::PopScopeMismatch(this));
                    }
                }
                NodeSpec::Input => {}
                other => {
                    for input in other.inputs() {
                        if self.subgraph_of[input.0] != self.subgraph_of[idx] {
                            return Err(GraphError::ScopeMismatch(this));
                        }
                    }
                }
            }
        }

        Ok(Graph {
            specs: self.specs,
            subgraphs: (0..self.subgraph_parents.len()).map(Subgraph).collect(),
            subgraph_of: self.subgraph_of,
            scope_paths,
            downstream,
        })
    }
}
