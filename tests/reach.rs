//! End-to-end transitive-closure scenario: Input(edges) -> TimestampPush -> (Union of
//! TimestampPush output and a swap/join/distinct feedback loop) -> Distinct ->
//! TimestampPop -> Output.
//!
//! Vertices are encoded as small integers (a=1, b=2, c=3, d=4) so rows stay two-column
//! `Value::Number` pairs throughout.

use std::sync::Arc;

use differential_core::graph::{Graph, Node};
use differential_core::{GraphBuilder, NodeSpec, Shard, Subgraph, Timestamp};
use differential_core::value::{Row, Value};

fn v(n: i64) -> Value {
    Value::Number(n as f64)
}

fn edge(from: i64, to: i64) -> Row {
    Row::new([v(from), v(to)])
}

/// Builds the reachability dataflow. Returns the frozen graph, the edges Input node, and
/// the Output node.
fn build_reach() -> (Graph, Node, Node) {
    let mut b = GraphBuilder::new();
    let loop_scope = b.add_subgraph(Subgraph::ROOT);

    let edges_input = b.add_node(Subgraph::ROOT, NodeSpec::Input);
    let edges_push = b.add_node(loop_scope, NodeSpec::TimestampPush { input: edges_input });
    let increment = b.add_node(loop_scope, NodeSpec::TimestampIncrement { input: None });
    let union = b.add_node(loop_scope, NodeSpec::Union { inputs: [edges_push, increment] });
    let union_index = b.add_node(loop_scope, NodeSpec::Index { input: union });
    let distinct = b.add_node(loop_scope, NodeSpec::Distinct { input: union_index });

    // reach(a, b) -> (b, a), so the join key (first column) lines up with edges(b, c).
    let swapped = b.add_node(
        loop_scope,
        NodeSpec::Map {
            input: distinct,
            f: Arc::new(|r: &Row| Row::new([r.0[1].clone(), r.0[0].clone()])),
        },
    );
    let swapped_index = b.add_node(loop_scope, NodeSpec::Index { input: swapped });
    let edges_index = b.add_node(loop_scope, NodeSpec::Index { input: edges_push });
    let joined = b.add_node(
        loop_scope,
        NodeSpec::Join { inputs: [swapped_index, edges_index], key_columns: 1 },
    );
    // joined row is (b, a, b, c); keep (a, c).
    let extracted = b.add_node(
        loop_scope,
        NodeSpec::Map {
            input: joined,
            f: Arc::new(|r: &Row| Row::new([r.0[1].clone(), r.0[3].clone()])),
        },
    );
    b.connect_loop(increment, extracted);

    let final_pop = b.add_node(Subgraph::ROOT, NodeSpec::TimestampPop { input: distinct });
    let output = b.add_node(Subgraph::ROOT, NodeSpec::Output { input: final_pop });

    (b.finish().expect("reach graph should validate"), edges_input, output)
}

fn drain(shard: &mut Shard) {
    while shard.has_work() {
        shard.do_work();
    }
}

fn collect_rows(shard: &mut Shard, output: Node) -> Vec<(i64, i64, Timestamp, i64)> {
    let mut rows = Vec::new();
    while let Some(batch) = shard.pop_output(output) {
        for change in batch.changes() {
            let Value::Number(a) = change.row.0[0] else { unreachable!() };
            let Value::Number(c) = change.row.0[1] else { unreachable!() };
            rows.push((a as i64, c as i64, change.timestamp.clone(), change.diff));
        }
    }
    rows
}

#[test]
fn s1_transitive_closure_and_retraction() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (graph, edges_input, output) = build_reach();
    let mut shard = Shard::new(graph);

    shard.push_input(edges_input, edge(1, 2), Timestamp::from_coords([0]), 1); // a -> b
    shard.push_input(edges_input, edge(2, 3), Timestamp::from_coords([0]), 1); // b -> c
    shard.push_input(edges_input, edge(2, 4), Timestamp::from_coords([0]), 1); // b -> d
    shard.push_input(edges_input, edge(3, 1), Timestamp::from_coords([0]), 1); // c -> a
    shard.push_input(edges_input, edge(2, 3), Timestamp::from_coords([1]), -1); // retract b -> c

    shard.advance_input(edges_input, Timestamp::from_coords([1]));
    drain(&mut shard);

    let first = collect_rows(&mut shard, output);
    assert!(first.iter().all(|(_, _, t, _)| t == &Timestamp::from_coords([0])));
    let mut closure: Vec<(i64, i64)> =
        first.iter().filter(|(_, _, _, diff)| *diff == 1).map(|(a, c, _, _)| (*a, *c)).collect();
    closure.sort();

    let mut expected = vec![
        (1, 2), (1, 3), (1, 4), (1, 1),
        (2, 3), (2, 4), (2, 1),
        (3, 1), (3, 2), (3, 3), (3, 4),
    ];
    expected.sort();
    assert_eq!(closure, expected, "t=0 reach closure of the inserted edges");

    shard.advance_input(edges_input, Timestamp::from_coords([2]));
    drain(&mut shard);

    let second = collect_rows(&mut shard, output);
    assert!(!second.is_empty(), "removing b->c must retract some pairs");
    assert!(second.iter().all(|(_, _, _, diff)| *diff == -1), "only retractions are expected");
    let mut retractions: Vec<(i64, i64)> = second.iter().map(|(a, c, _, _)| (*a, *c)).collect();
    retractions.sort();

    // pairs reachable only via the retracted b->c edge.
    let mut expected_retractions = vec![(1, 3), (1, 1), (2, 3), (2, 1), (3, 3)];
    expected_retractions.sort();
    assert_eq!(retractions, expected_retractions);
}

#[test]
fn s5_reach_drains_in_finitely_many_steps() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (graph, edges_input, _output) = build_reach();
    let mut shard = Shard::new(graph);
    shard.push_input(edges_input, edge(1, 2), Timestamp::from_coords([0]), 1);
    shard.push_input(edges_input, edge(2, 3), Timestamp::from_coords([0]), 1);
    shard.push_input(edges_input, edge(2, 4), Timestamp::from_coords([0]), 1);
    shard.push_input(edges_input, edge(3, 1), Timestamp::from_coords([0]), 1);
    shard.advance_input(edges_input, Timestamp::from_coords([1]));

    let mut steps = 0;
    while shard.has_work() {
        shard.do_work();
        steps += 1;
        assert!(steps < 10_000, "reach dataflow failed to drain in a bounded number of steps");
    }
}
