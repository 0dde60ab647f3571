//! Distinct-specific integration coverage: collapsing duplicates into a single
//! membership copy, and the threshold-at-one behavior for rows whose net count starts or
//! passes through a negative value.

use differential_core::graph::{GraphBuilder, Node, Subgraph};
use differential_core::{NodeSpec, Shard, Timestamp};
use differential_core::value::{Row, Value};

fn row(n: i64) -> Row {
    Row::new([Value::Number(n as f64)])
}

fn build_index_distinct() -> (Node, Node, Node, Shard) {
    let mut b = GraphBuilder::new();
    let input = b.add_node(Subgraph::ROOT, NodeSpec::Input);
    let index = b.add_node(Subgraph::ROOT, NodeSpec::Index { input });
    let distinct = b.add_node(Subgraph::ROOT, NodeSpec::Distinct { input: index });
    let output = b.add_node(Subgraph::ROOT, NodeSpec::Output { input: distinct });
    let graph = b.finish().unwrap();
    let shard = Shard::new(graph);
    (input, distinct, output, shard)
}

fn drain(shard: &mut Shard) {
    while shard.has_work() {
        shard.do_work();
    }
}

#[test]
fn duplicate_inserts_collapse_to_one_copy_s4() {
    let (input, _distinct, output, mut shard) = build_index_distinct();

    shard.push_input(input, row(7), Timestamp::least(1), 1);
    shard.push_input(input, row(7), Timestamp::least(1), 1);
    shard.push_input(input, row(7), Timestamp::least(1), 1);
    shard.advance_input(input, Timestamp::from_coords([1]));
    drain(&mut shard);

    let batch = shard.pop_output(output).expect("distinct should emit a membership change");
    assert_eq!(batch.changes().len(), 1);
    assert_eq!(batch.changes()[0].row, row(7));
    assert_eq!(batch.changes()[0].diff, 1);
    assert!(shard.pop_output(output).is_none());
}

/// A row with a net-negative count is absent, same as a row with zero count: Distinct
/// must not emit membership for it, and must only emit `+1` once the net count actually
/// crosses up through one.
#[test]
fn negative_counts_threshold_at_one() {
    let (input, _distinct, output, mut shard) = build_index_distinct();

    // net count at t=0 is -1: below the membership threshold, nothing should emit.
    shard.push_input(input, row(9), Timestamp::from_coords([0]), -1);
    shard.advance_input(input, Timestamp::from_coords([1]));
    drain(&mut shard);
    assert!(shard.pop_output(output).is_none(), "a negative net count must not read as present");

    // two more inserts at t=1 bring the net count at t>=1 to +1: membership should appear.
    shard.push_input(input, row(9), Timestamp::from_coords([1]), 1);
    shard.push_input(input, row(9), Timestamp::from_coords([1]), 1);
    shard.advance_input(input, Timestamp::from_coords([2]));
    drain(&mut shard);

    let batch = shard.pop_output(output).expect("membership should appear once the count crosses one");
    assert_eq!(batch.changes().len(), 1);
    assert_eq!(batch.changes()[0].row, row(9));
    assert_eq!(batch.changes()[0].diff, 1);
    assert!(shard.pop_output(output).is_none());
}

#[test]
fn retraction_of_the_only_copy_removes_membership() {
    let (input, _distinct, output, mut shard) = build_index_distinct();

    shard.push_input(input, row(3), Timestamp::from_coords([0]), 1);
    shard.advance_input(input, Timestamp::from_coords([1]));
    drain(&mut shard);
    let first = shard.pop_output(output).expect("row should appear at t=0");
    assert_eq!(first.changes()[0].diff, 1);

    shard.push_input(input, row(3), Timestamp::from_coords([1]), -1);
    shard.advance_input(input, Timestamp::from_coords([2]));
    drain(&mut shard);
    let second = shard.pop_output(output).expect("retraction should surface once t=1 finalizes");
    assert_eq!(second.changes().len(), 1);
    assert_eq!(second.changes()[0].row, row(3));
    assert_eq!(second.changes()[0].diff, -1);
}
