//! `DebugEvent` and `ShardObserver`: the structured event stream external collaborators
//! (a debug inspector, a host-language binding) can attach to a running [`crate::shard::Shard`].
//!
//! Modeled directly on `differential-dataflow`'s `logging.rs`: a tagged event enum with
//! one struct per variant, and a trait with one method per variant so a sink only
//! implements the events it cares about. The engine never mutates state through the
//! observer — every call site passes an already-computed value.

use crate::change::ChangeBatch;
use crate::frontier::FrontierChange;
use crate::graph::{Node, NodeInput};
use crate::timestamp::Timestamp;

/// One update pushed onto an Input node's unflushed builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushInputEvent {
    pub node: Node,
    pub timestamp: Timestamp,
    pub diff: i64,
}

/// An Input node's unflushed builder was drained into a batch (or found empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushInputEvent {
    pub node: Node,
    pub emitted: bool,
}

/// An Input node's frontier advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceInputEvent {
    pub node: Node,
    pub timestamp: Timestamp,
}

/// A change batch was produced and queued on every downstream `NodeInput`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitChangeBatchEvent {
    pub source: Node,
    pub batch: ChangeBatch,
}

/// A queued change batch was dequeued and dispatched to its operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessChangeBatchEvent {
    pub destination: NodeInput,
    pub batch: ChangeBatch,
}

/// A pointstamp diff was queued for later propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFrontierUpdateEvent {
    pub destination: NodeInput,
    pub timestamp: Timestamp,
    pub diff: i64,
}

/// A single pointstamp diff was popped and applied to a node's supported frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFrontierUpdateEvent {
    pub destination: NodeInput,
    pub timestamp: Timestamp,
    pub diff: i64,
}

/// A full propagation pass (pop-until-empty) ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFrontierUpdatesEvent {
    pub updates_applied: usize,
}

/// One node's output frontier changed as a result of propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFrontierUpdateEvent {
    pub node: Node,
    pub changes: Vec<FrontierChange>,
}

/// An Index or Distinct node reacted to its input frontier having advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFrontierUpdateReactionEvent {
    pub node: Node,
    pub released: usize,
}

/// A change batch was popped off an Output node's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopOutputEvent {
    pub node: Node,
    pub popped: bool,
}

/// One `doWork` tick ran, either processing a batch or a propagation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoWorkEvent {
    ProcessedBatch,
    Propagated,
    Idle,
}

/// A single tagged instance of every kind of event the Shard can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugEvent {
    PushInput(PushInputEvent),
    FlushInput(FlushInputEvent),
    AdvanceInput(AdvanceInputEvent),
    EmitChangeBatch(EmitChangeBatchEvent),
    ProcessChangeBatch(ProcessChangeBatchEvent),
    QueueFrontierUpdate(QueueFrontierUpdateEvent),
    ApplyFrontierUpdate(ApplyFrontierUpdateEvent),
    ProcessFrontierUpdates(ProcessFrontierUpdatesEvent),
    ProcessFrontierUpdate(ProcessFrontierUpdateEvent),
    ProcessFrontierUpdateReaction(ProcessFrontierUpdateReactionEvent),
    PopOutput(PopOutputEvent),
    DoWork(DoWorkEvent),
}

/// A sink for [`DebugEvent`]s. Every method has a no-op default so implementers only
/// override what they need.
pub trait ShardObserver: Send + Sync {
    fn push_input(&self, _event: &PushInputEvent) {}
    fn flush_input(&self, _event: &FlushInputEvent) {}
    fn advance_input(&self, _event: &AdvanceInputEvent) {}
    fn emit_change_batch(&self, _event: &EmitChangeBatchEvent) {}
    fn process_change_batch(&self, _event: &ProcessChangeBatchEvent) {}
    fn queue_frontier_update(&self, _event: &QueueFrontierUpdateEvent) {}
    fn apply_frontier_update(&self, _event: &ApplyFrontierUpdateEvent) {}
    fn process_frontier_updates(&self, _event: &ProcessFrontierUpdatesEvent) {}
    fn process_frontier_update(&self, _event: &ProcessFrontierUpdateEvent) {}
    fn process_frontier_update_reaction(&self, _event: &ProcessFrontierUpdateReactionEvent) {}
    fn pop_output(&self, _event: &PopOutputEvent) {}
    fn do_work(&self, _event: &DoWorkEvent) {}
}

/// The default observer: every method is a no-op.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ShardObserver for NoopObserver {}

/// A recording observer for tests: appends every event, as its owning [`DebugEvent`], to
/// an internal `Vec` behind a `Mutex` (the trait requires `Send + Sync`, and tests call
/// it from a single thread but through a shared `Arc`).
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<DebugEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        RecordingObserver { events: std::sync::Mutex::new(Vec::new()) }
    }

    /// A snapshot of every event recorded so far, in order.
    pub fn events(&self) -> Vec<DebugEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: DebugEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ShardObserver for RecordingObserver {
    fn push_input(&self, event: &PushInputEvent) {
        self.record(DebugEvent::PushInput(event.clone()));
    }
    fn flush_input(&self, event: &FlushInputEvent) {
        self.record(DebugEvent::FlushInput(event.clone()));
    }
    fn advance_input(&self, event: &AdvanceInputEvent) {
        self.record(DebugEvent::AdvanceInput(event.clone()));
    }
    fn emit_change_batch(&self, event: &EmitChangeBatchEvent) {
        self.record(DebugEvent::EmitChangeBatch(event.clone()));
    }
    fn process_change_batch(&self, event: &ProcessChangeBatchEvent) {
        self.record(DebugEvent::ProcessChangeBatch(event.clone()));
    }
    fn queue_frontier_update(&self, event: &QueueFrontierUpdateEvent) {
        self.record(DebugEvent::QueueFrontierUpdate(event.clone()));
    }
    fn apply_frontier_update(&self, event: &ApplyFrontierUpdateEvent) {
        self.record(DebugEvent::ApplyFrontierUpdate(event.clone()));
    }
    fn process_frontier_updates(&self, event: &ProcessFrontierUpdatesEvent) {
        self.record(DebugEvent::ProcessFrontierUpdates(event.clone()));
    }
    fn process_frontier_update(&self, event: &ProcessFrontierUpdateEvent) {
        self.record(DebugEvent::ProcessFrontierUpdate(event.clone()));
    }
    fn process_frontier_update_reaction(&self, event: &ProcessFrontierUpdateReactionEvent) {
        self.record(DebugEvent::ProcessFrontierUpdateReaction(event.clone()));
    }
    fn pop_output(&self, event: &PopOutputEvent) {
        self.record(DebugEvent::PopOutput(event.clone()));
    }
    fn do_work(&self, event: &DoWorkEvent) {
        self.record(DebugEvent::DoWork(event.clone()));
    }
}
