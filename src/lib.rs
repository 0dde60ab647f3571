//! An incremental, timestamped dataflow engine core.
//!
//! Maintains the outputs of a declarative relational/recursive computation under streams
//! of input changes, emitting change batches as outputs evolve. Every value carries a
//! signed multiset count, and outputs are valid at every logical timestamp — including
//! inside nested iterative scopes closed by a feedback edge.
//!
//! The moving parts, leaves first:
//! - [`value`]: `Value`/`Row`, the data that actually flows.
//! - [`timestamp`]: vector timestamps and the causal order over them.
//! - [`frontier`]: `Frontier` (an antichain) and `SupportedFrontier` (its ref-counted,
//!   mutable cousin).
//! - [`change`]: `Change`/`ChangeBatch`/`ChangeBatchBuilder`.
//! - [`index`]: `Index`/`Bag`, an append-only batch log and its materialization at a
//!   timestamp.
//! - [`graph`]: the frozen dataflow graph and its builder/validator.
//! - [`shard`]: the executor tying all of the above into a running dataflow.
//! - [`observer`]: the optional structured debug-event stream.
//! - [`error`]: the crate's `Result`-returning error types.

pub mod change;
pub mod error;
pub mod frontier;
pub mod graph;
pub mod index;
pub mod observer;
pub mod shard;
pub mod timestamp;
pub mod value;

pub use change::{Change, ChangeBatch, ChangeBatchBuilder};
pub use error::{GraphError, ShardError};
pub use frontier::{Frontier, SupportedFrontier};
pub use graph::{Graph, GraphBuilder, Node, NodeInput, NodeSpec, Subgraph};
pub use index::{Bag, Index};
pub use observer::{DebugEvent, NoopObserver, RecordingObserver, ShardObserver};
pub use shard::{Shard, ShardConfig};
pub use timestamp::{CausalOrder, Timestamp};
pub use value::{Row, Value};
