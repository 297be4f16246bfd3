//! Pipeline execution

pub mod aggregator;
pub mod engine;
pub mod orchestrator;

pub use aggregator::{AggregationFailure, StatusAggregator};
pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use orchestrator::{CompletedRun, Orchestrator, PreparedRun};
