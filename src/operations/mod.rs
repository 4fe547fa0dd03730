//! Batch node operations.
//!
//! A batch operation runs one named action (start, stop, upgrade, ...)
//! against a set of nodes of a single group through an external
//! [`ExecutionEngine`]. Each group has at most one live operation.
//!
//! ```text
//!  submit ──► validate ──► OperationRegistry::claim ──┬──► TaskId (returned at once)
//!                                                     │
//!                                                     ▼
//!                                          background worker
//!                                   submit_execution ─► poll_execution ...
//!                                                     │
//!                                   Pending ─► Running ─► Done | Failed
//! ```
//!
//! Progress is observed by polling the group; engine failures are written to
//! the task log and never reach the submitter.

mod engine;
mod orchestrator;
mod registry;
mod task;

pub use engine::{
    render_inventory, ExecutionEngine, ExecutionHandle, ExecutionProgress, ExecutionRequest,
};
pub use orchestrator::{BatchOperationOrchestrator, BatchSubmission, WORKER_PANICKED};
pub use registry::OperationRegistry;
pub use task::{
    BatchTask, TargetNode, TaskId, TaskSnapshot, TaskStatus, DONE_MARKER, FAILED_MARKER,
};
