//! tabflow's execution core.
//!
//! Given a user-authored graph of data-processing nodes, this crate
//! resolves dependencies ([`graph`]), looks up node executors in the
//! process-wide [`registry`], and drives the run through the
//! [`engine::ExecutionEngine`] — bounded parallelism, per-task timeouts and
//! retries, cooperative cancellation, and an output cache keyed by node id.
//!
//! Built-in node executors live in [`nodes`]; the script node's sandboxed
//! expression language in [`expr`].

pub mod cancel;
pub mod engine;
pub mod events;
pub mod executor;
pub mod expr;
pub mod graph;
pub mod nodes;
pub mod registry;

pub use cancel::CancelToken;
pub use engine::{
    CachedOutput, EngineConfig, EngineStatus, ExecutionEngine, ExecutionStats, RunOutcome,
};
pub use events::Callbacks;
pub use executor::{
    ExecutionContext, ExecutionResult, InputBinding, NodeCaps, NodeExecutor, NodeValue,
    ValidationIssue, ValidationResult, run_node,
};
pub use graph::{Edge, ExecutionGraph, Node, NodeStatus, NodeVertex};

pub use tabflow_common::{AppError, Cell, ErrorKind};
