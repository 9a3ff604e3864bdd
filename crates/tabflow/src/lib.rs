//! tabflow — the core of a visual dataflow editor.
//!
//! Submit a graph of data-processing nodes and edges, and the engine
//! executes it with correct dependency ordering, bounded concurrency,
//! per-task timeouts and retries, and cooperative cancellation:
//!
//! ```
//! use serde_json::json;
//! use tabflow::{Edge, ExecutionEngine, Node};
//!
//! let engine = ExecutionEngine::new();
//! let nodes = vec![
//!     Node::new("source", "example-data"),
//!     Node::new("adults", "filter").with_config(json!({
//!         "predicate": { "column": "age", "operator": "greater_than", "value": 27 }
//!     })),
//! ];
//! let edges = vec![Edge::new("e1", "source", "adults")];
//!
//! let outcome = engine.execute_graph(&nodes, &edges).unwrap();
//! assert!(outcome.success);
//! let output = engine.get_node_output("adults").unwrap();
//! assert_eq!(output.as_table().unwrap().row_count(), 4);
//! ```
//!
//! The tabular kernel ([`table`], [`ops`], [`profile`]) and the io
//! backends ([`io`]) are usable on their own.

pub use tabflow_common::{AppError, Cell, ErrorKind, codes};

pub use tabflow_table::{ColumnType, Table, TableMeta, TableOrigin};

pub mod table {
    pub use tabflow_table::table::*;
}

pub mod ops {
    pub use tabflow_table::ops::*;
}

pub mod profile {
    pub use tabflow_table::profile::*;
}

pub mod infer {
    pub use tabflow_table::infer::*;
}

pub use tabflow_engine::{
    Callbacks, EngineConfig, EngineStatus, ExecutionEngine, ExecutionResult, ExecutionStats,
    Node, NodeCaps, NodeExecutor, NodeStatus, NodeValue, RunOutcome,
};
pub use tabflow_engine::{Edge, ExecutionContext, ValidationResult};

pub mod engine {
    pub use tabflow_engine::*;
}

pub mod io {
    pub use tabflow_io::*;
}
