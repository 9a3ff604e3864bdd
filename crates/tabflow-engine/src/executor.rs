//! The node executor contract: validate + execute against a typed context,
//! with a uniform wrapper providing error capture and timing.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use tabflow_common::{AppError, Cell, codes};
use tabflow_table::Table;

use crate::cancel::CancelToken;
use crate::nodes::chart::ChartSpec;

bitflags::bitflags! {
    /// Static properties of a node executor, used by engine-side checks.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct NodeCaps: u8 {
        /// Produces data without requiring an upstream input.
        const SOURCE      = 0b0001;
        /// Consumes more than one upstream and distinguishes them by port.
        const MULTI_INPUT = 0b0010;
        /// Touches the outside world (filesystem, network).
        const EXTERNAL    = 0b0100;
        /// Produces a non-table artifact (chart description, scalar).
        const SINK        = 0b1000;
    }
}

/// What a node produces: usually a table, but charts emit a render
/// description and the script node can yield a bare scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeValue {
    Table(Table),
    Chart(ChartSpec),
    Scalar(Cell),
}

impl NodeValue {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            NodeValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            NodeValue::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Table> for NodeValue {
    fn from(t: Table) -> Self {
        NodeValue::Table(t)
    }
}

/// One upstream input delivered to a node.
#[derive(Debug, Clone)]
pub struct InputBinding {
    /// Producing node id.
    pub source: String,
    /// Target port declared on the edge ("input" for single-input nodes).
    pub port: String,
    pub value: Arc<NodeValue>,
}

/// Everything an executor sees for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub node_id: String,
    /// Unique per dispatch attempt.
    pub execution_id: String,
    pub config: serde_json::Value,
    /// Upstream outputs in edge-port order.
    pub inputs: Vec<InputBinding>,
    pub started_at: DateTime<Utc>,
    /// Soft deadline for cooperative operators.
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
}

impl ExecutionContext {
    /// Bare context for direct executor invocation (tests, validation
    /// outside a run).
    pub fn new<S: Into<String>>(node_id: S, config: serde_json::Value) -> Self {
        Self {
            node_id: node_id.into(),
            execution_id: "adhoc".to_string(),
            config,
            inputs: Vec::new(),
            started_at: Utc::now(),
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_input(mut self, source: &str, value: NodeValue) -> Self {
        self.inputs.push(InputBinding {
            source: source.to_string(),
            port: "input".to_string(),
            value: Arc::new(value),
        });
        self
    }

    pub fn with_port_input(mut self, source: &str, port: &str, value: NodeValue) -> Self {
        self.inputs.push(InputBinding {
            source: source.to_string(),
            port: port.to_string(),
            value: Arc::new(value),
        });
        self
    }

    /// The single (first) upstream value.
    pub fn input(&self) -> Option<&NodeValue> {
        self.inputs.first().map(|b| b.value.as_ref())
    }

    /// The single upstream value as a table, or a `MISSING_INPUT` error.
    pub fn input_table(&self) -> Result<&Table, AppError> {
        self.input()
            .and_then(NodeValue::as_table)
            .ok_or_else(|| {
                AppError::data("Node requires a table input")
                    .with_code(codes::MISSING_INPUT)
                    .with_node(&self.node_id)
            })
    }

    /// Upstream value bound to a named port.
    pub fn input_named(&self, port: &str) -> Option<&NodeValue> {
        self.inputs
            .iter()
            .find(|b| b.port == port)
            .map(|b| b.value.as_ref())
    }

    /// Upstream value produced by a specific node.
    pub fn input_from(&self, source: &str) -> Option<&NodeValue> {
        self.inputs
            .iter()
            .find(|b| b.source == source)
            .map(|b| b.value.as_ref())
    }

    /// Deserialize the node's static configuration. An absent (null)
    /// configuration reads as an empty object so executors whose fields
    /// all default still work unconfigured.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let config = if self.config.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.config.clone()
        };
        serde_json::from_value(config).map_err(|e| {
            AppError::validation(format!("Invalid configuration: {e}"))
                .with_code(codes::INVALID_CONFIG)
                .with_node(&self.node_id)
        })
    }

    pub fn check_cancelled(&self) -> Result<(), AppError> {
        if self.cancel.is_cancelled() {
            Err(AppError::aborted().with_node(&self.node_id))
        } else {
            Ok(())
        }
    }

    /// Time left until the soft deadline; `None` when no deadline is set.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub code: String,
}

/// Outcome of the pure, synchronous validate step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn invalid(field: &str, message: &str, code: &str) -> Self {
        let mut result = Self::ok();
        result.push_error(field, message, code);
        result
    }

    pub fn push_error(&mut self, field: &str, message: &str, code: &str) {
        self.valid = false;
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
            code: code.to_string(),
        });
    }

    pub fn push_warning(&mut self, field: &str, message: &str, code: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
            code: code.to_string(),
        });
    }
}

/// Per-invocation bookkeeping attached to every result.
#[derive(Debug, Clone)]
pub struct ExecutionMetadata {
    pub node_id: String,
    pub execution_id: String,
    pub started_at: DateTime<Utc>,
}

/// Uniform envelope returned by [`run_node`]. Never a panic, never a bare
/// error — failures are carried in `error` with `success = false`.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Option<Arc<NodeValue>>,
    pub error: Option<AppError>,
    pub execution_time: Duration,
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    pub fn failure(error: AppError, metadata: ExecutionMetadata, elapsed: Duration) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error),
            execution_time: elapsed,
            metadata,
        }
    }
}

/// A node type implementation: pure validation plus execution against the
/// typed context. Implementations must not panic across this boundary and
/// must treat their inputs as read-only.
pub trait NodeExecutor: Send + Sync + 'static {
    fn node_type(&self) -> &'static str;

    fn caps(&self) -> NodeCaps {
        NodeCaps::empty()
    }

    /// Pure and idempotent; never touches the outside world.
    fn validate(&self, ctx: &ExecutionContext) -> ValidationResult;

    fn execute(&self, ctx: &ExecutionContext) -> Result<NodeValue, AppError>;
}

/// Run an executor with uniform error capture and timing.
///
/// Validation failures short-circuit into a `ValidationError`; execution
/// errors are annotated with the node id; panics are caught and mapped to
/// `ExecutionError`. This function never propagates a failure out of the
/// executor boundary.
pub fn run_node(executor: &dyn NodeExecutor, ctx: &ExecutionContext) -> ExecutionResult {
    let started = Instant::now();
    let metadata = ExecutionMetadata {
        node_id: ctx.node_id.clone(),
        execution_id: ctx.execution_id.clone(),
        started_at: ctx.started_at,
    };

    let validation = executor.validate(ctx);
    if !validation.valid {
        let first = &validation.errors[0];
        let error = AppError::validation(first.message.clone())
            .with_code(first.code.clone())
            .with_field(first.field.clone())
            .with_node(&ctx.node_id)
            .with_details(serde_json::json!({
                "errors": validation.errors,
                "warnings": validation.warnings,
            }));
        return ExecutionResult::failure(error, metadata, started.elapsed());
    }

    match catch_unwind(AssertUnwindSafe(|| executor.execute(ctx))) {
        Ok(Ok(value)) => ExecutionResult {
            success: true,
            output: Some(Arc::new(value)),
            error: None,
            execution_time: started.elapsed(),
            metadata,
        },
        Ok(Err(mut error)) => {
            if error.node_id.is_none() {
                error.node_id = Some(ctx.node_id.clone());
            }
            ExecutionResult::failure(error, metadata, started.elapsed())
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let error = AppError::execution(format!("Node panicked: {message}"))
                .with_node(&ctx.node_id);
            ExecutionResult::failure(error, metadata, started.elapsed())
        }
    }
}
