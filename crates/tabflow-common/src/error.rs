//! The single error envelope every tabflow layer returns.
//!
//! - **`ErrorKind`** : the canonical set of failure categories
//! - **`AppError`**  : kind + message + optional location/config context
//!
//! The envelope is serializable so callers (editor shells, logs, the event
//! stream) receive the same JSON shape everywhere:
//! `{type, message, code?, nodeId?, field?, details?, timestamp}`.

use std::{error::Error, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure categories recognized across the core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Node configuration is ill-formed (pre-execution, per-field).
    Validation,
    /// Operator type unknown or node definition not registered; fatal.
    Configuration,
    /// The graph contains a cycle; fatal, carries the cycle in `details`.
    Dependency,
    /// An operator failed, timed out, or the run was aborted.
    Execution,
    /// Operand structurally invalid for the operator (unknown column, …).
    Data,
    /// Transport-level HTTP/DNS/TLS failure.
    Network,
    /// File parse failure or size overrun.
    File,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation => "ValidationError",
            Self::Configuration => "ConfigurationError",
            Self::Dependency => "DependencyError",
            Self::Execution => "ExecutionError",
            Self::Data => "DataError",
            Self::Network => "NetworkError",
            Self::File => "FileError",
        })
    }
}

/// Stable machine-readable codes carried in [`AppError::code`].
pub mod codes {
    pub const UNKNOWN_COLUMN: &str = "UNKNOWN_COLUMN";
    pub const DUPLICATE_COLUMN: &str = "DUPLICATE_COLUMN";
    pub const CYCLE_DETECTED: &str = "CYCLE_DETECTED";
    pub const UNKNOWN_NODE_TYPE: &str = "UNKNOWN_NODE_TYPE";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const ABORTED: &str = "ABORTED";
    pub const ALREADY_EXECUTING: &str = "ALREADY_EXECUTING";
    pub const MISSING_INPUT: &str = "MISSING_INPUT";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
    pub const FILE_TOO_LARGE: &str = "FILE_TOO_LARGE";
    pub const INVALID_URL: &str = "INVALID_URL";
    pub const PARSE_FAILURE: &str = "PARSE_FAILURE";
}

/// The error struct the whole workspace passes around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/* ───────────────────── Constructors & helpers ─────────────────────── */

impl AppError {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            node_id: None,
            field: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }
    pub fn dependency<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Dependency, message)
    }
    pub fn execution<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Execution, message)
    }
    pub fn data<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Data, message)
    }
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Network, message)
    }
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::File, message)
    }

    pub fn unknown_column(name: &str) -> Self {
        Self::data(format!("Unknown column '{name}'")).with_code(codes::UNKNOWN_COLUMN)
    }

    pub fn duplicate_column(name: &str) -> Self {
        Self::data(format!("Duplicate column '{name}'")).with_code(codes::DUPLICATE_COLUMN)
    }

    pub fn timeout(millis: u64) -> Self {
        Self::execution(format!("Node execution timeout after {millis}ms"))
            .with_code(codes::TIMEOUT)
    }

    pub fn aborted() -> Self {
        Self::execution("Execution aborted").with_code(codes::ABORTED)
    }

    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_node<S: Into<String>>(mut self, node_id: S) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// True when this error carries the given machine code.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

/* ───────────────────────── Display / Error ────────────────────────── */

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ref node) = self.node_id {
            write!(f, " (node {node})")?;
        }
        if let Some(ref field) = self.field {
            write!(f, " [field {field}]")?;
        }
        Ok(())
    }
}

impl Error for AppError {}

impl From<AppError> for String {
    fn from(e: AppError) -> Self {
        format!("{e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_context() {
        let err = AppError::data("Unknown column 'age'")
            .with_code(codes::UNKNOWN_COLUMN)
            .with_node("filter-1");
        assert_eq!(err.to_string(), "DataError: Unknown column 'age' (node filter-1)");
    }

    #[test]
    fn serializes_to_envelope_shape() {
        let err = AppError::dependency("Cycle detected")
            .with_code(codes::CYCLE_DETECTED)
            .with_details(serde_json::json!(["a", "b", "a"]));
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["type"], "Dependency");
        assert_eq!(v["message"], "Cycle detected");
        assert_eq!(v["code"], "CYCLE_DETECTED");
        assert_eq!(v["details"][0], "a");
        assert!(v.get("timestamp").is_some());
        assert!(v.get("nodeId").is_none());

        let back: AppError = serde_json::from_value(v).unwrap();
        assert_eq!(back.kind, ErrorKind::Dependency);
    }

    #[test]
    fn timeout_message_matches_contract() {
        let err = AppError::timeout(100);
        assert!(err.message.contains("timeout"));
        assert!(err.message.contains("100ms"));
    }
}
