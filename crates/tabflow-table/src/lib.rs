//! tabflow's tabular-data kernel.
//!
//! A [`Table`] is an ordered list of uniquely named columns plus an ordered
//! list of rows, with metadata (inferred types, nullability, uniqueness,
//! timestamps, origin) kept in sync on every derivation.
//!
//! The [`ops`] module holds the operator library — pure functions from a
//! table (plus configuration) to a new table. [`profile`] produces the
//! quality/statistics report the editor's inspector consumes.

pub mod infer;
pub mod ops;
pub mod profile;
pub mod table;

pub use infer::{TypeInference, ValuePattern, infer_column_type, infer_column};
pub use table::{ColumnType, SourceInfo, Table, TableMeta, TableOrigin};

pub use tabflow_common::{AppError, Cell};
