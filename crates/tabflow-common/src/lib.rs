//! Shared foundations for the tabflow dataflow core.
//!
//! This crate carries the two types every other tabflow crate speaks:
//!
//! - [`Cell`] — the tagged cell value stored in tables and passed between
//!   operators
//! - [`AppError`] — the single error envelope the engine, operators, and io
//!   layers all return

pub mod error;
pub mod value;

pub use error::{AppError, ErrorKind, codes};
pub use value::{Cell, parse_timestamp};
