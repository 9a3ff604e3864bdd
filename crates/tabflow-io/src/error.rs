use tabflow_common::{AppError, codes};
use thiserror::Error;

/// Backend-local error type; converted to [`AppError`] at the crate
/// boundary so callers only ever see the workspace envelope.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("parse failure: {0}")]
    Parse(String),

    #[error("parse failure at line {line}: {message}")]
    ParseAt { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("file is {size} bytes, over the {cap} byte cap")]
    TooLarge { size: u64, cap: u64 },

    #[error("unsupported format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http failure: {0}")]
    Http(String),
}

impl From<csv::Error> for IoError {
    fn from(e: csv::Error) -> Self {
        match e.position() {
            Some(pos) => IoError::ParseAt {
                line: pos.line() as usize,
                message: e.to_string(),
            },
            None => IoError::Parse(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::ParseAt {
            line: e.line(),
            message: e.to_string(),
        }
    }
}

impl From<IoError> for AppError {
    fn from(e: IoError) -> Self {
        match &e {
            IoError::TooLarge { .. } => {
                AppError::file(e.to_string()).with_code(codes::FILE_TOO_LARGE)
            }
            IoError::InvalidUrl(_) => {
                AppError::network(e.to_string()).with_code(codes::INVALID_URL)
            }
            IoError::Http(_) => AppError::network(e.to_string()),
            _ => AppError::file(e.to_string()).with_code(codes::PARSE_FAILURE),
        }
    }
}
