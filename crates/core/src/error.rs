use shenma_api::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShenmaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("protobuf error: {0}")]
    Protobuf(#[from] protobuf::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("detection error: {0}")]
    Detection(String),
    #[error("command error: {0}")]
    Command(String),
    #[error("concurrent error: codebase is already being processed: {0}")]
    Concurrent(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShenmaError {
    /// Aggregate several failures into one error, one line per failure.
    pub fn join(errors: Vec<ShenmaError>) -> Option<ShenmaError> {
        if errors.is_empty() {
            return None;
        }
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Some(ShenmaError::Command(joined))
    }
}

impl From<ShenmaError> for ApiError {
    fn from(err: ShenmaError) -> Self {
        match err {
            ShenmaError::NotFound(msg) => ApiError::NotFound(msg),
            ShenmaError::InvalidArgument(msg) => ApiError::InvalidArgument(msg),
            ShenmaError::Unsupported(op) => ApiError::Unsupported(op),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShenmaError>;
