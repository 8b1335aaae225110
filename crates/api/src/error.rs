#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
