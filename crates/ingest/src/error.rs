use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("queue closed: {0}")]
    QueueClosed(String),
    #[error("submit failed: {0}")]
    Submit(String),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("invalid config: {0}")]
    Config(String),
}
