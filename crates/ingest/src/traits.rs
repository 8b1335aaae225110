use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::IngestError;
use crate::types::Message;

#[async_trait]
pub trait MessageQueue<P>: Send + Sync {
    async fn produce(&self, message: Message<P>) -> Result<(), IngestError>;

    /// Next message of `topic`, or `None` when nothing arrived within `timeout`.
    async fn consume(&self, topic: &str, timeout: Duration) -> Result<Option<Message<P>>, IngestError>;

    /// No further messages are accepted; buffered ones can still be consumed.
    async fn close(&self, topic: &str) -> Result<(), IngestError>;
}

/// Blocking unit of work run on a pool worker. `cancel` fires on timeout,
/// on shutdown, and once the task has returned.
pub trait TaskProcessor<P>: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, message: &Message<P>, cancel: &CancellationToken) -> Result<(), IngestError>;
}
