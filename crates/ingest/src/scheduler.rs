use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::IngestError;
use crate::pool::WorkerPool;
use crate::traits::{MessageQueue, TaskProcessor};
use crate::types::{Message, PoolStats, SchedulerConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub consumed: usize,
    pub embedding: Option<PoolStats>,
    pub graph: PoolStats,
}

/// Single consumption loop dispatching every message to the embedding pool
/// (when configured) and then to the graph pool. A full pool blocks the loop.
pub struct IndexScheduler<P> {
    config: SchedulerConfig,
    queue: Arc<dyn MessageQueue<P>>,
    embedding: Option<WorkerPool<P>>,
    graph: WorkerPool<P>,
}

impl<P: Send + Sync + 'static> IndexScheduler<P> {
    pub fn new(
        config: SchedulerConfig,
        queue: Arc<dyn MessageQueue<P>>,
        graph: Arc<dyn TaskProcessor<P>>,
        embedding: Option<Arc<dyn TaskProcessor<P>>>,
    ) -> Result<Self, IngestError> {
        if config.topic.is_empty() {
            return Err(IngestError::Config("topic is required".to_string()));
        }
        let embedding = embedding
            .map(|processor| WorkerPool::new("embedding", &config.embedding, processor))
            .transpose()?;
        let graph = WorkerPool::new("graph", &config.graph, graph)?;
        Ok(Self {
            config,
            queue,
            embedding,
            graph,
        })
    }

    /// Runs until `cancel` fires or the topic is closed and drained, then
    /// waits for both pools to finish their queued tasks.
    pub async fn run(self, cancel: CancellationToken) -> Result<SchedulerReport, IngestError> {
        let topic = self.config.topic.clone();
        info!(topic = %topic, "index scheduler started");
        let mut consumed = 0usize;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(topic = %topic, "index scheduler cancelled");
                    break;
                }
                next = self.queue.consume(&topic, self.config.poll_timeout) => next,
            };
            let message = match next {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(topic = %topic, "no message within poll timeout");
                    continue;
                }
                Err(IngestError::QueueClosed(_)) => {
                    info!(topic = %topic, "queue closed");
                    break;
                }
                Err(e) => {
                    error!(topic = %topic, "consume failed: {e}");
                    continue;
                }
            };
            consumed += 1;

            let dispatched = tokio::select! {
                _ = cancel.cancelled() => None,
                res = self.dispatch(Arc::new(message), &cancel) => Some(res),
            };
            match dispatched {
                Some(Ok(())) => {}
                Some(Err(e)) => error!(topic = %topic, "dispatch failed: {e}"),
                None => {
                    info!(topic = %topic, "index scheduler cancelled during dispatch");
                    break;
                }
            }
        }

        let embedding = match self.embedding {
            Some(pool) => Some(pool.shutdown().await),
            None => None,
        };
        let graph = self.graph.shutdown().await;
        Ok(SchedulerReport {
            consumed,
            embedding,
            graph,
        })
    }

    /// Each task gets its own child token so a timeout in one pool leaves the
    /// other task running.
    async fn dispatch(
        &self,
        message: Arc<Message<P>>,
        cancel: &CancellationToken,
    ) -> Result<(), IngestError> {
        debug!(msg_id = %message.msg_id, "dispatching message");
        if let Some(pool) = &self.embedding {
            pool.submit(Arc::clone(&message), cancel.child_token()).await?;
        }
        self.graph.submit(message, cancel.child_token()).await
    }
}
