use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};

use crate::error::IngestError;
use crate::traits::MessageQueue;
use crate::types::Message;

const DEFAULT_CAPACITY: usize = 1024;

struct TopicChannel<P> {
    tx: StdMutex<Option<mpsc::Sender<Message<P>>>>,
    rx: Mutex<mpsc::Receiver<Message<P>>>,
}

impl<P> TopicChannel<P> {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx: StdMutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Message<P>>> {
        self.tx.lock().ok().and_then(|tx| tx.clone())
    }
}

/// In-process queue with one bounded channel per topic.
pub struct MemoryQueue<P> {
    capacity: usize,
    topics: DashMap<String, Arc<TopicChannel<P>>>,
}

impl<P> Default for MemoryQueue<P> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<P> MemoryQueue<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: DashMap::new(),
        }
    }

    fn topic(&self, topic: &str) -> Arc<TopicChannel<P>> {
        Arc::clone(
            self.topics
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(TopicChannel::new(self.capacity)))
                .value(),
        )
    }
}

#[async_trait]
impl<P: Send + 'static> MessageQueue<P> for MemoryQueue<P> {
    async fn produce(&self, message: Message<P>) -> Result<(), IngestError> {
        let channel = self.topic(&message.topic);
        let topic = message.topic.clone();
        let tx = channel
            .sender()
            .ok_or_else(|| IngestError::QueueClosed(topic.clone()))?;
        tx.send(message)
            .await
            .map_err(|_| IngestError::QueueClosed(topic))
    }

    async fn consume(&self, topic: &str, timeout: Duration) -> Result<Option<Message<P>>, IngestError> {
        let channel = self.topic(topic);
        let mut rx = channel.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(IngestError::QueueClosed(topic.to_string())),
            Err(_) => Ok(None),
        }
    }

    async fn close(&self, topic: &str) -> Result<(), IngestError> {
        let channel = self.topic(topic);
        let mut tx = channel
            .tx
            .lock()
            .map_err(|_| IngestError::Execution("queue lock poisoned".to_string()))?;
        tx.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_times_out_without_messages() {
        let queue: MemoryQueue<u8> = MemoryQueue::default();
        let got = queue.consume("t", Duration::from_millis(20)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn closed_topic_drains_then_reports_closed() {
        let queue = MemoryQueue::new(4);
        queue.produce(Message::new("1", "t", 1u8)).await.unwrap();
        queue.produce(Message::new("2", "t", 2u8)).await.unwrap();
        queue.close("t").await.unwrap();

        assert!(matches!(
            queue.produce(Message::new("3", "t", 3u8)).await,
            Err(IngestError::QueueClosed(_))
        ));

        let timeout = Duration::from_millis(50);
        assert_eq!(queue.consume("t", timeout).await.unwrap().unwrap().payload, 1);
        assert_eq!(queue.consume("t", timeout).await.unwrap().unwrap().payload, 2);
        assert!(matches!(
            queue.consume("t", timeout).await,
            Err(IngestError::QueueClosed(_))
        ));
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let queue = MemoryQueue::new(4);
        queue.produce(Message::new("a", "one", 1u8)).await.unwrap();
        let other = queue.consume("two", Duration::from_millis(20)).await.unwrap();
        assert!(other.is_none());
        let one = queue.consume("one", Duration::from_millis(20)).await.unwrap();
        assert_eq!(one.unwrap().msg_id, "a");
    }
}
