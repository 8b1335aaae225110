use std::collections::BTreeMap;
use std::time::Duration;

pub type MessageId = String;
pub type Topic = String;

#[derive(Debug, Clone)]
pub struct Message<P> {
    pub msg_id: MessageId,
    pub topic: Topic,
    pub payload: P,
    pub metadata: BTreeMap<String, String>,
}

impl<P> Message<P> {
    pub fn new(msg_id: impl Into<String>, topic: impl Into<String>, payload: P) -> Self {
        Self {
            msg_id: msg_id.into(),
            topic: topic.into(),
            payload,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pool_size: usize,
    /// Jobs waiting for a worker. Submitting to a full queue waits.
    pub queue_capacity: usize,
    /// Per-task deadline.
    pub timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            queue_capacity: 8,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub topic: Topic,
    pub poll_timeout: Duration,
    pub embedding: PoolConfig,
    pub graph: PoolConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            topic: "codebase_sync".to_string(),
            poll_timeout: Duration::from_secs(5),
            embedding: PoolConfig::default(),
            graph: PoolConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Done,
    Failed(String),
    TimedOut,
    /// Parent shutdown before or while the task ran.
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

impl PoolStats {
    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.timed_out + self.cancelled
    }
}
