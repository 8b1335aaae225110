//! Message-driven index scheduling: a queue consumer feeding two bounded
//! worker pools, one for embedding tasks and one for graph tasks.

pub mod error;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod traits;
pub mod types;

pub use error::IngestError;
pub use pool::WorkerPool;
pub use queue::MemoryQueue;
pub use scheduler::{IndexScheduler, SchedulerReport};
pub use traits::{MessageQueue, TaskProcessor};
pub use types::{Message, MessageId, PoolConfig, PoolStats, SchedulerConfig, TaskOutcome, Topic};
