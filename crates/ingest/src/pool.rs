use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::IngestError;
use crate::traits::TaskProcessor;
use crate::types::{Message, PoolConfig, PoolStats, TaskOutcome};

struct Job<P> {
    message: Arc<Message<P>>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    timed_out: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Done => &self.completed,
            TaskOutcome::Failed(_) => &self.failed,
            TaskOutcome::TimedOut => &self.timed_out,
            TaskOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Fixed set of workers behind a bounded job queue. `submit` waits while the
/// queue is full.
pub struct WorkerPool<P> {
    name: &'static str,
    tx: Option<mpsc::Sender<Job<P>>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl<P: Send + Sync + 'static> WorkerPool<P> {
    /// Spawns the workers on the current tokio runtime.
    pub fn new(
        name: &'static str,
        config: &PoolConfig,
        processor: Arc<dyn TaskProcessor<P>>,
    ) -> Result<Self, IngestError> {
        if config.pool_size == 0 {
            return Err(IngestError::Config(format!("{name} pool size must be > 0")));
        }
        let (tx, rx) = mpsc::channel::<Job<P>>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        let workers = (0..config.pool_size)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let processor = Arc::clone(&processor);
                let counters = Arc::clone(&counters);
                let timeout = config.timeout;
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        let outcome = run_job(name, &processor, job, timeout).await;
                        counters.record(&outcome);
                    }
                    debug!(pool = name, worker, "worker stopped");
                })
            })
            .collect();

        Ok(Self {
            name,
            tx: Some(tx),
            workers,
            counters,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn submit(
        &self,
        message: Arc<Message<P>>,
        cancel: CancellationToken,
    ) -> Result<(), IngestError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| IngestError::Submit(format!("{} pool is shut down", self.name)))?;
        tx.send(Job { message, cancel })
            .await
            .map_err(|_| IngestError::Submit(format!("{} pool workers exited", self.name)))?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Stops accepting jobs and waits for the workers to drain the queue.
    pub async fn shutdown(mut self) -> PoolStats {
        self.tx.take();
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                error!(pool = self.name, "worker join failure: {e}");
            }
        }
        let stats = self.counters.snapshot();
        info!(
            pool = self.name,
            submitted = stats.submitted,
            completed = stats.completed,
            failed = stats.failed,
            timed_out = stats.timed_out,
            cancelled = stats.cancelled,
            "pool drained"
        );
        stats
    }
}

async fn run_job<P: Send + Sync + 'static>(
    pool: &'static str,
    processor: &Arc<dyn TaskProcessor<P>>,
    job: Job<P>,
    timeout: Duration,
) -> TaskOutcome {
    let Job { message, cancel } = job;
    let msg_id = message.msg_id.clone();
    if cancel.is_cancelled() {
        debug!(pool, msg_id = %msg_id, "task cancelled before start");
        return TaskOutcome::Cancelled;
    }

    let started = Instant::now();
    let task = {
        let processor = Arc::clone(processor);
        let token = cancel.clone();
        tokio::task::spawn_blocking(move || processor.process(&message, &token))
    };

    // A timed out or cancelled task keeps running on its blocking thread;
    // only the token tells it to stop.
    let outcome = tokio::select! {
        res = tokio::time::timeout(timeout, task) => match res {
            Ok(Ok(Ok(()))) => TaskOutcome::Done,
            Ok(Ok(Err(e))) => TaskOutcome::Failed(e.to_string()),
            Ok(Err(e)) => TaskOutcome::Failed(format!("task join failure: {e}")),
            Err(_) => TaskOutcome::TimedOut,
        },
        _ = cancel.cancelled() => TaskOutcome::Cancelled,
    };
    cancel.cancel();

    let processor = processor.name();
    let elapsed_ms = started.elapsed().as_millis();
    match &outcome {
        TaskOutcome::Done => info!(pool, processor, msg_id = %msg_id, elapsed_ms, "task done"),
        TaskOutcome::Failed(e) => {
            error!(pool, processor, msg_id = %msg_id, elapsed_ms, "task failed: {e}")
        }
        TaskOutcome::TimedOut => warn!(
            pool,
            processor,
            msg_id = %msg_id,
            timeout_ms = timeout.as_millis(),
            "task timed out"
        ),
        TaskOutcome::Cancelled => warn!(pool, processor, msg_id = %msg_id, "task cancelled"),
    }
    outcome
}
