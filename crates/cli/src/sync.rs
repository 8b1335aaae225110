use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use shenma_api::models::SyncMessage;
use shenma_core::{CodegraphProcessor, CodegraphService};
use shenma_ingest::{
    IndexScheduler, IngestError, MemoryQueue, Message, MessageQueue, PoolConfig, SchedulerConfig,
    TaskProcessor,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::codebase_arg;

/// Graph pool task: rebuild the codebase graph and apply sync deletions.
struct GraphTask {
    processor: Arc<CodegraphProcessor>,
}

impl TaskProcessor<SyncMessage> for GraphTask {
    fn name(&self) -> &'static str {
        "codegraph"
    }

    fn process(
        &self,
        message: &Message<SyncMessage>,
        cancel: &CancellationToken,
    ) -> Result<(), IngestError> {
        if cancel.is_cancelled() {
            return Err(IngestError::Execution("cancelled before start".to_string()));
        }
        let payload = &message.payload;
        self.processor
            .sync(Path::new(&payload.codebase_path), &payload.file_list)
            .map(|_| ())
            .map_err(|e| IngestError::Execution(format!("{}: {e}", payload.codebase_path)))
    }
}

pub async fn run(
    service: CodegraphService,
    paths: Vec<PathBuf>,
    workers: usize,
    timeout_secs: u64,
) -> anyhow::Result<()> {
    let config = SchedulerConfig {
        graph: PoolConfig {
            pool_size: workers,
            timeout: Duration::from_secs(timeout_secs),
            ..PoolConfig::default()
        },
        ..SchedulerConfig::default()
    };

    let queue = Arc::new(MemoryQueue::<SyncMessage>::default());
    let sync_id = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    for path in &paths {
        let codebase = codebase_arg(path);
        let payload = SyncMessage {
            sync_id: sync_id.clone(),
            codebase_path: codebase.clone(),
            file_list: Default::default(),
        };
        queue
            .produce(Message::new(
                format!("{sync_id}:{codebase}"),
                config.topic.clone(),
                payload,
            ))
            .await?;
    }
    queue.close(&config.topic).await?;

    let graph = Arc::new(GraphTask {
        processor: Arc::clone(service.processor()),
    });
    let scheduler = IndexScheduler::new(config, queue, graph, None)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping scheduler");
            on_signal.cancel();
        }
    });

    let report = scheduler.run(cancel).await?;
    info!(consumed = report.consumed, "sync finished");
    println!("Codebases:  {}", report.consumed);
    println!("Completed:  {}", report.graph.completed);
    println!("Failed:     {}", report.graph.failed);
    println!("Timed out:  {}", report.graph.timed_out);
    println!("Cancelled:  {}", report.graph.cancelled);
    if report.graph.completed < report.consumed {
        anyhow::bail!(
            "{} of {} codebases did not sync",
            report.consumed - report.graph.completed,
            report.consumed
        );
    }
    Ok(())
}
