use std::path::PathBuf;

use super::{CodegraphService, codebase_path};
use crate::scip::ParseReport;
use async_trait::async_trait;
use shenma_api::models::SyncMessage;
use shenma_api::{ApiResult, IndexService};
use tracing::info;

impl CodegraphService {
    /// Generate, parse and persist, returning the parse report.
    pub async fn rebuild(&self, codebase: &str) -> ApiResult<ParseReport> {
        let root = codebase_path(codebase)?;
        let report = self
            .blocking(move |processor, _| processor.process(&root))
            .await?;
        info!(
            codebase,
            documents = report.documents,
            dropped = report.dropped_paths.len(),
            "index finished"
        );
        Ok(report)
    }

    /// Persists an already generated SCIP file.
    pub async fn parse_existing(
        &self,
        codebase: &str,
        scip_path: Option<PathBuf>,
    ) -> ApiResult<ParseReport> {
        let root = codebase_path(codebase)?;
        self.blocking(move |processor, _| processor.parse_and_persist(&root, scip_path.as_deref()))
            .await
    }
}

#[async_trait]
impl IndexService for CodegraphService {
    async fn index(&self, codebase: &str) -> ApiResult<()> {
        self.rebuild(codebase).await.map(|_| ())
    }

    async fn sync(&self, message: &SyncMessage) -> ApiResult<()> {
        let root = codebase_path(&message.codebase_path)?;
        let file_list = message.file_list.clone();
        let report = self
            .blocking(move |processor, _| processor.sync(&root, &file_list))
            .await?;
        info!(
            sync_id = %message.sync_id,
            codebase = %message.codebase_path,
            documents = report.documents,
            "sync finished"
        );
        Ok(())
    }

    async fn clear_index(&self, codebase: &str) -> ApiResult<()> {
        let root = codebase_path(codebase)?;
        self.blocking(move |processor, _| processor.clear(&root))
            .await
    }
}
