use crate::ApiResult;
use crate::models::SyncMessage;
use async_trait::async_trait;

#[async_trait]
pub trait IndexService: Send + Sync {
    /// Generate the SCIP index for a codebase and rebuild its graph from it.
    async fn index(&self, codebase_path: &str) -> ApiResult<()>;

    /// Rebuild the graph, then drop documents the sync batch deleted.
    async fn sync(&self, message: &SyncMessage) -> ApiResult<()>;

    /// Remove every stored document and name index entry of a codebase.
    async fn clear_index(&self, codebase_path: &str) -> ApiResult<()>;
}
