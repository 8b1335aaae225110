use std::path::{Path, PathBuf};
use std::sync::Arc;

use shenma_api::ApiError;

use crate::codebase::{CodebaseStore, LocalCodebaseStore};
use crate::config::CodegraphConfig;
use crate::error::Result;
use crate::processor::CodegraphProcessor;

mod graph;
mod lifecycle;

/// Async entry point for outer layers. Every call runs on a blocking
/// thread and opens the store of the codebase it names.
#[derive(Clone)]
pub struct CodegraphService {
    pub(crate) processor: Arc<CodegraphProcessor>,
    pub(crate) codebase_store: Arc<dyn CodebaseStore>,
}

impl CodegraphService {
    pub fn new(config: CodegraphConfig) -> Self {
        Self::with_store(Arc::new(config), Arc::new(LocalCodebaseStore::new()))
    }

    pub fn with_store(config: Arc<CodegraphConfig>, codebase_store: Arc<dyn CodebaseStore>) -> Self {
        Self {
            processor: Arc::new(CodegraphProcessor::new(config, Arc::clone(&codebase_store))),
            codebase_store,
        }
    }

    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(CodegraphConfig::load(config_path)?))
    }

    pub fn processor(&self) -> &Arc<CodegraphProcessor> {
        &self.processor
    }

    /// Runs `f` with the processor on the blocking pool.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> std::result::Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&CodegraphProcessor, &Arc<dyn CodebaseStore>) -> Result<T> + Send + 'static,
    {
        let processor = Arc::clone(&self.processor);
        let store = Arc::clone(&self.codebase_store);
        tokio::task::spawn_blocking(move || f(&processor, &store))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(ApiError::from)
    }
}

pub(crate) fn codebase_path(raw: &str) -> std::result::Result<PathBuf, ApiError> {
    if raw.is_empty() {
        return Err(ApiError::InvalidArgument("codebasePath is required".into()));
    }
    Ok(PathBuf::from(raw))
}
