use std::path::Path;

use shenma_api::IndexService;
use shenma_core::CodegraphService;
use tracing::info;

use crate::codebase_arg;

pub async fn run(service: &CodegraphService, path: &Path) -> anyhow::Result<()> {
    info!("Clearing graph of codebase at: {}...", path.display());
    service.clear_index(&codebase_arg(path)).await?;
    info!("Codebase graph cleared.");
    Ok(())
}
