use std::path::PathBuf;

use shenma_core::CodegraphService;
use shenma_core::scip::ParseReport;
use tracing::{info, warn};

use crate::codebase_arg;

pub async fn run(service: &CodegraphService, path: PathBuf) -> anyhow::Result<()> {
    let codebase = codebase_arg(&path);
    info!("Indexing codebase at: {}...", path.display());
    let report = service.rebuild(&codebase).await?;
    print_report(&report);
    Ok(())
}

pub async fn parse(
    service: &CodegraphService,
    path: PathBuf,
    scip: Option<PathBuf>,
) -> anyhow::Result<()> {
    let codebase = codebase_arg(&path);
    info!("Parsing SCIP index of: {}...", path.display());
    let report = service.parse_existing(&codebase, scip).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ParseReport) {
    println!("Documents:     {}", report.documents);
    println!("Symbol names:  {}", report.symbol_names);
    println!("Skipped:       {}", report.skipped_records);
    println!("Elapsed:       {} ms", report.elapsed_ms);
    for path in &report.dropped_paths {
        warn!(path = %path, "document dropped: duplicates could not be merged");
    }
}
