mod clear;
mod index;
mod query;
mod sync;

use clap::{Parser, Subcommand};
use shenma_core::CodegraphService;
use shenma_core::config::CodegraphConfig;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "shenma",
    version,
    about = "SCIP-backed code graph indexer and query tool",
    long_about = "Shenma runs the configured SCIP indexers over a codebase, stores the resulting \
                  definitions, references and relationships in a per-codebase graph under \
                  <codebase>/.shenma, and answers relation and structure queries against it."
)]
pub struct Cli {
    /// Codegraph YAML configuration. Defaults to ~/.shenma/codegraph.yaml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the SCIP index of a codebase and rebuild its graph
    #[command(
        long_about = "Detects the dominant language, runs the configured build and index commands \
                      to produce <codebase>/.shenma/index.scip, then parses it into the graph store."
    )]
    Index {
        #[arg(value_name = "CODEBASE_PATH")]
        path: PathBuf,
    },
    /// Parse an existing SCIP file into the graph without running any indexer
    Parse {
        #[arg(value_name = "CODEBASE_PATH")]
        path: PathBuf,
        /// SCIP file to read instead of <codebase>/.shenma/index.scip
        #[arg(long, value_name = "FILE")]
        scip: Option<PathBuf>,
    },
    /// Print the relation tree of a symbol as JSON
    #[command(
        long_about = "Resolves the symbol at --line/--column (one-based) or named by --name inside \
                      --file, then follows definition, reference, implementation and type-definition \
                      edges breadth-first up to --max-layer hops."
    )]
    Relation {
        #[arg(value_name = "CODEBASE_PATH")]
        path: PathBuf,
        /// File path relative to the codebase root
        #[arg(long)]
        file: String,
        #[arg(long, default_value_t = 0)]
        line: usize,
        #[arg(long, default_value_t = 0)]
        column: usize,
        /// Symbol name, used alone or to narrow a position match
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = 1)]
        max_layer: usize,
        /// Attach source text to every node
        #[arg(long)]
        content: bool,
    },
    /// Print the definitions used in a line span, or of named symbols, as JSON
    #[command(
        long_about = "Collects the symbols starting inside --start-line..=--end-line (one-based) of \
                      --file and prints the definition each reference points at. With --name, \
                      looks the definitions up in the symbol-name index instead."
    )]
    Definition {
        #[arg(value_name = "CODEBASE_PATH")]
        path: PathBuf,
        /// File path relative to the codebase root
        #[arg(long)]
        file: String,
        #[arg(long, default_value_t = 0)]
        start_line: usize,
        /// Defaults to --start-line
        #[arg(long, default_value_t = 0)]
        end_line: usize,
        /// Symbol name to look up; repeatable
        #[arg(long = "name")]
        names: Vec<String>,
        /// Attach source text to every definition
        #[arg(long)]
        content: bool,
    },
    /// List the symbols of one indexed file
    Structure {
        #[arg(value_name = "CODEBASE_PATH")]
        path: PathBuf,
        #[arg(long)]
        file: String,
    },
    /// Show document and symbol-name counts of a codebase graph
    Summary {
        #[arg(value_name = "CODEBASE_PATH")]
        path: PathBuf,
    },
    /// Remove every stored document of a codebase graph
    Clear {
        #[arg(value_name = "CODEBASE_PATH")]
        path: PathBuf,
    },
    /// Queue one sync message per codebase and run them through the scheduler
    #[command(
        long_about = "Each codebase is rebuilt on the graph worker pool. Paths marked `delete` in \
                      <codebase>/.shenma_sync metadata are removed from the graph afterwards."
    )]
    Sync {
        #[arg(value_name = "CODEBASE_PATH", required = true)]
        paths: Vec<PathBuf>,
        /// Graph worker count
        #[arg(long, default_value_t = 2)]
        workers: usize,
        /// Per-codebase timeout in seconds
        #[arg(long, default_value_t = 1800)]
        timeout_secs: u64,
    },
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = shenma_core::logging::init_logging("cli", true);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Index { path } => {
            let service = load_service(cli.config.as_deref())?;
            rt.block_on(index::run(&service, path))
        }
        Commands::Parse { path, scip } => {
            let service = CodegraphService::new(CodegraphConfig::default());
            rt.block_on(index::parse(&service, path, scip))
        }
        Commands::Relation {
            path,
            file,
            line,
            column,
            name,
            max_layer,
            content,
        } => {
            let service = CodegraphService::new(CodegraphConfig::default());
            let query = query::relation_query(&path, file, line, column, name, max_layer, content);
            rt.block_on(query::relation(&service, query))
        }
        Commands::Definition {
            path,
            file,
            start_line,
            end_line,
            names,
            content,
        } => {
            let service = CodegraphService::new(CodegraphConfig::default());
            let query = query::definition_query(&path, file, start_line, end_line, names, content);
            rt.block_on(query::definition(&service, query))
        }
        Commands::Structure { path, file } => {
            let service = CodegraphService::new(CodegraphConfig::default());
            rt.block_on(query::structure(&service, &path, file))
        }
        Commands::Summary { path } => {
            let service = CodegraphService::new(CodegraphConfig::default());
            rt.block_on(query::summary(&service, &path))
        }
        Commands::Clear { path } => {
            let service = CodegraphService::new(CodegraphConfig::default());
            rt.block_on(clear::run(&service, &path))
        }
        Commands::Sync {
            paths,
            workers,
            timeout_secs,
        } => {
            let service = load_service(cli.config.as_deref())?;
            rt.block_on(sync::run(service, paths, workers, timeout_secs))
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shenma")
        .join("codegraph.yaml")
}

fn load_service(config: Option<&Path>) -> anyhow::Result<CodegraphService> {
    let path = config.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    CodegraphService::load(&path)
        .map_err(|e| anyhow::anyhow!("load config {}: {e}", path.display()))
}

pub(crate) fn codebase_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
