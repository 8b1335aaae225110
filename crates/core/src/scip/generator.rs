use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{info, warn};

use super::command::CommandExecutor;
use crate::codebase::{self, CodebaseStore};
use crate::config::{BuildTool, CodegraphConfig, IndexTool};
use crate::error::{Result, ShenmaError};
use crate::logging::{DEFAULT_INDEX_LOG_DIR, IndexLog, clean_expired_index_logs};

pub const PLACEHOLDER_SOURCE_PATH: &str = "__sourcePath__";
pub const PLACEHOLDER_OUTPUT_PATH: &str = "__outputPath__";

const NO_MATCH: &str = "no matching language configuration found";

/// Produces `<codebase>/.shenma/index.scip` by running the configured build
/// and index tools for the codebase's dominant language.
pub struct IndexGenerator {
    config: Arc<CodegraphConfig>,
    store: Arc<dyn CodebaseStore>,
    in_progress: DashMap<PathBuf, ()>,
}

/// Releases the in-progress mark of a codebase when generation ends.
struct ProcessingGuard<'a> {
    in_progress: &'a DashMap<PathBuf, ()>,
    key: PathBuf,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.in_progress.remove(&self.key);
    }
}

impl IndexGenerator {
    pub fn new(config: Arc<CodegraphConfig>, store: Arc<dyn CodebaseStore>) -> Self {
        Self {
            config,
            store,
            in_progress: DashMap::new(),
        }
    }

    pub fn is_processing(&self, codebase: &Path) -> bool {
        match self.store.canonicalize(codebase) {
            Ok(path) => self.in_progress.contains_key(&path),
            Err(_) => self.in_progress.contains_key(codebase),
        }
    }

    fn acquire(&self, codebase: &Path) -> Result<ProcessingGuard<'_>> {
        let key = codebase.to_path_buf();
        if self.in_progress.insert(key.clone(), ()).is_some() {
            return Err(ShenmaError::Concurrent(codebase.display().to_string()));
        }
        Ok(ProcessingGuard {
            in_progress: &self.in_progress,
            key,
        })
    }

    /// Commands run inside the canonical codebase path, which is also what
    /// `__sourcePath__` expands to and what the in-progress guard is keyed on.
    pub fn generate(&self, codebase: &Path) -> Result<()> {
        let codebase = self.store.canonicalize(codebase)?;
        let codebase = codebase.as_path();
        let _guard = self.acquire(codebase)?;
        let started = Instant::now();

        let output_dir = codebase::index_dir(codebase);
        self.store.mkdirs(&output_dir).map_err(|e| {
            ShenmaError::Internal(format!("failed to create codebase index directory: {e}"))
        })?;

        let (index_tool, build_tool) = self.detect_language_and_tool(codebase)?;
        info!(
            codebase = %codebase.display(),
            index_tool = %index_tool.name,
            build_tool = build_tool.as_ref().map(|b| b.name.as_str()).unwrap_or("-"),
            "detected index tooling"
        );

        let log_dir = self
            .config
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_LOG_DIR));
        clean_expired_index_logs(&log_dir, self.config.retention_days);
        let log = IndexLog::open(Some(&log_dir), codebase);

        let executor = CommandExecutor::new(
            codebase,
            &index_tool,
            build_tool.as_ref(),
            &self.placeholders(codebase),
            log,
        )?;
        let result = executor.execute();
        executor.close()?;
        result?;

        info!(
            codebase = %codebase.display(),
            elapsed_ms = started.elapsed().as_millis(),
            "scip index generated"
        );
        Ok(())
    }

    /// Configured variables, then the built-in source/output path placeholders.
    pub fn placeholders(&self, codebase: &Path) -> BTreeMap<String, String> {
        let mut placeholders = self.config.variables.clone();
        placeholders.insert(
            PLACEHOLDER_SOURCE_PATH.to_string(),
            codebase.to_string_lossy().into_owned(),
        );
        placeholders.insert(
            PLACEHOLDER_OUTPUT_PATH.to_string(),
            codebase::index_dir(codebase).to_string_lossy().into_owned(),
        );
        placeholders
    }

    pub fn detect_language_and_tool(&self, codebase: &Path) -> Result<(IndexTool, Option<BuildTool>)> {
        let language = codebase::infer_language(self.store.as_ref(), codebase)?;
        match language {
            Some(lang) => self.detect_tool_for_language(lang.as_str(), codebase),
            None => {
                warn!(codebase = %codebase.display(), "could not infer codebase language");
                Err(ShenmaError::Detection(NO_MATCH.into()))
            }
        }
    }

    /// Picks the index tool of `language` and the highest-priority build tool
    /// with a detection file present at the codebase root.
    pub fn detect_tool_for_language(
        &self,
        language: &str,
        codebase: &Path,
    ) -> Result<(IndexTool, Option<BuildTool>)> {
        let lang = self
            .config
            .language(language)
            .ok_or_else(|| ShenmaError::Detection(NO_MATCH.into()))?;
        let index = lang
            .index
            .clone()
            .ok_or_else(|| ShenmaError::Config(format!("index is required for language {language}")))?;

        if lang.build_tools.is_empty() {
            return Ok((index, None));
        }

        let mut tools: Vec<&BuildTool> = lang.build_tools.iter().collect();
        tools.sort_by_key(|t| t.priority);
        for tool in tools {
            for file in &tool.detection_files {
                if self.store.exists(codebase, file)? {
                    return Ok((index, Some(tool.clone())));
                }
            }
        }

        warn!(
            codebase = %codebase.display(),
            language,
            "no configured build tool matched the codebase"
        );
        Err(ShenmaError::Detection(NO_MATCH.into()))
    }
}
