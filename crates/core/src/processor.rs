use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use shenma_api::models::{FileOp, GraphSummary};
use tracing::{info, warn};

use crate::codebase::{self, CodebaseStore};
use crate::config::CodegraphConfig;
use crate::error::{Result, ShenmaError};
use crate::scip::{IndexGenerator, IndexParser, ParseReport};
use crate::store::{GraphStore, SqliteGraphStore};

/// Generate -> parse -> persist for one codebase at a time.
pub struct CodegraphProcessor {
    generator: IndexGenerator,
    parser: IndexParser,
    codebase_store: Arc<dyn CodebaseStore>,
}

impl CodegraphProcessor {
    pub fn new(config: Arc<CodegraphConfig>, codebase_store: Arc<dyn CodebaseStore>) -> Self {
        Self {
            generator: IndexGenerator::new(config, Arc::clone(&codebase_store)),
            parser: IndexParser::new(Arc::clone(&codebase_store)),
            codebase_store,
        }
    }

    pub fn generator(&self) -> &IndexGenerator {
        &self.generator
    }

    /// Full rebuild of the codebase graph.
    pub fn process(&self, codebase: &Path) -> Result<ParseReport> {
        let started = Instant::now();
        self.generator.generate(codebase)?;
        info!(
            codebase = %codebase.display(),
            elapsed_ms = started.elapsed().as_millis(),
            "generate phase done"
        );
        let report = self.parse_and_persist(codebase, None)?;
        info!(
            codebase = %codebase.display(),
            documents = report.documents,
            elapsed_ms = started.elapsed().as_millis(),
            "codegraph processed"
        );
        Ok(report)
    }

    /// Parses an existing SCIP file into the codebase store without
    /// running any index tool.
    pub fn parse_and_persist(&self, codebase: &Path, scip_path: Option<&Path>) -> Result<ParseReport> {
        with_store(codebase, |store| {
            self.parser.process_index_file(codebase, scip_path, store)
        })
    }

    /// Rebuilds the graph, then removes documents whose collapsed sync op is
    /// `delete`. Entries in `file_list` override the on-disk sync metadata.
    pub fn sync(&self, codebase: &Path, file_list: &BTreeMap<String, FileOp>) -> Result<ParseReport> {
        let mut ops = match self.codebase_store.sync_file_list(codebase) {
            Ok(ops) => ops,
            Err(ShenmaError::NotFound(msg)) => {
                info!(codebase = %codebase.display(), "no sync metadata: {msg}");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        ops.extend(file_list.iter().map(|(path, op)| (path.clone(), *op)));

        let report = self.process(codebase)?;

        let deleted: Vec<String> = ops
            .into_iter()
            .filter(|(_, op)| *op == FileOp::Delete)
            .map(|(path, _)| path)
            .collect();
        if !deleted.is_empty() {
            let removed = with_store(codebase, |store| store.delete_documents(&deleted))?;
            info!(
                codebase = %codebase.display(),
                requested = deleted.len(),
                removed,
                "deleted documents from sync batch"
            );
        }
        Ok(report)
    }

    pub fn clear(&self, codebase: &Path) -> Result<()> {
        if self.generator.is_processing(codebase) {
            return Err(ShenmaError::Concurrent(codebase.display().to_string()));
        }
        with_store(codebase, |store| store.delete_all())?;
        info!(codebase = %codebase.display(), "codegraph cleared");
        Ok(())
    }

    pub fn summary(&self, codebase: &Path) -> Result<GraphSummary> {
        with_existing_store(codebase, |store| store.summary())
    }
}

/// Opens the codebase store, runs `f`, and closes the store even when `f` fails.
pub fn with_store<T>(codebase: &Path, f: impl FnOnce(&SqliteGraphStore) -> Result<T>) -> Result<T> {
    let store = SqliteGraphStore::open(&codebase::index_dir(codebase))?;
    let result = f(&store);
    if let Err(e) = store.close() {
        warn!(codebase = %codebase.display(), "failed to close graph store: {e}");
    }
    result
}

/// Like [`with_store`], but a codebase that was never indexed is `NotFound`.
pub fn with_existing_store<T>(
    codebase: &Path,
    f: impl FnOnce(&SqliteGraphStore) -> Result<T>,
) -> Result<T> {
    let db = codebase::index_dir(codebase).join(crate::store::DB_FILE_NAME);
    if !db.is_file() {
        return Err(ShenmaError::NotFound(format!(
            "codebase {} is not indexed",
            codebase.display()
        )));
    }
    with_store(codebase, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebase::LocalCodebaseStore;
    use tempfile::tempdir;

    fn processor(yaml: &str) -> CodegraphProcessor {
        let config = CodegraphConfig::from_yaml_str(yaml).unwrap();
        CodegraphProcessor::new(Arc::new(config), Arc::new(LocalCodebaseStore::new()))
    }

    const NOOP_CONFIG: &str = r#"
languages:
  - name: go
    detection_files: ["go.mod"]
    index:
      name: noop
      commands:
        - base: sh
          args: ["-c", "true"]
"#;

    #[test]
    fn summary_of_unindexed_codebase_is_not_found() {
        let dir = tempdir().unwrap();
        let err = processor(NOOP_CONFIG).summary(dir.path()).unwrap_err();
        assert!(matches!(err, ShenmaError::NotFound(_)));
    }

    #[test]
    fn process_fails_when_tool_writes_no_index() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module x").unwrap();
        std::fs::write(dir.path().join("main.go"), "package main").unwrap();

        let p = processor(NOOP_CONFIG);
        let err = p.process(dir.path()).unwrap_err();
        assert!(matches!(err, ShenmaError::Parse(msg) if msg.contains("does not exist")));
        assert!(!p.generator().is_processing(dir.path()));
    }

    #[test]
    fn clear_empties_the_store() {
        let dir = tempdir().unwrap();
        with_store(dir.path(), |store| {
            store.batch_write(&[shenma_api::models::Document {
                path: "a.go".into(),
                symbols: vec![],
            }])
        })
        .unwrap();
        let p = processor(NOOP_CONFIG);
        assert_eq!(p.summary(dir.path()).unwrap().document_count, 1);

        p.clear(dir.path()).unwrap();
        assert_eq!(p.summary(dir.path()).unwrap().document_count, 0);
    }
}
