use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use shenma_api::models::Range;
use tracing::debug;

use crate::codebase::{CodebaseStore, slice_range};

/// Source text lookup used to hydrate query results.
pub trait ContentSource: Send + Sync {
    fn read_range(&self, path: &str, range: &Range) -> Option<String>;
}

/// Reads files of one codebase, caching each file for the lifetime of the source.
pub struct CodebaseContent {
    store: Arc<dyn CodebaseStore>,
    root: PathBuf,
    files: Mutex<HashMap<String, Option<Arc<str>>>>,
}

impl CodebaseContent {
    pub fn new(store: Arc<dyn CodebaseStore>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    fn file(&self, path: &str) -> Option<Arc<str>> {
        let mut files = self.files.lock().ok()?;
        if let Some(cached) = files.get(path) {
            return cached.clone();
        }
        let loaded = match self.store.read_to_string(&self.root, path) {
            Ok(text) => Some(Arc::<str>::from(text)),
            Err(e) => {
                debug!(path, "no content for path: {e}");
                None
            }
        };
        files.insert(path.to_string(), loaded.clone());
        loaded
    }
}

impl ContentSource for CodebaseContent {
    fn read_range(&self, path: &str, range: &Range) -> Option<String> {
        let text = self.file(path)?;
        slice_range(&text, range)
    }
}
