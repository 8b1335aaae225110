//! Persistent graph of documents plus the symbol-name index.

pub mod codec;
pub mod keys;
mod sqlite;

use std::collections::HashMap;

use shenma_api::models::{Document, GraphSummary, KeyRange, KeySet};

use crate::error::Result;

pub use sqlite::{DB_FILE_NAME, SqliteGraphStore};

/// Name search returns at most this many locations per name.
pub const KEEP_RESULTS_PER_NAME: usize = 2;

pub trait GraphStore: Send + Sync {
    /// Upserts documents keyed by path. Empty input is a no-op.
    fn batch_write(&self, documents: &[Document]) -> Result<()>;

    /// Appends key ranges to the stored key set of each name.
    fn batch_write_def_symbol_keys_map(&self, keys: &HashMap<String, KeySet>) -> Result<()>;

    /// Drops every stored key and writes `documents` plus a fresh name index
    /// in one transaction. Used by full rebuilds.
    fn replace_all(&self, documents: &[Document], keys: &HashMap<String, KeySet>) -> Result<()>;

    fn get_document(&self, path: &str) -> Result<Option<Document>>;

    fn get_document_by_key(&self, doc_key: &str) -> Result<Option<Document>>;

    fn get_key_set(&self, name: &str) -> Result<Option<KeySet>>;

    /// Up to [`KEEP_RESULTS_PER_NAME`] definition locations per requested name.
    fn search_symbol_names(&self, names: &[String]) -> Result<HashMap<String, Vec<KeyRange>>>;

    /// Documents under a directory, ordered by path.
    fn documents_under(&self, dir: &str) -> Result<Vec<Document>>;

    /// Removes documents and their definitions from the name index.
    /// Returns how many documents existed.
    fn delete_documents(&self, paths: &[String]) -> Result<usize>;

    fn delete_all(&self) -> Result<()>;

    fn summary(&self) -> Result<GraphSummary>;

    /// Releases the underlying handle. Later calls are no-ops.
    fn close(&self) -> Result<()>;
}
