use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use shenma_api::models::{Document, GraphSummary, KeyRange, KeySet};
use tracing::{debug, warn};

use super::{GraphStore, KEEP_RESULTS_PER_NAME, codec, keys};
use crate::error::{Result, ShenmaError};

pub const DB_FILE_NAME: &str = "codegraph.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv (
        key   TEXT PRIMARY KEY,
        value BLOB NOT NULL
    ) WITHOUT ROWID;
";

const OPEN_ATTEMPTS: u32 = 5;
const OPEN_BACKOFF: Duration = Duration::from_millis(200);

const UPSERT: &str =
    "INSERT INTO kv (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value";

/// Ordered key-value table in one SQLite file per codebase.
pub struct SqliteGraphStore {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteGraphStore {
    /// Opens `<index_dir>/codegraph.db`, retrying while the file is locked.
    pub fn open(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let path = index_dir.join(DB_FILE_NAME);

        let mut attempt = 1;
        loop {
            match Self::open_connection(&path) {
                Ok(conn) => {
                    debug!(path = %path.display(), "graph store opened");
                    return Ok(Self {
                        conn: Mutex::new(Some(conn)),
                        path: Some(path),
                    });
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::DatabaseBusy && attempt < OPEN_ATTEMPTS =>
                {
                    warn!(path = %path.display(), attempt, "graph store locked, retrying");
                    thread::sleep(OPEN_BACKOFF * attempt);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ShenmaError::Storage(format!(
                        "open graph store {}: {e}",
                        path.display()
                    )));
                }
            }
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }

    fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ShenmaError::Storage("graph store lock poisoned".into()))?;
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(ShenmaError::Storage("store closed".into())),
        }
    }

    fn get_raw(conn: &Connection, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    fn scan_prefix(conn: &Connection, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let upper = keys::prefix_upper_bound(prefix);
        let mut stmt =
            conn.prepare_cached("SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix, upper], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn count_prefix(conn: &Connection, prefix: &str) -> Result<usize> {
        let upper = keys::prefix_upper_bound(prefix);
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv WHERE key >= ?1 AND key < ?2",
            params![prefix, upper],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl GraphStore for SqliteGraphStore {
    fn batch_write(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(UPSERT)?;
                for doc in documents {
                    stmt.execute(params![keys::doc_key(&doc.path), codec::encode(doc)?])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn batch_write_def_symbol_keys_map(&self, key_sets: &HashMap<String, KeySet>) -> Result<()> {
        if key_sets.is_empty() {
            return Ok(());
        }
        let mut names: Vec<&String> = key_sets.keys().collect();
        names.sort();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(UPSERT)?;
                for name in names {
                    let key = keys::symbol_index_key(name);
                    let mut merged = match Self::get_raw(&tx, &key)? {
                        Some(raw) => codec::decode::<KeySet>(&raw)?,
                        None => KeySet::default(),
                    };
                    merged.merge(key_sets[name].clone());
                    stmt.execute(params![key, codec::encode(&merged)?])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn replace_all(&self, documents: &[Document], key_sets: &HashMap<String, KeySet>) -> Result<()> {
        let mut names: Vec<&String> = key_sets.keys().collect();
        names.sort();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM kv", [])?;
            {
                let mut stmt = tx.prepare_cached(UPSERT)?;
                for doc in documents {
                    stmt.execute(params![keys::doc_key(&doc.path), codec::encode(doc)?])?;
                }
                for name in names {
                    stmt.execute(params![
                        keys::symbol_index_key(name),
                        codec::encode(&key_sets[name])?
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn get_document(&self, path: &str) -> Result<Option<Document>> {
        self.get_document_by_key(&keys::doc_key(path))
    }

    fn get_document_by_key(&self, doc_key: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            Self::get_raw(conn, doc_key)?
                .map(|raw| codec::decode(&raw))
                .transpose()
        })
    }

    fn get_key_set(&self, name: &str) -> Result<Option<KeySet>> {
        self.with_conn(|conn| {
            Self::get_raw(conn, &keys::symbol_index_key(name))?
                .map(|raw| codec::decode(&raw))
                .transpose()
        })
    }

    fn search_symbol_names(&self, names: &[String]) -> Result<HashMap<String, Vec<KeyRange>>> {
        let mut found = HashMap::new();
        for name in names {
            if found.contains_key(name) {
                continue;
            }
            if let Some(set) = self.get_key_set(name)? {
                let kept: Vec<KeyRange> = set.keys.into_iter().take(KEEP_RESULTS_PER_NAME).collect();
                if !kept.is_empty() {
                    found.insert(name.clone(), kept);
                }
            }
        }
        Ok(found)
    }

    fn documents_under(&self, dir: &str) -> Result<Vec<Document>> {
        let prefix = keys::doc_dir_prefix(dir);
        self.with_conn(|conn| {
            Self::scan_prefix(conn, &prefix)?
                .into_iter()
                .map(|(_, raw)| codec::decode(&raw))
                .collect()
        })
    }

    fn delete_documents(&self, paths: &[String]) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0;
            let mut stale: HashMap<String, HashSet<String>> = HashMap::new();
            for path in paths {
                let key = keys::doc_key(path);
                let Some(raw) = Self::get_raw(&tx, &key)? else {
                    continue;
                };
                let doc: Document = codec::decode(&raw)?;
                for symbol in doc.symbols.iter().filter(|s| s.is_definition()) {
                    stale.entry(symbol.name.clone()).or_default().insert(key.clone());
                }
                tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                deleted += 1;
            }

            for (name, doc_keys) in stale {
                let key = keys::symbol_index_key(&name);
                let Some(raw) = Self::get_raw(&tx, &key)? else {
                    continue;
                };
                let mut set: KeySet = codec::decode(&raw)?;
                set.keys.retain(|k| !doc_keys.contains(&k.doc_key));
                if set.is_empty() {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                } else {
                    tx.execute(UPSERT, params![key, codec::encode(&set)?])?;
                }
            }
            tx.commit()?;
            Ok(deleted)
        })
    }

    fn delete_all(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv", [])?;
            Ok(())
        })
    }

    fn summary(&self) -> Result<GraphSummary> {
        self.with_conn(|conn| {
            Ok(GraphSummary {
                document_count: Self::count_prefix(conn, keys::DOC_PREFIX)?,
                symbol_name_count: Self::count_prefix(conn, keys::SYMBOL_INDEX_PREFIX)?,
            })
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| ShenmaError::Storage("graph store lock poisoned".into()))?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| ShenmaError::Storage(format!("close graph store: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shenma_api::models::{Range, RelationType, Symbol, SymbolKind};
    use tempfile::tempdir;

    fn definition(name: &str, path: &str, line: usize) -> Symbol {
        Symbol {
            identifier: format!("s {name}."),
            name: name.into(),
            namespace: String::new(),
            kind: SymbolKind::Term,
            path: path.into(),
            range: Range::new(line, 0, line, name.len()),
            role: RelationType::Definition,
            relations: vec![],
        }
    }

    fn key_set(path: &str, line: usize) -> KeySet {
        KeySet {
            keys: vec![KeyRange {
                doc_key: keys::doc_key(path),
                range: Range::new(line, 0, line, 3),
            }],
        }
    }

    #[test]
    fn documents_round_trip_and_scan_by_directory() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.batch_write(&[]).unwrap();
        let docs: Vec<Document> = ["pkg/b.go", "pkg/a.go", "pkg2/c.go", "main.go"]
            .iter()
            .map(|p| Document {
                path: p.to_string(),
                symbols: vec![definition("Foo", p, 1)],
            })
            .collect();
        store.batch_write(&docs).unwrap();

        assert_eq!(store.get_document("pkg/a.go").unwrap().unwrap(), docs[1]);
        assert!(store.get_document("missing.go").unwrap().is_none());

        let under: Vec<String> = store
            .documents_under("pkg")
            .unwrap()
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(under, vec!["pkg/a.go", "pkg/b.go"]);
        assert_eq!(store.documents_under("").unwrap().len(), 4);
    }

    #[test]
    fn key_sets_accumulate_across_writes() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let mut first = HashMap::new();
        first.insert("Foo".to_string(), key_set("a.go", 1));
        store.batch_write_def_symbol_keys_map(&first).unwrap();

        let mut second = HashMap::new();
        second.insert("Foo".to_string(), key_set("b.go", 4));
        store.batch_write_def_symbol_keys_map(&second).unwrap();
        store.batch_write_def_symbol_keys_map(&second).unwrap();

        let set = store.get_key_set("Foo").unwrap().unwrap();
        assert_eq!(set.len(), 2);
        assert!(store.get_key_set("Bar").unwrap().is_none());
    }

    #[test]
    fn replace_all_forgets_the_previous_graph() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let old = vec![
            Document {
                path: "a.go".into(),
                symbols: vec![definition("Foo", "a.go", 1)],
            },
            Document {
                path: "b.go".into(),
                symbols: vec![definition("Bar", "b.go", 2)],
            },
        ];
        store.batch_write(&old).unwrap();
        store
            .batch_write_def_symbol_keys_map(&crate::scip::build_symbol_keys(&old))
            .unwrap();

        let new = vec![Document {
            path: "a.go".into(),
            symbols: vec![definition("Foo", "a.go", 6)],
        }];
        store
            .replace_all(&new, &crate::scip::build_symbol_keys(&new))
            .unwrap();

        assert!(store.get_document("b.go").unwrap().is_none());
        assert!(store.get_key_set("Bar").unwrap().is_none());
        let foo = store.get_key_set("Foo").unwrap().unwrap();
        assert_eq!(foo.len(), 1);
        assert_eq!(foo.keys[0].range.start_line, 6);
        assert_eq!(
            store.summary().unwrap(),
            GraphSummary {
                document_count: 1,
                symbol_name_count: 1,
            }
        );
    }

    #[test]
    fn name_search_keeps_two_results() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let mut set = key_set("a.go", 1);
        set.merge(key_set("b.go", 2));
        set.merge(key_set("c.go", 3));
        let mut map = HashMap::new();
        map.insert("Foo".to_string(), set);
        store.batch_write_def_symbol_keys_map(&map).unwrap();

        let found = store
            .search_symbol_names(&["Foo".to_string(), "Nope".to_string()])
            .unwrap();
        assert_eq!(found["Foo"].len(), KEEP_RESULTS_PER_NAME);
        assert!(!found.contains_key("Nope"));
    }

    #[test]
    fn deleting_documents_prunes_name_index() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let a = Document {
            path: "a.go".into(),
            symbols: vec![definition("Foo", "a.go", 1)],
        };
        let b = Document {
            path: "b.go".into(),
            symbols: vec![definition("Foo", "b.go", 4), definition("Bar", "b.go", 6)],
        };
        store.batch_write(&[a.clone(), b.clone()]).unwrap();
        let keys = crate::scip::build_symbol_keys(&[a, b]);
        store.batch_write_def_symbol_keys_map(&keys).unwrap();

        let removed = store
            .delete_documents(&["b.go".to_string(), "gone.go".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_document("b.go").unwrap().is_none());
        assert_eq!(store.get_key_set("Foo").unwrap().unwrap().len(), 1);
        assert!(store.get_key_set("Bar").unwrap().is_none());

        let summary = store.summary().unwrap();
        assert_eq!(summary.document_count, 1);
        assert_eq!(summary.symbol_name_count, 1);

        store.delete_all().unwrap();
        assert_eq!(store.summary().unwrap(), GraphSummary::default());
    }

    #[test]
    fn close_is_idempotent_and_reopen_sees_data() {
        let dir = tempdir().unwrap();
        let store = SqliteGraphStore::open(dir.path()).unwrap();
        store
            .batch_write(&[Document {
                path: "a.go".into(),
                symbols: vec![],
            }])
            .unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(store.get_document("a.go"), Err(ShenmaError::Storage(_))));

        let reopened = SqliteGraphStore::open(dir.path()).unwrap();
        assert!(reopened.get_document("a.go").unwrap().is_some());
        assert_eq!(reopened.path(), Some(dir.path().join(DB_FILE_NAME).as_path()));
    }
}
