//! Access to the files of an indexed codebase.

mod sync;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use shenma_api::models::{FileOp, Language, Range};
use std::collections::BTreeMap;

use crate::error::{Result, ShenmaError};

pub use sync::collapse_sync_metadata;

/// Reserved directory holding the SCIP file and the graph database.
pub const INDEX_DIR: &str = ".shenma";
/// Directory holding `<timestamp>` sync metadata files.
pub const SYNC_METADATA_DIR: &str = ".shenma_sync";
pub const SCIP_FILE_NAME: &str = "index.scip";

pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// File access scoped to a codebase root. Relative paths are joined onto
/// the codebase path.
pub trait CodebaseStore: Send + Sync {
    /// Absolute form of a codebase path with symlinks and `..` resolved.
    fn canonicalize(&self, codebase: &Path) -> Result<PathBuf>;

    fn exists(&self, codebase: &Path, rel: &str) -> Result<bool>;

    /// Size in bytes of a file.
    fn file_len(&self, path: &Path) -> Result<u64>;

    fn open(&self, path: &Path) -> Result<Box<dyn ReadSeek>>;

    fn read_to_string(&self, codebase: &Path, rel: &str) -> Result<String>;

    fn mkdirs(&self, path: &Path) -> Result<()>;

    /// Relative paths of every non-ignored file under the codebase.
    fn walk_files(&self, codebase: &Path) -> Result<Vec<String>>;

    /// Collapsed `path -> op` map of all sync metadata files, oldest first.
    fn sync_file_list(&self, codebase: &Path) -> Result<BTreeMap<String, FileOp>>;
}

#[derive(Debug, Clone, Default)]
pub struct LocalCodebaseStore;

impl LocalCodebaseStore {
    pub fn new() -> Self {
        Self
    }
}

impl CodebaseStore for LocalCodebaseStore {
    fn canonicalize(&self, codebase: &Path) -> Result<PathBuf> {
        if codebase.as_os_str().is_empty() {
            return Err(ShenmaError::InvalidArgument("codebase path cannot be empty".into()));
        }
        fs::canonicalize(codebase).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShenmaError::NotFound(format!(
                "codebase path {} does not exist",
                codebase.display()
            )),
            _ => ShenmaError::Io(e),
        })
    }

    fn exists(&self, codebase: &Path, rel: &str) -> Result<bool> {
        if codebase.as_os_str().is_empty() {
            return Err(ShenmaError::InvalidArgument("codebase path cannot be empty".into()));
        }
        Ok(codebase.join(rel).try_exists()?)
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(File::open(path)?))
    }

    fn read_to_string(&self, codebase: &Path, rel: &str) -> Result<String> {
        Ok(fs::read_to_string(codebase.join(rel))?)
    }

    fn mkdirs(&self, path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(path)?)
    }

    fn walk_files(&self, codebase: &Path) -> Result<Vec<String>> {
        if !codebase.is_dir() {
            return Err(ShenmaError::NotFound(format!(
                "codebase path {} does not exist",
                codebase.display()
            )));
        }
        let walker = WalkBuilder::new(codebase)
            .filter_entry(|entry| {
                !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(INDEX_DIR))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(codebase) {
                files.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(files)
    }

    fn sync_file_list(&self, codebase: &Path) -> Result<BTreeMap<String, FileOp>> {
        collapse_sync_metadata(&codebase.join(SYNC_METADATA_DIR))
    }
}

pub fn index_dir(codebase: &Path) -> PathBuf {
    codebase.join(INDEX_DIR)
}

pub fn scip_file_path(codebase: &Path) -> PathBuf {
    index_dir(codebase).join(SCIP_FILE_NAME)
}

/// Most frequent source language under the codebase, by file extension.
/// Ties resolve to the alphabetically first language name.
pub fn infer_language(store: &dyn CodebaseStore, codebase: &Path) -> Result<Option<Language>> {
    let mut counts: HashMap<Language, usize> = HashMap::new();
    for file in store.walk_files(codebase)? {
        let Some(ext) = Path::new(&file).extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if let Some(lang) = Language::from_extension(ext) {
            *counts.entry(lang).or_default() += 1;
        }
    }
    Ok(counts
        .into_iter()
        .max_by(|(la, ca), (lb, cb)| ca.cmp(cb).then_with(|| lb.as_str().cmp(la.as_str())))
        .map(|(lang, _)| lang))
}

/// Literal source text covered by `range`, with columns counted in chars.
pub fn slice_range(source: &str, range: &Range) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    if range.start_line >= lines.len() || range.end_line < range.start_line {
        return None;
    }
    let last = range.end_line.min(lines.len() - 1);
    let mut out = String::new();
    for (idx, line) in lines[range.start_line..=last].iter().enumerate() {
        let line_no = range.start_line + idx;
        let start = if line_no == range.start_line { range.start_col } else { 0 };
        let text: String = if line_no == range.end_line {
            line.chars()
                .take(range.end_col)
                .skip(start)
                .collect()
        } else {
            line.chars().skip(start).collect()
        };
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&text);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn infers_dominant_language_and_skips_index_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("main.go"), "package main").unwrap();
        fs::write(root.join("util.go"), "package main").unwrap();
        fs::write(root.join("script.py"), "print()").unwrap();
        fs::create_dir_all(root.join(".shenma")).unwrap();
        for i in 0..5 {
            fs::write(root.join(format!(".shenma/gen{i}.py")), "").unwrap();
        }

        let store = LocalCodebaseStore::new();
        let lang = infer_language(&store, root).unwrap();
        assert_eq!(lang, Some(Language::GO));
    }

    #[test]
    fn empty_codebase_has_no_language() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# hi").unwrap();
        let store = LocalCodebaseStore::new();
        assert_eq!(infer_language(&store, dir.path()).unwrap(), None);
    }

    #[test]
    fn slice_range_cuts_columns() {
        let src = "package a\n\nfunc Foo() {\n\treturn\n}\n";
        assert_eq!(
            slice_range(src, &Range::new(2, 5, 2, 8)).as_deref(),
            Some("Foo")
        );
        assert_eq!(
            slice_range(src, &Range::new(2, 0, 4, 1)).as_deref(),
            Some("func Foo() {\n\treturn\n}")
        );
        assert_eq!(slice_range(src, &Range::new(10, 0, 10, 1)), None);
    }
}
