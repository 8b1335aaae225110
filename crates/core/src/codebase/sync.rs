use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use shenma_api::models::{FileOp, SyncMetadata, util::to_unix_path};
use tracing::warn;

use crate::error::{Result, ShenmaError};

/// Merges every metadata file in `dir`, in file-name order, into one
/// `path -> op` map. Later files override earlier entries for a path.
pub fn collapse_sync_metadata(dir: &Path) -> Result<BTreeMap<String, FileOp>> {
    if !dir.is_dir() {
        return Err(ShenmaError::NotFound(format!(
            "sync metadata dir {} does not exist",
            dir.display()
        )));
    }

    let mut names: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    if names.is_empty() {
        return Err(ShenmaError::NotFound(format!(
            "sync metadata dir {} is empty",
            dir.display()
        )));
    }
    // timestamps of equal width sort lexically; shorter ones are older
    names.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut collapsed = BTreeMap::new();
    for name in names {
        let raw = fs::read_to_string(dir.join(&name))?;
        let metadata: SyncMetadata = match serde_json::from_str(&raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(file = %name, "skipping malformed sync metadata: {e}");
                continue;
            }
        };
        for (path, op) in metadata.file_list {
            collapsed.insert(to_unix_path(&path), op);
        }
    }
    Ok(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn later_metadata_overrides_earlier() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("1700000000"),
            r#"{"clientId":"c","codebasePath":"/r","fileList":{"a.go":"add","b.go":"add"},"timestamp":1700000000}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("1700000100"),
            r#"{"clientId":"c","codebasePath":"/r","fileList":{"a.go":"delete"},"timestamp":1700000100}"#,
        )
        .unwrap();
        fs::write(dir.path().join("1700000050"), "not json").unwrap();

        let list = collapse_sync_metadata(dir.path()).unwrap();
        assert_eq!(list["a.go"], FileOp::Delete);
        assert_eq!(list["b.go"], FileOp::Add);
    }

    #[test]
    fn missing_dir_is_not_found() {
        let dir = tempdir().unwrap();
        let err = collapse_sync_metadata(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ShenmaError::NotFound(_)));
    }
}
