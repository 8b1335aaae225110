//! Key layout of the graph store. Keys share one ordered keyspace, so every
//! prefix below is also a contiguous key range.

use shenma_api::models::util::to_unix_path;

pub const DOC_PREFIX: &str = "doc:";
pub const SYMBOL_INDEX_PREFIX: &str = "sym_index:";

pub fn doc_key(path: &str) -> String {
    format!("{DOC_PREFIX}{}", to_unix_path(path))
}

/// Relative path encoded in a document key.
pub fn path_from_doc_key(key: &str) -> Option<&str> {
    key.strip_prefix(DOC_PREFIX)
}

pub fn symbol_index_key(name: &str) -> String {
    format!("{SYMBOL_INDEX_PREFIX}{name}")
}

/// Key prefix of the documents under a directory. An empty dir covers all documents.
pub fn doc_dir_prefix(dir: &str) -> String {
    let dir = to_unix_path(dir);
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        DOC_PREFIX.to_string()
    } else {
        format!("{DOC_PREFIX}{dir}/")
    }
}

/// Smallest key greater than every key starting with `prefix`.
pub fn prefix_upper_bound(prefix: &str) -> String {
    let mut upper = prefix.to_string();
    upper.push(char::MAX);
    upper
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keys_use_unix_paths() {
        assert_eq!(doc_key("pkg\\a.go"), "doc:pkg/a.go");
        assert_eq!(doc_key("./pkg/a.go"), "doc:pkg/a.go");
        assert_eq!(path_from_doc_key("doc:pkg/a.go"), Some("pkg/a.go"));
        assert_eq!(symbol_index_key("Foo"), "sym_index:Foo");
    }

    #[test]
    fn directory_prefixes_bound_a_range() {
        let prefix = doc_dir_prefix("pkg/");
        assert_eq!(prefix, "doc:pkg/");
        let upper = prefix_upper_bound(&prefix);
        assert!(doc_key("pkg/z/deep.go") < upper);
        assert!(doc_key("pkg/z/deep.go") >= prefix);
        assert!(doc_key("pkg2/a.go") >= upper);
        assert_eq!(doc_dir_prefix(""), "doc:");
    }
}
