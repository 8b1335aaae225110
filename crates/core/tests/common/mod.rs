#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use protobuf::{Enum, Message};
use scip::types::{Document, Index, Occurrence, Relationship, SymbolInformation, SymbolRole};
use shenma_core::codebase::{INDEX_DIR, SCIP_FILE_NAME};

pub const FOO: &str = "scip-go gomod example.com/app v1 `example.com/app`/Foo().";
pub const BAR: &str = "scip-go gomod example.com/app v1 `example.com/app`/Bar().";
pub const RUNNER: &str = "scip-go gomod example.com/app v1 `example.com/app`/Runner#";
pub const PRINTLN: &str = "scip-go gomod github.com/golang/go/src go1.22 fmt/Println().";
pub const WORKER: &str = "scip-go gomod example.com/app v1 `example.com/app`/Worker#";

pub fn definition(symbol: &str, range: &[i32]) -> Occurrence {
    let mut occ = reference(symbol, range);
    occ.symbol_roles = SymbolRole::Definition.value();
    occ
}

pub fn reference(symbol: &str, range: &[i32]) -> Occurrence {
    let mut occ = Occurrence::new();
    occ.symbol = symbol.to_string();
    occ.range = range.to_vec();
    occ
}

pub fn implements(symbol: &str, target: &str) -> SymbolInformation {
    let mut rel = Relationship::new();
    rel.symbol = target.to_string();
    rel.is_implementation = true;
    let mut info = SymbolInformation::new();
    info.symbol = symbol.to_string();
    info.relationships = vec![rel];
    info
}

pub fn document(path: &str, occurrences: Vec<Occurrence>) -> Document {
    let mut doc = Document::new();
    doc.relative_path = path.to_string();
    doc.occurrences = occurrences;
    doc
}

pub fn index_bytes(documents: Vec<Document>) -> Vec<u8> {
    index_bytes_with_externals(documents, Vec::new())
}

pub fn index_bytes_with_externals(
    documents: Vec<Document>,
    externals: Vec<SymbolInformation>,
) -> Vec<u8> {
    let mut index = Index::new();
    index.documents = documents;
    index.external_symbols = externals;
    index.write_to_bytes().expect("encode scip index")
}

/// Writes `<codebase>/.shenma/index.scip`.
pub fn write_index(codebase: &Path, bytes: &[u8]) -> PathBuf {
    let dir = codebase.join(INDEX_DIR);
    fs::create_dir_all(&dir).expect("create index dir");
    let path = dir.join(SCIP_FILE_NAME);
    fs::write(&path, bytes).expect("write scip file");
    path
}

/// `a.go` defines Foo; `b.go` references Foo once.
pub fn two_file_index() -> Vec<u8> {
    index_bytes(vec![
        document("a.go", vec![definition(FOO, &[1, 5, 8])]),
        document("b.go", vec![reference(FOO, &[3, 4, 7])]),
    ])
}

pub const A_GO: &str = "package app\n\nfunc Foo() {}\n";
pub const B_GO: &str = "package app\n\nfunc main() {\n\tFoo()\n}\n";
