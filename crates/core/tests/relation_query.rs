mod common;

use std::collections::HashSet;
use std::fs;

use common::*;
use shenma_api::models::{DefinitionQuery, RelationQuery, StructureQuery};
use shenma_api::{GraphService, IndexService};
use shenma_core::CodegraphService;
use shenma_core::config::CodegraphConfig;
use tempfile::{TempDir, tempdir};

/// `a.go` defines Foo and calls Bar; `b.go` defines Bar and calls Foo.
/// Every definition/reference pair is a two-node cycle.
fn cyclic_codebase() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("a.go"),
        "package app\n\nfunc Foo() {\n\tBar()\n}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("b.go"),
        "package app\n\nfunc Bar() {\n\tFoo()\n}\n",
    )
    .unwrap();
    let bytes = index_bytes(vec![
        document(
            "a.go",
            vec![definition(FOO, &[2, 5, 8]), reference(BAR, &[3, 1, 4])],
        ),
        document(
            "b.go",
            vec![definition(BAR, &[2, 5, 8]), reference(FOO, &[3, 1, 4])],
        ),
    ]);
    write_index(dir.path(), &bytes);
    dir
}

fn service() -> CodegraphService {
    CodegraphService::new(CodegraphConfig::default())
}

fn query(dir: &TempDir, max_layer: usize) -> RelationQuery {
    RelationQuery {
        codebase_path: dir.path().to_string_lossy().into_owned(),
        file_path: "a.go".into(),
        start_line: 3,
        start_column: 6,
        max_layer,
        ..Default::default()
    }
}

#[tokio::test]
async fn cyclic_graph_terminates_with_unique_locations() {
    let dir = cyclic_codebase();
    let svc = service();
    svc.parse_existing(&dir.path().to_string_lossy(), None)
        .await
        .unwrap();

    let mut previous: HashSet<(String, usize, usize)> = HashSet::new();
    for max_layer in 1..=6 {
        let roots = svc.query_relations(&query(&dir, max_layer)).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].symbol_name, "Foo");
        assert!(roots[0].depth() <= max_layer);

        let mut seen = HashSet::new();
        for node in roots[0].walk() {
            let key = (
                node.file_path.clone(),
                node.position.start_line,
                node.position.start_column,
            );
            assert!(seen.insert(key), "location visited twice");
        }
        assert!(previous.is_subset(&seen));
        previous = seen;
    }
    // the reference's definition edge leads back to the root
    assert_eq!(previous.len(), 2);
}

#[tokio::test]
async fn content_is_read_from_the_codebase() {
    let dir = cyclic_codebase();
    let svc = service();
    svc.parse_existing(&dir.path().to_string_lossy(), None)
        .await
        .unwrap();

    let mut q = query(&dir, 1);
    q.include_content = true;
    let roots = svc.query_relations(&q).await.unwrap();
    assert_eq!(roots[0].content.as_deref(), Some("Foo"));
    assert_eq!(roots[0].children[0].file_path, "b.go");
    assert_eq!(roots[0].children[0].content.as_deref(), Some("Foo"));
}

#[tokio::test]
async fn definitions_resolve_calls_in_a_line_span() {
    let dir = cyclic_codebase();
    let svc = service();
    let codebase = dir.path().to_string_lossy().into_owned();
    svc.parse_existing(&codebase, None).await.unwrap();

    // body of Foo in a.go calls Bar
    let defs = svc
        .query_definitions(&DefinitionQuery {
            codebase_path: codebase.clone(),
            file_path: "a.go".into(),
            start_line: 3,
            end_line: 5,
            include_content: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let found: Vec<(&str, &str)> = defs
        .iter()
        .map(|d| (d.file_path.as_str(), d.name.as_str()))
        .collect();
    assert_eq!(found, vec![("a.go", "Foo"), ("b.go", "Bar")]);
    assert_eq!(defs[1].position.start_line, 3);
    assert_eq!(defs[1].content.as_deref(), Some("Bar"));

    let by_name = svc
        .query_definitions(&DefinitionQuery {
            codebase_path: codebase,
            file_path: "b.go".into(),
            symbol_names: vec!["Foo".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].file_path, "a.go");
}

#[tokio::test]
async fn structure_returns_every_symbol_with_content() {
    let dir = cyclic_codebase();
    let svc = service();
    let codebase = dir.path().to_string_lossy().into_owned();
    svc.parse_existing(&codebase, None).await.unwrap();

    let items = svc
        .query_structure(&StructureQuery {
            codebase_path: codebase.clone(),
            file_path: "b.go".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    for item in &items {
        assert!(!item.name.is_empty());
        assert!(!item.item_type.is_empty());
        assert!(item.position.end_line >= item.position.start_line);
        assert_eq!(item.content.as_deref(), Some(item.name.as_str()));
    }

    let summary = svc.summary(&codebase).await.unwrap();
    assert_eq!(summary.document_count, 2);
    assert_eq!(summary.symbol_name_count, 2);

    svc.clear_index(&codebase).await.unwrap();
    let err = svc
        .query_structure(&StructureQuery {
            codebase_path: codebase,
            file_path: "b.go".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
