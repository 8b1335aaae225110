use std::path::Path;

use shenma_api::GraphService;
use shenma_api::models::{DefinitionQuery, RelationQuery, StructureItem, StructureQuery};
use shenma_core::CodegraphService;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::codebase_arg;

#[derive(Tabled)]
struct StructureRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    item_type: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
}

impl From<&StructureItem> for StructureRow {
    fn from(item: &StructureItem) -> Self {
        Self {
            name: item.name.clone(),
            item_type: item.item_type.clone(),
            start: format!("{}:{}", item.position.start_line, item.position.start_column),
            end: format!("{}:{}", item.position.end_line, item.position.end_column),
        }
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Codebase")]
    codebase: String,
    #[tabled(rename = "Documents")]
    documents: usize,
    #[tabled(rename = "Symbol names")]
    symbol_names: usize,
}

pub fn relation_query(
    path: &Path,
    file: String,
    line: usize,
    column: usize,
    name: Option<String>,
    max_layer: usize,
    content: bool,
) -> RelationQuery {
    RelationQuery {
        client_id: "cli".to_string(),
        codebase_path: codebase_arg(path),
        file_path: file,
        start_line: line,
        start_column: column,
        end_line: line,
        end_column: column,
        symbol_name: name,
        include_content: content,
        max_layer,
    }
}

pub async fn relation(service: &CodegraphService, query: RelationQuery) -> anyhow::Result<()> {
    let roots = service.query_relations(&query).await?;
    println!("{}", serde_json::to_string_pretty(&roots)?);
    Ok(())
}

pub fn definition_query(
    path: &Path,
    file: String,
    start_line: usize,
    end_line: usize,
    names: Vec<String>,
    content: bool,
) -> DefinitionQuery {
    DefinitionQuery {
        client_id: "cli".to_string(),
        codebase_path: codebase_arg(path),
        file_path: file,
        start_line,
        end_line,
        symbol_names: names,
        include_content: content,
    }
}

pub async fn definition(service: &CodegraphService, query: DefinitionQuery) -> anyhow::Result<()> {
    let defs = service.query_definitions(&query).await?;
    println!("{}", serde_json::to_string_pretty(&defs)?);
    Ok(())
}

pub async fn structure(service: &CodegraphService, path: &Path, file: String) -> anyhow::Result<()> {
    let query = StructureQuery {
        client_id: "cli".to_string(),
        codebase_path: codebase_arg(path),
        file_path: file,
    };
    let items = service.query_structure(&query).await?;
    let rows: Vec<StructureRow> = items.iter().map(StructureRow::from).collect();
    let table = Table::new(rows).with(Style::psql()).to_string();
    println!("{table}");
    Ok(())
}

pub async fn summary(service: &CodegraphService, path: &Path) -> anyhow::Result<()> {
    let codebase = codebase_arg(path);
    let summary = service.summary(&codebase).await?;
    let row = SummaryRow {
        codebase,
        documents: summary.document_count,
        symbol_names: summary.symbol_name_count,
    };
    let table = Table::new([row]).with(Style::psql()).to_string();
    println!("{table}");
    Ok(())
}
