use crate::ApiResult;
use crate::models::{
    DefinitionNode, DefinitionQuery, GraphNode, GraphSummary, RelationQuery, StructureItem,
    StructureQuery,
};
use async_trait::async_trait;

/// Read side of the code graph.
#[async_trait]
pub trait GraphService: Send + Sync {
    /// Bounded-depth relation trees rooted at the symbols matching the query.
    async fn query_relations(&self, query: &RelationQuery) -> ApiResult<Vec<GraphNode>>;

    /// Flat outline of one indexed file.
    async fn query_structure(&self, query: &StructureQuery) -> ApiResult<Vec<StructureItem>>;

    /// Definitions of the symbols used in a line span, or of named symbols.
    async fn query_definitions(&self, query: &DefinitionQuery) -> ApiResult<Vec<DefinitionNode>>;

    async fn summary(&self, codebase_path: &str) -> ApiResult<GraphSummary>;
}
