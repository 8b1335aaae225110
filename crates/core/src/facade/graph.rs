use super::{CodegraphService, codebase_path};
use crate::processor::with_existing_store;
use crate::query::{CodebaseContent, QueryEngine};
use async_trait::async_trait;
use shenma_api::models::{
    DefinitionNode, DefinitionQuery, GraphNode, GraphSummary, RelationQuery, StructureItem,
    StructureQuery,
};
use shenma_api::{ApiResult, GraphService};

#[async_trait]
impl GraphService for CodegraphService {
    async fn query_relations(&self, query: &RelationQuery) -> ApiResult<Vec<GraphNode>> {
        query.validate()?;
        let root = codebase_path(&query.codebase_path)?;
        let query = query.clone();

        self.blocking(move |_, files| {
            with_existing_store(&root, |store| {
                let content = CodebaseContent::new(files.clone(), &root);
                QueryEngine::new(store)
                    .with_content(&content)
                    .relations(&query)
            })
        })
        .await
    }

    async fn query_structure(&self, query: &StructureQuery) -> ApiResult<Vec<StructureItem>> {
        query.validate()?;
        let root = codebase_path(&query.codebase_path)?;
        let query = query.clone();

        self.blocking(move |_, files| {
            with_existing_store(&root, |store| {
                let content = CodebaseContent::new(files.clone(), &root);
                QueryEngine::new(store)
                    .with_content(&content)
                    .structure(&query)
            })
        })
        .await
    }

    async fn query_definitions(&self, query: &DefinitionQuery) -> ApiResult<Vec<DefinitionNode>> {
        query.validate()?;
        let root = codebase_path(&query.codebase_path)?;
        let query = query.clone();

        self.blocking(move |_, files| {
            with_existing_store(&root, |store| {
                let content = CodebaseContent::new(files.clone(), &root);
                QueryEngine::new(store)
                    .with_content(&content)
                    .definitions(&query)
            })
        })
        .await
    }

    async fn summary(&self, codebase: &str) -> ApiResult<GraphSummary> {
        let root = codebase_path(codebase)?;
        self.blocking(move |processor, _| processor.summary(&root))
            .await
    }
}
