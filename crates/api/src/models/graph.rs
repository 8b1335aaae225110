use super::symbol::{Position, RelationType};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Definition,
    Reference,
    Implementation,
    TypeDefinition,
}

impl From<RelationType> for NodeType {
    fn from(value: RelationType) -> Self {
        match value {
            RelationType::Definition => NodeType::Definition,
            RelationType::Reference => NodeType::Reference,
            RelationType::Implementation => NodeType::Implementation,
            RelationType::TypeDefinition => NodeType::TypeDefinition,
        }
    }
}

/// Node of a relation tree. Children are the targets of this node's edges.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub file_path: String,
    pub symbol_name: String,
    pub identifier: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GraphNode>,
}

impl GraphNode {
    /// Number of edges between this node and its deepest descendant.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pre-order walk over this node and its descendants.
    pub fn walk(&self) -> Vec<&GraphNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// One entry of a file outline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructureItem {
    pub name: String,
    pub item_type: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Definition location returned by a definition query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionNode {
    pub file_path: String,
    pub name: String,
    pub identifier: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub document_count: usize,
    pub symbol_name_count: usize,
}
