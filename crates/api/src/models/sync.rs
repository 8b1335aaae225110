use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Add,
    Modify,
    Delete,
}

/// Content of one `.shenma_sync/<timestamp>` file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncMetadata {
    pub client_id: String,
    pub codebase_path: String,
    pub extra_metadata: serde_json::Value,
    pub file_list: BTreeMap<String, FileOp>,
    pub timestamp: i64,
}

/// Work item consumed by the index scheduler.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    pub sync_id: String,
    pub codebase_path: String,
    #[serde(default)]
    pub file_list: BTreeMap<String, FileOp>,
}

impl SyncMessage {
    pub fn deleted_paths(&self) -> Vec<String> {
        self.file_list
            .iter()
            .filter(|(_, op)| **op == FileOp::Delete)
            .map(|(path, _)| path.clone())
            .collect()
    }
}
