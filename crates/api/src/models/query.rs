use super::util::serde_flag;
use crate::error::{ApiError, ApiResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Relation query. Lines and columns are one-based; zero means "not given".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationQuery {
    pub client_id: String,
    pub codebase_path: String,
    pub file_path: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub symbol_name: Option<String>,
    #[serde(with = "serde_flag")]
    #[schemars(with = "u8")]
    pub include_content: bool,
    pub max_layer: usize,
}

impl RelationQuery {
    pub fn validate(&self) -> ApiResult<()> {
        if self.codebase_path.is_empty() {
            return Err(ApiError::InvalidArgument("codebasePath is required".into()));
        }
        if self.file_path.is_empty() {
            return Err(ApiError::InvalidArgument("filePath is required".into()));
        }
        if self.max_layer < 1 {
            return Err(ApiError::InvalidArgument("maxLayer must be >= 1".into()));
        }
        if self.start_line == 0 && self.symbol_name.as_deref().is_none_or(str::is_empty) {
            return Err(ApiError::InvalidArgument(
                "either startLine or symbolName is required".into(),
            ));
        }
        Ok(())
    }

    /// Zero-based start position, when a line was supplied.
    pub fn start_position(&self) -> Option<(usize, usize)> {
        if self.start_line == 0 {
            return None;
        }
        Some((self.start_line - 1, self.start_column.saturating_sub(1)))
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol_name.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct StructureQuery {
    pub client_id: String,
    pub codebase_path: String,
    pub file_path: String,
}

impl StructureQuery {
    pub fn validate(&self) -> ApiResult<()> {
        if self.codebase_path.is_empty() {
            return Err(ApiError::InvalidArgument("codebasePath is required".into()));
        }
        if self.file_path.is_empty() {
            return Err(ApiError::InvalidArgument("filePath is required".into()));
        }
        Ok(())
    }
}

/// Definitions used inside a line span of a file, or of named symbols.
/// Lines are one-based; `end_line` zero means a single line.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DefinitionQuery {
    pub client_id: String,
    pub codebase_path: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub symbol_names: Vec<String>,
    #[serde(with = "serde_flag")]
    #[schemars(with = "u8")]
    pub include_content: bool,
}

impl DefinitionQuery {
    pub fn validate(&self) -> ApiResult<()> {
        if self.codebase_path.is_empty() {
            return Err(ApiError::InvalidArgument("codebasePath is required".into()));
        }
        if self.file_path.is_empty() {
            return Err(ApiError::InvalidArgument("filePath is required".into()));
        }
        if self.names().next().is_none() {
            if self.start_line == 0 {
                return Err(ApiError::InvalidArgument(
                    "either startLine or symbolNames is required".into(),
                ));
            }
            if self.end_line != 0 && self.end_line < self.start_line {
                return Err(ApiError::InvalidArgument("endLine must be >= startLine".into()));
            }
        }
        Ok(())
    }

    /// Zero-based inclusive line span, when a start line was supplied.
    pub fn line_span(&self) -> Option<(usize, usize)> {
        if self.start_line == 0 {
            return None;
        }
        let end = self.end_line.max(self.start_line);
        Some((self.start_line - 1, end - 1))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbol_names
            .iter()
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }
}
