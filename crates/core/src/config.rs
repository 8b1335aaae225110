use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShenmaError};

/// Codegraph indexing configuration, loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodegraphConfig {
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub retention_days: u32,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub languages: Vec<LanguageConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    #[serde(default)]
    pub detection_files: Vec<String>,
    #[serde(default)]
    pub build_tools: Vec<BuildTool>,
    #[serde(default)]
    pub index: Option<IndexTool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTool {
    pub name: String,
    #[serde(default)]
    pub detection_files: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, alias = "commands")]
    pub build_commands: Vec<CommandSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTool {
    pub name: String,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
}

/// One subprocess invocation before placeholder substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub base: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// `KEY=VALUE` entries added to the child environment.
    #[serde(default)]
    pub env: Vec<String>,
}

impl CodegraphConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ShenmaError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: CodegraphConfig = serde_yaml_ng::from_str(raw)
            .map_err(|e| ShenmaError::Config(format!("failed to parse config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(ShenmaError::Config("no languages configured".into()));
        }
        for lang in &self.languages {
            if lang.name.is_empty() {
                return Err(ShenmaError::Config("language name is required".into()));
            }
            if lang.detection_files.is_empty() {
                return Err(ShenmaError::Config(format!(
                    "detection files are required for language {}",
                    lang.name
                )));
            }
            if lang.index.is_none() {
                return Err(ShenmaError::Config(format!(
                    "index is required for language {}",
                    lang.name
                )));
            }
        }
        Ok(())
    }

    pub fn language(&self, name: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|l| l.name == name)
    }
}
