use crate::macros::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "kubegen.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Evaluator configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// Namespace prefix of macro keys
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Fail on unknown macro-shaped keys and on macros left after the last phase
    #[serde(default)]
    pub strict_macros: bool,

    /// Upper bound on walks per phase; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_walks_per_phase: Option<usize>,

    /// Upper bound on nested fragment resolution by composite lookups
    #[serde(default = "default_max_lookup_depth")]
    pub max_lookup_depth: usize,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_max_lookup_depth() -> usize {
    16
}

impl EvaluatorConfig {
    /// Load config from a directory, falling back to defaults when the file
    /// does not exist
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                path: config_path.display().to_string(),
                source,
            })?;
            Self::from_json_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn strict(mut self) -> Self {
        self.strict_macros = true;
        self
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            strict_macros: false,
            max_walks_per_phase: None,
            max_lookup_depth: default_max_lookup_depth(),
        }
    }
}
