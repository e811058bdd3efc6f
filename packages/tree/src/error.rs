use crate::kind::Kind;
use thiserror::Error;

/// Errors raised while loading, addressing or mutating a value tree
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Load error: {0}")]
    Load(#[from] serde_json::Error),

    #[error("YAML load error: {0}")]
    LoadYaml(#[from] serde_yaml::Error),

    #[error("Invalid key at {path}: {found} (expected a string or a non-negative integer)")]
    InvalidKey { path: String, found: String },

    #[error("Invalid value at {path}: {found} has no JSON representation")]
    InvalidValue { path: String, found: String },

    #[error("Duplicate key {key} under {parent}")]
    DuplicateKey { parent: String, key: String },

    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("Type mismatch at {path}: expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: Kind,
        actual: Kind,
    },

    #[error("Not a container at {path}: found {actual}")]
    NotContainer { path: String, actual: Kind },

    #[error("Cannot delete the document root")]
    RootDelete,

    #[error("Node #{node} is no longer attached to the tree")]
    StaleNode { node: usize },
}

impl TreeError {
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    pub fn type_mismatch(path: impl Into<String>, expected: Kind, actual: Kind) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected,
            actual,
        }
    }

    pub fn is_path_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }
}
