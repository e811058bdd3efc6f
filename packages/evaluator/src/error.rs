use crate::config::ConfigError;
use crate::modifier::Transform;
use crate::phase::Phase;
use kubegen_tree::{Kind, TreeError};
use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Unknown kind: {reason}")]
    UnknownKind { reason: String },

    #[error("Macro type mismatch at {path}: {macro_name} expects {expected}, found {actual}")]
    MacroTypeMismatch {
        path: String,
        macro_name: String,
        expected: String,
        actual: Kind,
    },

    #[error("{macro_name} at {path} failed: {source}")]
    ModifierExecution {
        path: String,
        macro_name: String,
        source: Box<EvalError>,
    },

    #[error("Attribute '{name}' not found")]
    AttributeNotFound { name: String },

    #[error("Attribute '{name}' has type {actual}, expected {expected}")]
    AttributeTypeMismatch {
        name: String,
        expected: Kind,
        actual: Kind,
    },

    #[error("Failed to encode value as {transform}: {message}")]
    Encode { transform: Transform, message: String },

    #[error("Unknown macro '{key}' at {path}")]
    UnknownMacro { path: String, key: String },

    #[error("Unresolved macros remain at: {}", .paths.join(", "))]
    UnresolvedMacros { paths: Vec<String> },

    #[error("Phase '{phase}' did not converge after {walks} walks")]
    WalkLimitExceeded { phase: Phase, walks: usize },

    #[error("Lookups nested deeper than {limit} levels")]
    LookupDepthExceeded { limit: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EvalError {
    pub fn macro_type_mismatch(
        path: impl Into<String>,
        macro_name: impl Into<String>,
        expected: &[Kind],
        actual: Kind,
    ) -> Self {
        let expected = expected
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(" or ");
        Self::MacroTypeMismatch {
            path: path.into(),
            macro_name: macro_name.into(),
            expected,
            actual,
        }
    }

    /// Innermost cause, unwrapping modifier execution context
    pub fn root_cause(&self) -> &EvalError {
        match self {
            EvalError::ModifierExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
