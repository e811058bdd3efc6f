use crate::error::TreeError;

/// Result type alias for tree operations
pub type TreeResult<T> = Result<T, TreeError>;
