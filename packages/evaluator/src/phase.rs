//! Evaluation phases
//!
//! Phases run in a fixed order. Scalar substitutions settle before composite
//! ones, and string encoding runs last so it serializes fully resolved
//! values.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Structural directives (`Delete`)
    Directives,
    /// Boolean, string and number lookups
    Scalars,
    /// Array and object lookups, string joins
    Composites,
    /// JSON and YAML string encoding
    Encoding,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Directives,
        Phase::Scalars,
        Phase::Composites,
        Phase::Encoding,
    ];

    pub fn first() -> Self {
        Phase::Directives
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Phase::Directives => Some(Phase::Scalars),
            Phase::Scalars => Some(Phase::Composites),
            Phase::Composites => Some(Phase::Encoding),
            Phase::Encoding => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Directives => "directives",
            Phase::Scalars => "scalars",
            Phase::Composites => "composites",
            Phase::Encoding => "encoding",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
