//! Structural keys and paths
//!
//! A path is a sequence of keys from the document root. Field keys address
//! object entries, index keys address array elements.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Field(String),
    Index(usize),
}

impl Key {
    pub fn field(name: impl Into<String>) -> Self {
        Key::Field(name.into())
    }

    pub fn index(index: usize) -> Self {
        Key::Index(index)
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            Key::Field(name) => Some(name),
            Key::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Field(_) => None,
            Key::Index(index) => Some(*index),
        }
    }
}

/// Renders a single path segment: `["name"]` for fields, `[3]` for indices
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => write!(f, "[{:?}]", name),
            Key::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Render a full path for diagnostics, rooted at `$`
pub fn render_path(path: &[Key]) -> String {
    let mut rendered = String::from("$");
    for key in path {
        rendered.push_str(&key.to_string());
    }
    rendered
}
