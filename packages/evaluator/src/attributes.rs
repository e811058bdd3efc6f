//! Attribute source for lookup macros
//!
//! Attributes are named, typed values supplied by the caller (module
//! parameters, variables). Only the built-in lookup macros read them.

use crate::error::{EvalError, EvalResult};
use kubegen_tree::Kind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub value: Value,
}

impl Attribute {
    pub fn new(kind: Kind, value: Value) -> Self {
        Self { kind, value }
    }

    /// Attribute whose declared type is the kind of its value
    pub fn inferred(value: Value) -> Self {
        Self {
            kind: Kind::of(&value),
            value,
        }
    }
}

/// Named attributes, deserializable from
/// `{"name": {"type": "String", "value": "..."}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    entries: BTreeMap<String, Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes with types inferred from plain values
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            entries: values
                .into_iter()
                .map(|(name, value)| (name, Attribute::inferred(value)))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, attribute: Attribute) -> Option<Attribute> {
        self.entries.insert(name.into(), attribute)
    }

    pub fn declare(&mut self, name: impl Into<String>, kind: Kind, value: Value) -> &mut Self {
        self.insert(name, Attribute::new(kind, value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of `name`, which must be declared as `expected` and hold a
    /// value of that kind
    pub fn lookup(&self, name: &str, expected: Kind) -> EvalResult<&Value> {
        let attribute = self.get(name).ok_or_else(|| EvalError::AttributeNotFound {
            name: name.to_string(),
        })?;

        let actual = if attribute.kind != expected {
            attribute.kind
        } else {
            Kind::of(&attribute.value)
        };
        if actual != expected {
            return Err(EvalError::AttributeTypeMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(&attribute.value)
    }
}
