//! # Modifiers
//!
//! Deferred mutations produced while walking the tree.
//!
//! A macro factory does not touch the document. It returns a [`Modifier`]:
//! an ordered list of [`Instruction`]s bound to the branch of the macro key.
//! The evaluator collects modifiers for a whole walk and interprets them
//! afterwards.
//!
//! ## Instruction semantics
//!
//! ### Set
//! - Replaces the value at `path` (see `ValueTree::set` for array writes)
//!
//! ### Overlay
//! - Deep-merges `value` into the node at `path`; existing values win
//!
//! ### Delete
//! - Removes the entry at `path`; deleting the root fails
//!
//! ### Transform
//! - Reads `source` when executed, renders it (JSON, YAML, join) and writes
//!   the resulting string to `target`. Reading late means nested transforms
//!   that ran earlier in the same pass are already visible.
//!
//! ## Execution order
//!
//! Pending modifiers execute deepest macro key first. Built-ins rewrite the
//! wrapper (the parent of their key), so a modifier inside a wrapper always
//! runs before the wrapper is replaced or deleted, whatever the sibling keys
//! are called. Keys at the same depth run in descending structural order
//! (indices compare numerically): later array elements go before earlier
//! ones, so deletions never shift a target that is still pending.
//!
//! Execution is not transactional: when a modifier fails, mutations applied
//! by earlier modifiers in the same pass stay in place.

use crate::error::{EvalError, EvalResult};
use crate::macros::MacroInvocation;
use kubegen_tree::{render_path, Branch, Key, ValueTree};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// Rendering applied by [`Instruction::Transform`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Compact JSON
    Json,
    /// YAML document
    Yaml,
    /// Concatenation of the elements of an array, without separator
    Join,
}

impl Transform {
    pub fn render(self, value: &Value) -> EvalResult<String> {
        match self {
            Transform::Json => serde_json::to_string(value).map_err(|e| EvalError::Encode {
                transform: self,
                message: e.to_string(),
            }),
            Transform::Yaml => serde_yaml::to_string(value).map_err(|e| EvalError::Encode {
                transform: self,
                message: e.to_string(),
            }),
            Transform::Join => match value {
                Value::Array(items) => {
                    let mut joined = String::new();
                    for item in items {
                        joined.push_str(&render_element(item)?);
                    }
                    Ok(joined)
                }
                other => Err(EvalError::Encode {
                    transform: self,
                    message: format!("expected an array, found {}", kubegen_tree::Kind::of(other)),
                }),
            },
        }
    }
}

/// String rendering of one joined element
fn render_element(value: &Value) -> EvalResult<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => Transform::Json.render(value)?,
    })
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transform::Json => "JSON",
            Transform::Yaml => "YAML",
            Transform::Join => "joined string",
        })
    }
}

/// One primitive mutation of the document
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Set { path: Vec<Key>, value: Value },
    Overlay { path: Vec<Key>, value: Value },
    Delete { path: Vec<Key> },
    Transform {
        source: Vec<Key>,
        target: Vec<Key>,
        transform: Transform,
    },
}

impl Instruction {
    pub fn apply(&self, tree: &mut ValueTree) -> EvalResult<()> {
        match self {
            Instruction::Set { path, value } => {
                tree.set(path, value.clone())?;
            }
            Instruction::Overlay { path, value } => {
                tree.overlay(value, path)?;
            }
            Instruction::Delete { path } => {
                tree.delete(path)?;
            }
            Instruction::Transform {
                source,
                target,
                transform,
            } => {
                let rendered = transform.render(&tree.get_value(source)?)?;
                tree.set(target, Value::String(rendered))?;
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Set { .. } => "set",
            Instruction::Overlay { .. } => "overlay",
            Instruction::Delete { .. } => "delete",
            Instruction::Transform { .. } => "transform",
        }
    }
}

/// Pending mutation bound to one branch and one macro
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    path: Vec<Key>,
    path_string: String,
    macro_name: String,
    instructions: Vec<Instruction>,
}

impl Modifier {
    pub fn new(branch: &Branch, invocation: &MacroInvocation) -> Self {
        Self::at(branch.path().to_vec(), invocation.canonical_name())
    }

    /// Modifier for an explicit path, outside of a walk
    pub fn at(path: Vec<Key>, macro_name: impl Into<String>) -> Self {
        Self {
            path_string: render_path(&path),
            path,
            macro_name: macro_name.into(),
            instructions: Vec::new(),
        }
    }

    pub fn set(mut self, path: Vec<Key>, value: Value) -> Self {
        self.instructions.push(Instruction::Set { path, value });
        self
    }

    pub fn overlay(mut self, path: Vec<Key>, value: Value) -> Self {
        self.instructions.push(Instruction::Overlay { path, value });
        self
    }

    pub fn delete(mut self, path: Vec<Key>) -> Self {
        self.instructions.push(Instruction::Delete { path });
        self
    }

    pub fn transform(mut self, source: Vec<Key>, target: Vec<Key>, transform: Transform) -> Self {
        self.instructions.push(Instruction::Transform {
            source,
            target,
            transform,
        });
        self
    }

    pub fn path(&self) -> &[Key] {
        &self.path
    }

    pub fn path_string(&self) -> &str {
        &self.path_string
    }

    pub fn macro_name(&self) -> &str {
        &self.macro_name
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Run every instruction in order against the live document
    pub fn apply(&self, tree: &mut ValueTree) -> EvalResult<()> {
        for instruction in &self.instructions {
            trace!(path = %self.path_string, instruction = instruction.name(), "Applying instruction");
            instruction
                .apply(tree)
                .map_err(|source| EvalError::ModifierExecution {
                    path: self.path_string.clone(),
                    macro_name: self.macro_name.clone(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}

/// Modifiers registered during one walk, keyed by rendered branch path
#[derive(Debug, Default)]
pub struct PendingModifiers {
    modifiers: HashMap<String, Modifier>,
}

impl PendingModifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a modifier; a later one at the same path replaces the earlier
    pub fn insert(&mut self, modifier: Modifier) -> Option<Modifier> {
        debug!(path = %modifier.path_string, macro_name = %modifier.macro_name, "Registering modifier");
        let replaced = self
            .modifiers
            .insert(modifier.path_string.clone(), modifier);
        if let Some(previous) = &replaced {
            warn!(path = %previous.path_string, "Modifier replaced at the same path");
        }
        replaced
    }

    pub fn get(&self, path: &str) -> Option<&Modifier> {
        self.modifiers.get(path)
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Modifiers in execution order: deepest first, then descending path
    pub fn into_execution_order(self) -> Vec<Modifier> {
        let mut ordered: Vec<Modifier> = self.modifiers.into_values().collect();
        ordered.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| b.path.cmp(&a.path))
        });
        ordered
    }

    /// Execute all modifiers, stopping at the first failure
    pub fn apply_all(self, tree: &mut ValueTree) -> EvalResult<usize> {
        let ordered = self.into_execution_order();
        for modifier in &ordered {
            modifier.apply(tree)?;
        }
        Ok(ordered.len())
    }
}
