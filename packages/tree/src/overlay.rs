//! Overlay (deep merge with existing-wins policy)
//!
//! `overlay(source, path)` walks every key of `source`:
//!
//! - the target already holds a value at that key: when both sides are
//!   objects or both are arrays the merge recurses, otherwise the target
//!   value is kept and the source value is dropped
//! - the target has no value there (`PathNotFound`): the source value is
//!   inserted, following the array write policy of [`ValueTree::set`]
//! - any other lookup error aborts the merge
//!
//! The target is authoritative and the source is supplemental, so literal
//! fields written by a manifest author always beat injected values.

use crate::kind::Kind;
use crate::key::Key;
use crate::result::TreeResult;
use crate::tree::ValueTree;
use serde_json::Value;
use tracing::trace;

impl ValueTree {
    /// Deep-merge `source` into the node at `path`
    pub fn overlay(&mut self, source: &Value, path: &[Key]) -> TreeResult<()> {
        let entries: Vec<(Key, &Value)> = match source {
            Value::Object(map) => map
                .iter()
                .map(|(name, value)| (Key::Field(name.clone()), value))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, value)| (Key::Index(index), value))
                .collect(),
            // Scalars have no keys to merge
            _ => return Ok(()),
        };

        let mut child_path = path.to_vec();
        for (key, value) in entries {
            child_path.push(key);
            match self.get(&child_path) {
                Ok(existing) => {
                    let existing_kind = self.kind(existing)?;
                    if existing_kind.is_container() && existing_kind == Kind::of(value) {
                        self.overlay(value, &child_path)?;
                    } else {
                        trace!(path = ?child_path, "Overlay keeps existing value");
                    }
                }
                Err(err) if err.is_path_not_found() => {
                    self.set(&child_path, value.clone())?;
                }
                Err(err) => return Err(err),
            }
            child_path.pop();
        }
        Ok(())
    }

    /// Deep-merge another tree into the node at `path`
    pub fn overlay_tree(&mut self, source: &ValueTree, path: &[Key]) -> TreeResult<()> {
        let value = source.to_value()?;
        self.overlay(&value, path)
    }
}
