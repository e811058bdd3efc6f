//! # Value Tree
//!
//! Mutable, arena-backed view over a parsed document.
//!
//! ## Layout
//!
//! Every value lives in a slot of a single arena and is addressed by a
//! [`NodeId`]. Objects map field names to child handles, arrays hold an
//! ordered list of child handles, and every slot remembers its parent handle.
//! Parents are plain handles, so there are no reference-counting cycles.
//!
//! Handles stay valid while their node is attached. Overwriting a value in
//! place keeps the node's handle (every outstanding handle sees the new
//! value); deleting a node releases its whole subtree and later access
//! through a released handle fails with [`TreeError::StaleNode`]. Released
//! slots are never reused, so a stale handle can not alias a new node.
//!
//! ## Locking
//!
//! All structural mutation (append, extend, delete, overlay) takes `&mut
//! self`. The exclusive borrow is the document-wide lock: no reader can
//! observe a half-applied mutation.
//!
//! ## Array writes
//!
//! Writing index `i` of an array of length `len`:
//!
//! - `i < len` overwrites in place
//! - `i == len` appends
//! - `i > len` pads with `null` up to `i`, then appends

use crate::error::TreeError;
use crate::key::{render_path, Key};
use crate::kind::Kind;
use crate::result::TreeResult;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use tracing::trace;

/// Handle to a node in a [`ValueTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Object(BTreeMap<String, NodeId>),
    Array(Vec<NodeId>),
}

impl NodeData {
    fn kind(&self) -> Kind {
        match self {
            NodeData::Null => Kind::Null,
            NodeData::Boolean(_) => Kind::Boolean,
            NodeData::Number(_) => Kind::Number,
            NodeData::String(_) => Kind::String,
            NodeData::Object(_) => Kind::Object,
            NodeData::Array(_) => Kind::Array,
        }
    }

    fn child_ids(&self) -> Vec<NodeId> {
        match self {
            NodeData::Object(fields) => fields.values().copied().collect(),
            NodeData::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    parent: Option<NodeId>,
    data: NodeData,
}

/// Where a write through `set` lands in the parent container
enum Placement {
    Overwrite(NodeId),
    InsertField(String),
    Append { padding: usize },
}

#[derive(Debug, Clone)]
pub struct ValueTree {
    slots: Vec<Option<Slot>>,
    root: NodeId,
    live: usize,
}

impl ValueTree {
    pub fn new(value: Value) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            root: NodeId(0),
            live: 0,
        };
        tree.root = tree.alloc(None, value);
        tree
    }

    /// Load a tree from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> TreeResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::new(value))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of attached nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: NodeId) -> TreeResult<&Slot> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(TreeError::StaleNode { node: id.0 })
    }

    fn slot_mut(&mut self, id: NodeId) -> TreeResult<&mut Slot> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::StaleNode { node: id.0 })
    }

    fn alloc(&mut self, parent: Option<NodeId>, value: Value) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot {
            parent,
            data: NodeData::Null,
        }));
        self.live += 1;
        let data = self.build_data(id, value);
        if let Some(Some(slot)) = self.slots.get_mut(id.0) {
            slot.data = data;
        }
        id
    }

    fn build_data(&mut self, owner: NodeId, value: Value) -> NodeData {
        match value {
            Value::Null => NodeData::Null,
            Value::Bool(b) => NodeData::Boolean(b),
            Value::Number(n) => NodeData::Number(n),
            Value::String(s) => NodeData::String(s),
            Value::Object(map) => NodeData::Object(
                map.into_iter()
                    .map(|(name, child)| (name, self.alloc(Some(owner), child)))
                    .collect(),
            ),
            Value::Array(items) => NodeData::Array(
                items
                    .into_iter()
                    .map(|child| self.alloc(Some(owner), child))
                    .collect(),
            ),
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.0).and_then(Option::take) {
            self.live -= 1;
            for child in slot.data.child_ids() {
                self.release(child);
            }
        }
    }

    /// Replace the data of a live node, keeping its handle
    fn replace_data(&mut self, id: NodeId, value: Value) -> TreeResult<()> {
        let old_children = self.slot(id)?.data.child_ids();
        for child in old_children {
            self.release(child);
        }
        let data = self.build_data(id, value);
        self.slot_mut(id)?.data = data;
        Ok(())
    }

    pub fn kind(&self, id: NodeId) -> TreeResult<Kind> {
        Ok(self.slot(id)?.data.kind())
    }

    pub fn parent(&self, id: NodeId) -> TreeResult<Option<NodeId>> {
        Ok(self.slot(id)?.parent)
    }

    /// Children of a node in iteration order; scalars have none
    pub fn children(&self, id: NodeId) -> TreeResult<Vec<(Key, NodeId)>> {
        Ok(match &self.slot(id)?.data {
            NodeData::Object(fields) => fields
                .iter()
                .map(|(name, child)| (Key::Field(name.clone()), *child))
                .collect(),
            NodeData::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, child)| (Key::Index(index), *child))
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Resolve one step from `id`; `walked` is the path including `key`
    fn step(&self, id: NodeId, key: &Key, walked: &[Key]) -> TreeResult<NodeId> {
        let data = &self.slot(id)?.data;
        match (data, key) {
            (NodeData::Object(fields), Key::Field(name)) => fields
                .get(name)
                .copied()
                .ok_or_else(|| TreeError::path_not_found(render_path(walked))),
            (NodeData::Array(items), Key::Index(index)) => items
                .get(*index)
                .copied()
                .ok_or_else(|| TreeError::path_not_found(render_path(walked))),
            (NodeData::Object(_), Key::Index(_)) => Err(TreeError::type_mismatch(
                render_path(&walked[..walked.len() - 1]),
                Kind::Array,
                Kind::Object,
            )),
            (NodeData::Array(_), Key::Field(_)) => Err(TreeError::type_mismatch(
                render_path(&walked[..walked.len() - 1]),
                Kind::Object,
                Kind::Array,
            )),
            (scalar, _) => Err(TreeError::NotContainer {
                path: render_path(&walked[..walked.len() - 1]),
                actual: scalar.kind(),
            }),
        }
    }

    /// Node at a structural path
    pub fn get(&self, path: &[Key]) -> TreeResult<NodeId> {
        let mut current = self.root;
        for depth in 0..path.len() {
            current = self.step(current, &path[depth], &path[..=depth])?;
        }
        Ok(current)
    }

    pub fn contains(&self, path: &[Key]) -> bool {
        self.get(path).is_ok()
    }

    /// Structural path of a node, rebuilt by following parent handles
    pub fn path_of(&self, id: NodeId) -> TreeResult<Vec<Key>> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.slot(current)?.parent {
            path.push(self.key_in_parent(parent, current)?);
            current = parent;
        }
        path.reverse();
        Ok(path)
    }

    fn key_in_parent(&self, parent: NodeId, child: NodeId) -> TreeResult<Key> {
        let found = match &self.slot(parent)?.data {
            NodeData::Object(fields) => fields
                .iter()
                .find(|(_, id)| **id == child)
                .map(|(name, _)| Key::Field(name.clone())),
            NodeData::Array(items) => items
                .iter()
                .position(|id| *id == child)
                .map(Key::Index),
            _ => None,
        };
        found.ok_or(TreeError::StaleNode { node: child.0 })
    }

    /// Materialize the subtree under `id`
    pub fn value(&self, id: NodeId) -> TreeResult<Value> {
        Ok(match &self.slot(id)?.data {
            NodeData::Null => Value::Null,
            NodeData::Boolean(b) => Value::Bool(*b),
            NodeData::Number(n) => Value::Number(n.clone()),
            NodeData::String(s) => Value::String(s.clone()),
            NodeData::Object(fields) => {
                let mut map = Map::new();
                for (name, child) in fields {
                    map.insert(name.clone(), self.value(*child)?);
                }
                Value::Object(map)
            }
            NodeData::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|child| self.value(*child))
                    .collect::<TreeResult<Vec<_>>>()?,
            ),
        })
    }

    pub fn get_value(&self, path: &[Key]) -> TreeResult<Value> {
        self.value(self.get(path)?)
    }

    /// Materialize the whole document
    pub fn to_value(&self) -> TreeResult<Value> {
        self.value(self.root)
    }

    fn typed_data(&self, path: &[Key], expected: Kind) -> TreeResult<&NodeData> {
        let data = &self.slot(self.get(path)?)?.data;
        if data.kind() != expected {
            return Err(TreeError::type_mismatch(
                render_path(path),
                expected,
                data.kind(),
            ));
        }
        Ok(data)
    }

    pub fn get_string(&self, path: &[Key]) -> TreeResult<&str> {
        match self.typed_data(path, Kind::String)? {
            NodeData::String(s) => Ok(s.as_str()),
            other => Err(TreeError::type_mismatch(render_path(path), Kind::String, other.kind())),
        }
    }

    pub fn get_number(&self, path: &[Key]) -> TreeResult<&Number> {
        match self.typed_data(path, Kind::Number)? {
            NodeData::Number(n) => Ok(n),
            other => Err(TreeError::type_mismatch(render_path(path), Kind::Number, other.kind())),
        }
    }

    pub fn get_boolean(&self, path: &[Key]) -> TreeResult<bool> {
        match self.typed_data(path, Kind::Boolean)? {
            NodeData::Boolean(b) => Ok(*b),
            other => Err(TreeError::type_mismatch(render_path(path), Kind::Boolean, other.kind())),
        }
    }

    pub fn get_object(&self, path: &[Key]) -> TreeResult<Map<String, Value>> {
        self.typed_data(path, Kind::Object)?;
        match self.get_value(path)? {
            Value::Object(map) => Ok(map),
            other => Err(TreeError::type_mismatch(render_path(path), Kind::Object, Kind::of(&other))),
        }
    }

    pub fn get_array(&self, path: &[Key]) -> TreeResult<Vec<Value>> {
        self.typed_data(path, Kind::Array)?;
        match self.get_value(path)? {
            Value::Array(items) => Ok(items),
            other => Err(TreeError::type_mismatch(render_path(path), Kind::Array, Kind::of(&other))),
        }
    }

    /// Replace the value at `path`; the empty path replaces the root
    ///
    /// The parent container must exist. Returns the handle of the written
    /// node.
    pub fn set(&mut self, path: &[Key], value: Value) -> TreeResult<NodeId> {
        let Some((key, parent_path)) = path.split_last() else {
            self.replace_data(self.root, value)?;
            return Ok(self.root);
        };
        let parent = self.get(parent_path)?;

        let placement = match (&self.slot(parent)?.data, key) {
            (NodeData::Object(fields), Key::Field(name)) => match fields.get(name) {
                Some(existing) => Placement::Overwrite(*existing),
                None => Placement::InsertField(name.clone()),
            },
            (NodeData::Array(items), Key::Index(index)) => match items.get(*index) {
                Some(existing) => Placement::Overwrite(*existing),
                None => Placement::Append {
                    padding: index - items.len(),
                },
            },
            _ => {
                // Reuse step() for the mismatch/not-container diagnostics
                self.step(parent, key, path)?;
                return Err(TreeError::path_not_found(render_path(path)));
            }
        };

        match placement {
            Placement::Overwrite(existing) => {
                self.replace_data(existing, value)?;
                Ok(existing)
            }
            Placement::InsertField(name) => {
                let child = self.alloc(Some(parent), value);
                if let NodeData::Object(fields) = &mut self.slot_mut(parent)?.data {
                    fields.insert(name, child);
                }
                Ok(child)
            }
            Placement::Append { padding } => {
                if padding > 0 {
                    trace!(path = %render_path(path), padding, "Extending array with null gaps");
                }
                let mut appended: Vec<NodeId> = (0..padding)
                    .map(|_| self.alloc(Some(parent), Value::Null))
                    .collect();
                let child = self.alloc(Some(parent), value);
                appended.push(child);
                if let NodeData::Array(items) = &mut self.slot_mut(parent)?.data {
                    items.extend(appended);
                }
                Ok(child)
            }
        }
    }

    /// Remove the entry at `path`, returning its value
    pub fn delete(&mut self, path: &[Key]) -> TreeResult<Value> {
        if path.is_empty() {
            return Err(TreeError::RootDelete);
        }
        let id = self.get(path)?;
        self.delete_node(id)
    }

    /// Replace the value of a node through its handle
    pub fn set_node(&mut self, id: NodeId, value: Value) -> TreeResult<()> {
        self.replace_data(id, value)
    }

    /// Detach a node from its parent container, returning its value
    pub fn delete_node(&mut self, id: NodeId) -> TreeResult<Value> {
        let parent = self.slot(id)?.parent.ok_or(TreeError::RootDelete)?;
        let removed = self.value(id)?;
        match &mut self.slot_mut(parent)?.data {
            NodeData::Object(fields) => fields.retain(|_, child| *child != id),
            NodeData::Array(items) => items.retain(|child| *child != id),
            _ => {}
        }
        self.release(id);
        Ok(removed)
    }

    /// Load a tree from YAML text
    ///
    /// Mapping keys must be strings or non-negative integers (integers become
    /// field names); anything else is an [`TreeError::InvalidKey`]. NaN and
    /// infinite floats have no JSON form and fail with
    /// [`TreeError::InvalidValue`].
    pub fn from_yaml_str(source: &str) -> TreeResult<Self> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(source)?;
        let mut path = Vec::new();
        let value = yaml_to_json(&yaml, &mut path)?;
        Ok(Self::new(value))
    }
}

impl From<Value> for ValueTree {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

fn yaml_to_json(yaml: &serde_yaml::Value, path: &mut Vec<Key>) -> TreeResult<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                let number = n.as_f64().and_then(Number::from_f64);
                match number {
                    Some(number) => Value::Number(number),
                    None => {
                        return Err(TreeError::InvalidValue {
                            path: render_path(path),
                            found: n.to_string(),
                        })
                    }
                }
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => {
            let mut array = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(Key::Index(index));
                array.push(yaml_to_json(item, path)?);
                path.pop();
            }
            Value::Array(array)
        }
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, item) in mapping {
                let name = match key {
                    Yaml::String(s) => s.clone(),
                    Yaml::Number(n) if n.as_u64().is_some() => n.to_string(),
                    other => {
                        return Err(TreeError::InvalidKey {
                            path: render_path(path),
                            found: format!("{:?}", other),
                        })
                    }
                };
                path.push(Key::Field(name.clone()));
                let converted = yaml_to_json(item, path)?;
                path.pop();
                map.insert(name, converted);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value, path)?,
    })
}

/// Serializes a node without materializing it first
struct NodeRef<'a> {
    tree: &'a ValueTree,
    id: NodeId,
}

impl Serialize for NodeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let slot = self.tree.slot(self.id).map_err(S::Error::custom)?;
        match &slot.data {
            NodeData::Null => serializer.serialize_unit(),
            NodeData::Boolean(b) => serializer.serialize_bool(*b),
            NodeData::Number(n) => n.serialize(serializer),
            NodeData::String(s) => serializer.serialize_str(s),
            NodeData::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, child) in fields {
                    map.serialize_entry(name, &NodeRef { tree: self.tree, id: *child })?;
                }
                map.end()
            }
            NodeData::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for child in items {
                    seq.serialize_element(&NodeRef { tree: self.tree, id: *child })?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for ValueTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeRef {
            tree: self,
            id: self.root,
        }
        .serialize(serializer)
    }
}
