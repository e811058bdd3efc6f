//! Path tracking for tree walks
//!
//! A [`Branch`] identifies the position of one node reached during a walk:
//! its structural path, the rendered form of that path, its kind and its
//! parent branch. Branches live in a [`BranchTracker`] owned by a single
//! walk and are discarded with it.

use crate::error::TreeError;
use crate::key::{render_path, Key};
use crate::kind::Kind;
use crate::result::TreeResult;
use crate::tree::NodeId;
use std::collections::HashSet;
use std::ops::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchId(usize);

#[derive(Debug, Clone)]
pub struct Branch {
    id: BranchId,
    parent: Option<BranchId>,
    key: Option<Key>,
    path: Vec<Key>,
    path_string: String,
    kind: Kind,
    node: NodeId,
}

impl Branch {
    pub fn id(&self) -> BranchId {
        self.id
    }

    pub fn parent(&self) -> Option<BranchId> {
        self.parent
    }

    /// Key under the parent; `None` for the root
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Field name under the parent, if the parent is an object
    pub fn field_name(&self) -> Option<&str> {
        self.key.as_ref().and_then(Key::as_field)
    }

    pub fn path(&self) -> &[Key] {
        &self.path
    }

    /// Path of the enclosing container; the root has none
    pub fn parent_path(&self) -> Option<&[Key]> {
        self.path.split_last().map(|(_, parent)| parent)
    }

    /// Rendered path, e.g. `$["spec"]["ports"][0]`
    pub fn path_string(&self) -> &str {
        &self.path_string
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Arena of branches built during one walk
#[derive(Debug)]
pub struct BranchTracker {
    branches: Vec<Branch>,
    seen: HashSet<(BranchId, Key)>,
}

impl BranchTracker {
    pub fn new(root: NodeId, kind: Kind) -> Self {
        Self {
            branches: vec![Branch {
                id: BranchId(0),
                parent: None,
                key: None,
                path: Vec::new(),
                path_string: render_path(&[]),
                kind,
                node: root,
            }],
            seen: HashSet::new(),
        }
    }

    pub fn root(&self) -> BranchId {
        BranchId(0)
    }

    /// Build the branch for `key` under `parent`
    ///
    /// A key can only be visited once per parent in a walk; a repeat means
    /// the container was iterated twice and is reported as `DuplicateKey`.
    pub fn child(
        &mut self,
        parent: BranchId,
        key: Key,
        node: NodeId,
        kind: Kind,
    ) -> TreeResult<BranchId> {
        let parent_branch = &self.branches[parent.0];
        if !self.seen.insert((parent, key.clone())) {
            return Err(TreeError::DuplicateKey {
                parent: parent_branch.path_string.clone(),
                key: key.to_string(),
            });
        }

        let mut path = parent_branch.path.clone();
        path.push(key.clone());
        let path_string = format!("{}{}", parent_branch.path_string, key);

        let id = BranchId(self.branches.len());
        self.branches.push(Branch {
            id,
            parent: Some(parent),
            key: Some(key),
            path,
            path_string,
            kind,
            node,
        });
        Ok(id)
    }

    pub fn get(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(id.0)
    }

    pub fn parent_of(&self, branch: &Branch) -> Option<&Branch> {
        branch.parent.and_then(|parent| self.get(parent))
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter()
    }
}

impl Index<BranchId> for BranchTracker {
    type Output = Branch;

    fn index(&self, id: BranchId) -> &Branch {
        &self.branches[id.0]
    }
}
