use crate::branch::{Branch, BranchId, BranchTracker};
use crate::error::TreeError;
use crate::tree::ValueTree;

/// Visitor pattern for walking a value tree depth-first
///
/// The walk builds a fresh [`Branch`] for every node below the root and
/// hands it to `visit_branch` before descending into the node's children.
/// Visitors only read the tree; mutations are collected and applied after
/// the walk.
pub trait Visitor: Sized {
    type Error: From<TreeError>;

    fn visit_root(&mut self, _tree: &ValueTree, _root: &Branch) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_branch(&mut self, tree: &ValueTree, branch: &Branch) -> Result<(), Self::Error>;
}

/// Walk the whole tree, returning the branches built on the way
pub fn walk_tree<V: Visitor>(visitor: &mut V, tree: &ValueTree) -> Result<BranchTracker, V::Error> {
    let root = tree.root();
    let mut tracker = BranchTracker::new(root, tree.kind(root)?);
    let root_branch = tracker.root();
    visitor.visit_root(tree, &tracker[root_branch])?;
    walk_children(visitor, tree, &mut tracker, root_branch)?;
    Ok(tracker)
}

fn walk_children<V: Visitor>(
    visitor: &mut V,
    tree: &ValueTree,
    tracker: &mut BranchTracker,
    parent: BranchId,
) -> Result<(), V::Error> {
    let node = tracker[parent].node();
    for (key, child) in tree.children(node)? {
        let kind = tree.kind(child)?;
        let branch = tracker.child(parent, key, child, kind)?;
        visitor.visit_branch(tree, &tracker[branch])?;
        if kind.is_container() {
            walk_children(visitor, tree, tracker, branch)?;
        }
    }
    Ok(())
}
