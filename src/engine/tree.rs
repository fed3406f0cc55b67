//! The branching version tree of document revisions.

use std::collections::BTreeMap;

use crate::engine::EngineError;
use crate::models::{normalize_text, DocumentNode, NodeId, NodeKind};

/// Outcome of a child insertion: either a fresh node or an existing
/// duplicate the caller should navigate to instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    Created(NodeId),
    Existing(NodeId),
}

impl ChildOutcome {
    pub fn node_id(self) -> NodeId {
        match self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }
}

/// Result of a cascade delete.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// Removed node ids, the deleted node first, then its descendants.
    pub removed: Vec<NodeId>,
    /// Set when the active node was inside the deleted subtree and the
    /// selection fell back (parent, else root, else any remaining node).
    pub current_changed: bool,
}

/// A tree of document revisions rooted at the generated answer.
///
/// The map owns every node; `root_id`/`current_id` always point into it (or
/// are `None` for the empty tree). Node ids are allocated from `counter`,
/// which only resets together with the whole tree.
#[derive(Debug, Clone, Default)]
pub struct VersionTree {
    nodes: BTreeMap<NodeId, DocumentNode>,
    root_id: Option<NodeId>,
    current_id: Option<NodeId>,
    counter: u64,
}

impl VersionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tree from persisted parts, discarding inconsistent state:
    /// a missing root empties the tree, an invalid current id falls back to
    /// the root, and the counter never lags behind the highest node id.
    pub fn from_parts(
        nodes: BTreeMap<NodeId, DocumentNode>,
        root_id: Option<NodeId>,
        current_id: Option<NodeId>,
        counter: u64,
    ) -> Self {
        let root_id = root_id.filter(|id| nodes.contains_key(id));
        if nodes.is_empty() || root_id.is_none() {
            return Self::new();
        }
        let current_id = current_id.filter(|id| nodes.contains_key(id)).or(root_id);
        let highest = nodes.keys().max().copied().unwrap_or(0);
        Self {
            nodes,
            root_id,
            current_id,
            counter: counter.max(highest),
        }
    }

    pub fn nodes(&self) -> &BTreeMap<NodeId, DocumentNode> {
        &self.nodes
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    pub fn current_id(&self) -> Option<NodeId> {
        self.current_id
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(&id)
    }

    pub fn current(&self) -> Option<&DocumentNode> {
        self.current_id.and_then(|id| self.nodes.get(&id))
    }

    /// Discard the whole tree and start over with a single root node.
    pub fn reset_with_root(&mut self, content: &str, title: &str) -> NodeId {
        self.nodes.clear();
        self.counter = 1;
        let root = DocumentNode {
            id: 1,
            parent_id: None,
            title: title.to_string(),
            content: content.to_string(),
            kind: NodeKind::Root,
            children: Vec::new(),
        };
        self.nodes.insert(1, root);
        self.root_id = Some(1);
        self.current_id = Some(1);
        1
    }

    /// Insert a child under `parent_id`, deduplicating first.
    ///
    /// Duplicate checks, in order: a node anywhere in the tree with the same
    /// normalized title and content; then a direct child of the parent with
    /// the same normalized title. Either returns the existing node's id and
    /// creates nothing.
    pub fn create_child(
        &mut self,
        parent_id: NodeId,
        title: &str,
        content: &str,
        kind: NodeKind,
    ) -> Result<ChildOutcome, EngineError> {
        let parent = self
            .nodes
            .get(&parent_id)
            .ok_or(EngineError::NodeNotFound(parent_id))?;

        let wanted_title = normalize_text(title);
        let wanted_content = normalize_text(content);

        if let Some(existing) = self.nodes.values().find(|node| {
            normalize_text(&node.title) == wanted_title
                && normalize_text(&node.content) == wanted_content
        }) {
            return Ok(ChildOutcome::Existing(existing.id));
        }

        if let Some(existing) = parent
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .find(|node| normalize_text(&node.title) == wanted_title)
        {
            return Ok(ChildOutcome::Existing(existing.id));
        }

        self.counter += 1;
        let id = self.counter;
        let node = DocumentNode {
            id,
            parent_id: Some(parent_id),
            title: title.to_string(),
            content: content.to_string(),
            kind,
            children: Vec::new(),
        };
        self.nodes.insert(id, node);
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.push(id);
        }
        Ok(ChildOutcome::Created(id))
    }

    pub fn select(&mut self, id: NodeId) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&id) {
            return Err(EngineError::NodeNotFound(id));
        }
        self.current_id = Some(id);
        Ok(())
    }

    /// Delete a node together with its entire subtree.
    ///
    /// The root cannot be deleted. When the active node is inside the
    /// deleted subtree, selection falls back to the parent, else the root,
    /// else any remaining node.
    pub fn delete(&mut self, id: NodeId) -> Result<DeleteOutcome, EngineError> {
        let node = self.nodes.get(&id).ok_or(EngineError::NodeNotFound(id))?;
        let Some(parent_id) = node.parent_id else {
            return Err(EngineError::InvalidOperation(
                "the root node cannot be deleted".to_string(),
            ));
        };

        let mut removed = Vec::new();
        self.collect_subtree(id, &mut removed);
        for removed_id in &removed {
            self.nodes.remove(removed_id);
        }
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.retain(|child| *child != id);
        }

        let mut current_changed = false;
        if let Some(current) = self.current_id {
            if removed.contains(&current) {
                current_changed = true;
                self.current_id = Some(parent_id)
                    .filter(|pid| self.nodes.contains_key(pid))
                    .or_else(|| self.root_id.filter(|rid| self.nodes.contains_key(rid)))
                    .or_else(|| self.nodes.keys().next().copied());
            }
        }

        Ok(DeleteOutcome {
            removed,
            current_changed,
        })
    }

    fn collect_subtree(&self, id: NodeId, acc: &mut Vec<NodeId>) {
        acc.push(id);
        if let Some(node) = self.nodes.get(&id) {
            for child in &node.children {
                self.collect_subtree(*child, acc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_root() -> VersionTree {
        let mut tree = VersionTree::new();
        tree.reset_with_root("root content", "Original text");
        tree
    }

    #[test]
    fn reset_replaces_everything_and_restarts_ids() {
        let mut tree = tree_with_root();
        tree.create_child(1, "child", "text", NodeKind::Summary).unwrap();
        assert_eq!(tree.len(), 2);

        let root = tree.reset_with_root("fresh", "Original text");
        assert_eq!(root, 1);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.counter(), 1);
        assert_eq!(tree.current_id(), Some(1));
    }

    #[test]
    fn create_child_is_idempotent_for_identical_input() {
        let mut tree = tree_with_root();
        let first = tree
            .create_child(1, "Photosynthesis", "Plants make sugar.", NodeKind::Summary)
            .unwrap();
        let second = tree
            .create_child(1, "Photosynthesis", "Plants make sugar.", NodeKind::Summary)
            .unwrap();

        assert!(matches!(first, ChildOutcome::Created(_)));
        assert_eq!(second, ChildOutcome::Existing(first.node_id()));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn sibling_duplicate_matches_on_title_alone() {
        let mut tree = tree_with_root();
        let first = tree
            .create_child(1, "Same title", "first body", NodeKind::Summary)
            .unwrap();
        let second = tree
            .create_child(1, "  same   TITLE ", "different body", NodeKind::Explanation)
            .unwrap();

        assert_eq!(second, ChildOutcome::Existing(first.node_id()));
    }

    #[test]
    fn global_duplicate_wins_over_new_allocation_anywhere_in_tree() {
        let mut tree = tree_with_root();
        let child = tree
            .create_child(1, "Topic", "body", NodeKind::Summary)
            .unwrap()
            .node_id();
        let grandchild = tree
            .create_child(child, "Deep", "deep body", NodeKind::Explanation)
            .unwrap()
            .node_id();

        // Same title+content under a different parent resolves to the
        // existing node instead of creating a sibling copy.
        let dup = tree
            .create_child(1, "Deep", "deep body", NodeKind::Explanation)
            .unwrap();
        assert_eq!(dup, ChildOutcome::Existing(grandchild));
    }

    #[test]
    fn delete_cascades_and_falls_back_to_parent() {
        let mut tree = tree_with_root();
        let child = tree
            .create_child(1, "child", "c", NodeKind::Summary)
            .unwrap()
            .node_id();
        let grandchild = tree
            .create_child(child, "grandchild", "g", NodeKind::Summary)
            .unwrap()
            .node_id();
        let great = tree
            .create_child(grandchild, "great", "gg", NodeKind::Summary)
            .unwrap()
            .node_id();
        tree.select(great).unwrap();

        let outcome = tree.delete(child).unwrap();

        assert_eq!(outcome.removed, vec![child, grandchild, great]);
        assert!(outcome.current_changed);
        assert_eq!(tree.current_id(), Some(1));
        assert_eq!(tree.len(), 1);
        assert!(tree.get(1).unwrap().children.is_empty());
    }

    #[test]
    fn deleting_root_fails_and_changes_nothing() {
        let mut tree = tree_with_root();
        tree.create_child(1, "child", "c", NodeKind::Summary).unwrap();

        let err = tree.delete(1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation(_)));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.root_id(), Some(1));
    }

    #[test]
    fn from_parts_recovers_and_repairs() {
        let mut source = tree_with_root();
        let child = source
            .create_child(1, "child", "c", NodeKind::Summary)
            .unwrap()
            .node_id();

        // Stale current id falls back to root; lagging counter catches up.
        let tree = VersionTree::from_parts(source.nodes().clone(), Some(1), Some(99), 1);
        assert_eq!(tree.current_id(), Some(1));
        assert_eq!(tree.counter(), child);

        // Missing root empties the tree.
        let tree = VersionTree::from_parts(source.nodes().clone(), Some(42), Some(1), 5);
        assert!(tree.is_empty());
    }
}
