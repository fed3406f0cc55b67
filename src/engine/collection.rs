//! The knowledge collection: "known" annotations promoted into a
//! deduplicated, user-ordered list.

use crate::models::{normalize_text, Annotation, CollectionItem, NodeId};

/// Ordered list of collected knowledge items.
///
/// Order is user-controlled (drag reordering) and is what consolidation
/// receives. Dedup on promotion is scoped to the origin node: the same
/// passage collected in two branches counts twice.
#[derive(Debug, Clone, Default)]
pub struct CollectionStore {
    items: Vec<CollectionItem>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<CollectionItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Promote a known annotation. Returns `false` when an equivalent item
    /// (same origin node, normalized-equal text) already exists.
    pub fn promote(&mut self, annotation: &Annotation) -> bool {
        let wanted = normalize_text(&annotation.text);
        let exists = self.items.iter().any(|item| {
            item.origin_node_id == annotation.origin_node_id
                && normalize_text(&item.text) == wanted
        });
        if exists {
            return false;
        }
        self.items.push(CollectionItem::from_annotation(annotation));
        true
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        before != self.items.len()
    }

    /// Remove every item originating from one of the given nodes. Returns
    /// the number removed.
    pub fn remove_for_nodes(&mut self, node_ids: &[NodeId]) -> usize {
        let before = self.items.len();
        self.items
            .retain(|item| !node_ids.contains(&item.origin_node_id));
        before - self.items.len()
    }

    pub fn get(&self, id: &str) -> Option<&CollectionItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &CollectionItem> {
        self.items
            .iter()
            .filter(move |item| item.origin_node_id == node_id)
    }

    /// Move the item at `from` to position `to`. A pure permutation: ids and
    /// timestamps are untouched. Out-of-range indexes return `false` without
    /// effect.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        if from != to {
            let item = self.items.remove(from);
            self.items.insert(to, item);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnnotationKind;

    fn known(id: &str, text: &str, node: NodeId) -> Annotation {
        Annotation {
            id: id.to_string(),
            text: text.to_string(),
            kind: AnnotationKind::Known,
            origin_node_id: node,
        }
    }

    #[test]
    fn promote_dedups_per_node_but_not_across_nodes() {
        let mut store = CollectionStore::new();
        assert!(store.promote(&known("ann-1", "The water cycle", 1)));
        assert!(!store.promote(&known("ann-2", "  the   WATER cycle ", 1)));
        assert!(store.promote(&known("ann-3", "The water cycle", 2)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn reorder_is_a_pure_permutation() {
        let mut store = CollectionStore::new();
        store.promote(&known("ann-1", "a", 1));
        store.promote(&known("ann-2", "b", 1));
        store.promote(&known("ann-3", "c", 1));
        let stamps: Vec<_> = store.items().iter().map(|i| i.created_at).collect();

        assert!(store.reorder(0, 2));
        let ids: Vec<_> = store.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ann-2", "ann-3", "ann-1"]);

        let mut reordered: Vec<_> = store.items().iter().map(|i| i.created_at).collect();
        reordered.sort();
        let mut original = stamps.clone();
        original.sort();
        assert_eq!(reordered, original);

        assert!(!store.reorder(0, 3));
        assert!(store.reorder(1, 1));
    }

    #[test]
    fn remove_for_nodes_purges_only_matching_origins() {
        let mut store = CollectionStore::new();
        store.promote(&known("ann-1", "a", 1));
        store.promote(&known("ann-2", "b", 2));
        store.promote(&known("ann-3", "c", 3));

        assert_eq!(store.remove_for_nodes(&[2, 3]), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].id, "ann-1");
    }
}
