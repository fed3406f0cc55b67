//! Session context: all mutable state of one reading session.
//!
//! Counters, the active-node pointer, the annotation records, the knowledge
//! collection, and the consolidation cache all live here and are threaded
//! through every operation. Each mutating operation ends with a save point
//! against the [`Store`]; persistence failures are logged and swallowed so
//! the session keeps working in memory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::anchor::{self, ResolvedSpan};
use crate::engine::collection::CollectionStore;
use crate::engine::signature;
use crate::engine::tree::{ChildOutcome, DeleteOutcome, VersionTree};
use crate::engine::EngineError;
use crate::models::{
    is_placeholder, Annotation, AnnotationKind, Card, CollectionItem, ConsolidatedView,
    DocumentNode, NodeId, EMPTY_COLLECTION_TEXT,
};
use crate::store::{bucket, Store};

/// Title given to the root node of a fresh question.
pub const ROOT_TITLE: &str = "Original text";

/// What a consolidation request resolved to.
#[derive(Debug, Clone)]
pub enum Consolidation {
    /// Nothing collected yet: show the fixed placeholder, skip the external
    /// consolidator.
    Placeholder(&'static str),
    /// A fresh cached view was reused.
    Cached(String),
    /// The collection must go to the external consolidator; commit the
    /// result with [`SessionEngine::install_consolidated`].
    Pending(Vec<CollectionItem>),
}

/// Serializable view of the whole session, for status endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub root_id: Option<NodeId>,
    pub current_id: Option<NodeId>,
    pub node_count: usize,
    pub annotations: Vec<Annotation>,
    pub spans: Vec<ResolvedSpan>,
    pub cards: Vec<Card>,
    pub collection: Vec<CollectionItem>,
    pub auto_submit: bool,
    pub consolidated_active: bool,
    pub has_consolidated: bool,
    pub consolidated_stale: bool,
}

pub struct SessionEngine {
    session_id: Uuid,
    store: Store,
    tree: VersionTree,
    annotations: Vec<Annotation>,
    collection: CollectionStore,
    cards: Vec<Card>,
    consolidated: ConsolidatedView,
    consolidated_active: bool,
    auto_submit: bool,
    selection_counter: u64,
}

impl SessionEngine {
    /// Restore a session from the store. Corrupt or missing buckets fall
    /// back to empty defaults with a warning; they never fail the load.
    pub fn load(store: Store) -> Self {
        let nodes = read_bucket(store.get_tree_nodes(), bucket::TREE_NODES).unwrap_or_default();
        let root_id = read_bucket(store.get_tree_root_id(), bucket::TREE_ROOT_ID);
        let current_id = read_bucket(store.get_tree_current_id(), bucket::TREE_CURRENT_ID);
        let counter =
            read_bucket(store.get_tree_counter(), bucket::TREE_NODE_COUNTER).unwrap_or(1);
        let tree = VersionTree::from_parts(nodes, root_id, current_id, counter);

        let annotations =
            read_bucket(store.get_annotations(), bucket::ANNOTATIONS).unwrap_or_default();
        let collection = CollectionStore::from_items(
            read_bucket(store.get_collections(), bucket::COLLECTIONS).unwrap_or_default(),
        );

        let mut consolidated = ConsolidatedView {
            text: read_bucket(store.get_consolidated_text(), bucket::CONSOLIDATED_TEXT)
                .unwrap_or_default(),
            signature: read_bucket(
                store.get_consolidated_signature(),
                bucket::CONSOLIDATED_SIGNATURE,
            )
            .unwrap_or_default(),
        };
        // A stored placeholder was never a real consolidation; drop it.
        if !consolidated.text.is_empty() && is_placeholder(&consolidated.text) {
            best_effort(store.clear_consolidated(), bucket::CONSOLIDATED_TEXT);
            consolidated = ConsolidatedView::default();
        }

        let auto_submit =
            read_bucket(store.get_auto_submit(), bucket::SESSION_AUTO_SUBMIT).unwrap_or(false);
        let selection_counter = read_bucket(
            store.get_selection_counter(),
            bucket::SESSION_SELECTION_COUNTER,
        )
        .unwrap_or(1);

        Self {
            session_id: Uuid::new_v4(),
            store,
            tree,
            annotations,
            collection,
            cards: Vec::new(),
            consolidated,
            consolidated_active: false,
            auto_submit,
            selection_counter,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn tree(&self) -> &VersionTree {
        &self.tree
    }

    pub fn collection(&self) -> &CollectionStore {
        &self.collection
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn auto_submit(&self) -> bool {
        self.auto_submit
    }

    pub fn consolidated_active(&self) -> bool {
        self.consolidated_active
    }

    pub fn current_node(&self) -> Option<&DocumentNode> {
        self.tree.current()
    }

    /// Text of the active view: the consolidated view when selected,
    /// otherwise the current node's content.
    pub fn current_content(&self) -> Option<&str> {
        if self.consolidated_active {
            if self.consolidated.is_real() {
                Some(self.consolidated.text.as_str())
            } else {
                Some(EMPTY_COLLECTION_TEXT)
            }
        } else {
            self.tree.current().map(|node| node.content.as_str())
        }
    }

    // ============================================================
    // Question / root document
    // ============================================================

    /// Install a freshly generated answer as the new root document.
    ///
    /// Replaces the entire tree, discards annotations, cards, counters and
    /// the consolidation cache. The collection survives: collected knowledge
    /// belongs to the learner, not to one question.
    pub fn install_root(&mut self, content: &str, title: &str) -> NodeId {
        let root_id = self.tree.reset_with_root(content, title);
        self.annotations.clear();
        self.cards.clear();
        self.selection_counter = 1;
        self.consolidated = ConsolidatedView::default();
        self.consolidated_active = false;

        best_effort(self.store.clear_annotations(), bucket::ANNOTATIONS);
        best_effort(self.store.clear_session(), bucket::SESSION_CONTENT);
        best_effort(self.store.clear_consolidated(), bucket::CONSOLIDATED_TEXT);
        best_effort(
            self.store.set_selection_counter(self.selection_counter),
            bucket::SESSION_SELECTION_COUNTER,
        );
        best_effort(
            self.store.set_session_content(content),
            bucket::SESSION_CONTENT,
        );
        self.persist_tree();
        root_id
    }

    // ============================================================
    // Annotations
    // ============================================================

    /// Record an annotation on the current document.
    ///
    /// The text must be non-blank and occur verbatim in the current node's
    /// content. A `Known` annotation is also promoted into the collection
    /// (node-scoped dedup).
    pub fn annotate(
        &mut self,
        text: &str,
        kind: AnnotationKind,
    ) -> Result<Annotation, EngineError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidInput(
                "annotation text is empty".to_string(),
            ));
        }
        let node = self.tree.current().ok_or_else(|| {
            EngineError::InvalidOperation("no document is active".to_string())
        })?;
        if !node.content.contains(trimmed) {
            return Err(EngineError::InvalidInput(
                "text does not occur in the current document".to_string(),
            ));
        }
        let origin_node_id = node.id;

        let id = format!("ann-{}", self.selection_counter);
        self.selection_counter += 1;

        let annotation = Annotation {
            id,
            text: trimmed.to_string(),
            kind,
            origin_node_id,
        };
        self.annotations.push(annotation.clone());

        if kind == AnnotationKind::Known && self.collection.promote(&annotation) {
            self.persist_collection();
        }
        self.persist_annotations();
        best_effort(
            self.store.set_selection_counter(self.selection_counter),
            bucket::SESSION_SELECTION_COUNTER,
        );
        Ok(annotation)
    }

    /// Remove an annotation and everything that shares its id: the matching
    /// collection item and any pending card. Removing an unknown id is a
    /// no-op.
    pub fn remove_annotation(&mut self, id: &str) {
        let before = self.annotations.len();
        self.annotations.retain(|ann| ann.id != id);
        let collection_changed = self.collection.remove(id);
        self.cards.retain(|card| card.id != id);

        if before != self.annotations.len() {
            self.persist_annotations();
        }
        if collection_changed {
            self.persist_collection();
        }
    }

    pub fn list_for_node(&self, node_id: NodeId) -> Vec<Annotation> {
        self.annotations
            .iter()
            .filter(|ann| ann.origin_node_id == node_id)
            .cloned()
            .collect()
    }

    /// The annotation set of the active node: its own records plus any
    /// collection items from it that no longer have a record (their
    /// annotation was superseded but the knowledge stayed collected).
    pub fn active_annotations(&self) -> Vec<Annotation> {
        let Some(current) = self.tree.current_id() else {
            return Vec::new();
        };
        let mut active = self.list_for_node(current);
        for item in self.collection.items_for_node(current) {
            if !active.iter().any(|ann| ann.id == item.id) {
                active.push(item.as_annotation());
            }
        }
        active
    }

    /// Anchor the active annotation set onto the current document text.
    pub fn resolved_spans(&self) -> Vec<ResolvedSpan> {
        if self.consolidated_active {
            return Vec::new();
        }
        match self.tree.current() {
            Some(node) => anchor::resolve(&node.content, &self.active_annotations()),
            None => Vec::new(),
        }
    }

    // ============================================================
    // Cards
    // ============================================================

    /// Annotations of the active node that still need an annotator pass.
    pub fn pending_card_annotations(&self) -> Vec<Annotation> {
        self.active_annotations()
            .into_iter()
            .filter(|ann| ann.kind.produces_card())
            .collect()
    }

    /// Commit a completed card batch. Called only after every external call
    /// in the batch succeeded; a failed batch commits nothing.
    pub fn set_cards(&mut self, cards: Vec<Card>) {
        self.cards = cards;
    }

    /// Promote a pending card into a child of the current node, then
    /// navigate to it (the dedup checks may navigate to an existing node
    /// instead of creating one).
    pub fn promote_card(&mut self, card_id: &str) -> Result<ChildOutcome, EngineError> {
        let card = self
            .cards
            .iter()
            .find(|card| card.id == card_id)
            .cloned()
            .ok_or_else(|| {
                EngineError::InvalidInput(format!("no pending card with id {card_id}"))
            })?;
        let parent = self.tree.current_id().ok_or_else(|| {
            EngineError::InvalidOperation("no document is active".to_string())
        })?;

        let outcome = self
            .tree
            .create_child(parent, &card.title, &card.content, card.node_kind())?;
        self.select_node(outcome.node_id())?;
        self.persist_tree();
        Ok(outcome)
    }

    // ============================================================
    // Navigation
    // ============================================================

    /// Make a node the active document. Pending cards are discarded and the
    /// consolidated view deactivates; the caller re-resolves annotations.
    pub fn select_node(&mut self, id: NodeId) -> Result<(), EngineError> {
        self.tree.select(id)?;
        self.consolidated_active = false;
        self.cards.clear();

        best_effort(
            self.store.set_tree_current_id(id),
            bucket::TREE_CURRENT_ID,
        );
        if let Some(node) = self.tree.current() {
            best_effort(
                self.store.set_session_content(&node.content),
                bucket::SESSION_CONTENT,
            );
        }
        Ok(())
    }

    /// Delete a node and its subtree, purging the annotations and collection
    /// items that originated anywhere inside it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<DeleteOutcome, EngineError> {
        let outcome = self.tree.delete(id)?;

        self.annotations
            .retain(|ann| !outcome.removed.contains(&ann.origin_node_id));
        self.collection.remove_for_nodes(&outcome.removed);
        if outcome.current_changed {
            self.cards.clear();
        }

        self.persist_annotations();
        self.persist_collection();
        self.persist_tree();
        Ok(outcome)
    }

    // ============================================================
    // Collection
    // ============================================================

    pub fn reorder_collection(&mut self, from: usize, to: usize) -> bool {
        let moved = self.collection.reorder(from, to);
        if moved {
            self.persist_collection();
        }
        moved
    }

    /// Where a collection item lives: the node to select and the annotation
    /// id to focus once there.
    pub fn locate_collected(&self, id: &str) -> Option<(NodeId, String)> {
        self.collection
            .get(id)
            .map(|item| (item.origin_node_id, item.id.clone()))
    }

    pub fn set_auto_submit(&mut self, enabled: bool) {
        self.auto_submit = enabled;
        best_effort(
            self.store.set_auto_submit(enabled),
            bucket::SESSION_AUTO_SUBMIT,
        );
    }

    // ============================================================
    // Consolidation
    // ============================================================

    pub fn has_consolidated(&self) -> bool {
        self.consolidated.is_real()
    }

    pub fn is_consolidation_stale(&self) -> bool {
        signature::is_stale(
            &self.consolidated.signature,
            &self.consolidated.text,
            self.collection.items(),
        )
    }

    /// Switch to the consolidated view.
    ///
    /// Without `force`, a real cached consolidation is reused as-is. An
    /// empty collection yields the fixed placeholder and never reaches the
    /// external consolidator. Otherwise the caller must run the returned
    /// items through the consolidator and commit with
    /// [`install_consolidated`](Self::install_consolidated); until then no
    /// state changes beyond discarding pending cards.
    pub fn select_consolidated(&mut self, force: bool) -> Consolidation {
        self.cards.clear();
        if !force && self.consolidated.is_real() {
            self.consolidated_active = true;
            return Consolidation::Cached(self.consolidated.text.clone());
        }
        if self.collection.is_empty() {
            self.consolidated_active = true;
            return Consolidation::Placeholder(EMPTY_COLLECTION_TEXT);
        }
        Consolidation::Pending(self.collection.items().to_vec())
    }

    /// Commit a consolidation produced by the external service and record
    /// the collection signature it was generated from.
    pub fn install_consolidated(&mut self, text: String) {
        self.consolidated = ConsolidatedView {
            signature: signature::compute_signature(self.collection.items()),
            text,
        };
        self.consolidated_active = true;

        best_effort(
            self.store.set_consolidated_text(&self.consolidated.text),
            bucket::CONSOLIDATED_TEXT,
        );
        best_effort(
            self.store
                .set_consolidated_signature(&self.consolidated.signature),
            bucket::CONSOLIDATED_SIGNATURE,
        );
    }

    // ============================================================
    // Snapshot
    // ============================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            root_id: self.tree.root_id(),
            current_id: self.tree.current_id(),
            node_count: self.tree.len(),
            annotations: self.active_annotations(),
            spans: self.resolved_spans(),
            cards: self.cards.clone(),
            collection: self.collection.items().to_vec(),
            auto_submit: self.auto_submit,
            consolidated_active: self.consolidated_active,
            has_consolidated: self.has_consolidated(),
            consolidated_stale: self.is_consolidation_stale(),
        }
    }

    // ============================================================
    // Save points
    // ============================================================

    fn persist_tree(&self) {
        best_effort(
            self.store.set_tree_nodes(self.tree.nodes()),
            bucket::TREE_NODES,
        );
        if let Some(id) = self.tree.root_id() {
            best_effort(self.store.set_tree_root_id(id), bucket::TREE_ROOT_ID);
        }
        if let Some(id) = self.tree.current_id() {
            best_effort(self.store.set_tree_current_id(id), bucket::TREE_CURRENT_ID);
        }
        best_effort(
            self.store.set_tree_counter(self.tree.counter()),
            bucket::TREE_NODE_COUNTER,
        );
    }

    fn persist_annotations(&self) {
        best_effort(
            self.store.set_annotations(&self.annotations),
            bucket::ANNOTATIONS,
        );
    }

    fn persist_collection(&self) {
        best_effort(
            self.store.set_collections(self.collection.items()),
            bucket::COLLECTIONS,
        );
    }
}

/// Read a bucket, degrading a failed load to "nothing stored".
fn read_bucket<T>(result: anyhow::Result<Option<T>>, bucket: &str) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(bucket, error = %err, "failed to load bucket; starting empty");
            None
        }
    }
}

/// Persistence is best-effort: log the failure and keep the in-memory state.
fn best_effort(result: anyhow::Result<()>, bucket: &str) {
    if let Err(err) = result {
        tracing::warn!(bucket, error = %err, "persist failed; keeping in-memory state");
    }
}
