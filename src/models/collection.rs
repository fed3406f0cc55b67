use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::annotation::{Annotation, AnnotationId, AnnotationKind};
use super::node::NodeId;

/// A "known" annotation promoted into the knowledge collection.
///
/// Collection items outlive the annotation view they came from: they are
/// user-reorderable, carry a creation timestamp, and serve as the input of
/// knowledge consolidation. While both exist, an item and its originating
/// annotation share the same id, and removing either removes both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: AnnotationId,
    pub text: String,
    pub kind: AnnotationKind,
    pub origin_node_id: NodeId,
    pub created_at: DateTime<Utc>,
}

impl CollectionItem {
    pub fn from_annotation(annotation: &Annotation) -> Self {
        Self {
            id: annotation.id.clone(),
            text: annotation.text.clone(),
            kind: annotation.kind,
            origin_node_id: annotation.origin_node_id,
            created_at: Utc::now(),
        }
    }

    /// View of the item as an annotation, used when re-anchoring a node whose
    /// annotation records were superseded by the collection.
    pub fn as_annotation(&self) -> Annotation {
        Annotation {
            id: self.id.clone(),
            text: self.text.clone(),
            kind: self.kind,
            origin_node_id: self.origin_node_id,
        }
    }
}
