use serde::{Deserialize, Serialize};

use super::annotation::{AnnotationId, AnnotationKind};
use super::node::NodeKind;

/// Transient result of processing a summarize/unfamiliar annotation through
/// the external annotator.
///
/// Cards share the id of the annotation they were derived from and exist
/// only until the next navigation. Promoting a card turns it into a child
/// node of the current document; otherwise it is simply discarded. Cards
/// are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: AnnotationId,
    /// The annotated passage, used as the branch title.
    pub title: String,
    pub kind: AnnotationKind,
    /// The annotator's output for the passage.
    pub content: String,
}

impl Card {
    /// Node kind a promotion of this card produces.
    pub fn node_kind(&self) -> NodeKind {
        match self.kind {
            AnnotationKind::Summarize => NodeKind::Summary,
            AnnotationKind::Unfamiliar => NodeKind::Explanation,
            AnnotationKind::Known => NodeKind::Other,
        }
    }
}
