use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Identifier of an annotation: `ann-<n>` from the per-session selection
/// counter, collision-free within a session.
pub type AnnotationId = String;

/// A user-marked span of a document node's text with an associated intent.
///
/// `text` is always a verbatim substring of the origin node's content at the
/// time the annotation was made; the rendered position is recomputed from it
/// on every reload rather than stored. Annotations are never edited in
/// place, only added and removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub text: String,
    pub kind: AnnotationKind,
    pub origin_node_id: NodeId,
}

/// The intent attached to a marked span.
///
/// - `Known`: the reader already knows this; it joins the knowledge collection
/// - `Summarize`: ask the generator for a brief summary of the passage
/// - `Unfamiliar`: ask the generator to explain the passage in simpler terms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Known,
    Summarize,
    Unfamiliar,
}

impl AnnotationKind {
    /// Kinds that produce a derived card via the external annotator.
    pub fn produces_card(self) -> bool {
        matches!(self, Self::Summarize | Self::Unfamiliar)
    }
}

/// Comparison key for duplicate detection: lowercase, whitespace runs
/// collapsed to a single space, trimmed.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
