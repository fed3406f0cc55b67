//! Text anchor resolution.
//!
//! Annotations are stored by content, not by position: each record carries
//! the verbatim passage it marked. When a node is (re)rendered, this module
//! maps every record back onto a span of the node's plain text. Mapping the
//! resulting byte offsets onto a presentation layer (rich text, DOM, TUI) is
//! the caller's concern.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::models::Annotation;

/// A resolved annotation span: byte offsets into the plain text it was
/// resolved against. Accepted spans never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSpan {
    pub annotation_id: String,
    pub start: usize,
    pub end: usize,
}

/// Map annotation records onto non-overlapping spans of `plain_text`.
///
/// Annotations anchor in order of the last occurrence of their text, right
/// to left; within that order each annotation takes the leftmost occurrence
/// that does not overlap an already accepted span, so duplicate passages
/// spread across their occurrences instead of piling onto the first one.
///
/// An annotation whose text has no free occurrence (or no occurrence at
/// all) is unresolved: it is left out of the result and logged, never an
/// error, and the caller keeps it in the store.
pub fn resolve(plain_text: &str, annotations: &[Annotation]) -> Vec<ResolvedSpan> {
    let mut ordered: Vec<&Annotation> = annotations
        .iter()
        .filter(|ann| !ann.text.is_empty())
        .collect();
    ordered.sort_by_key(|ann| Reverse(plain_text.rfind(ann.text.as_str()).unwrap_or(0)));

    let mut accepted: Vec<ResolvedSpan> = Vec::new();
    for ann in ordered {
        match first_free_occurrence(plain_text, &ann.text, &accepted) {
            Some(start) => accepted.push(ResolvedSpan {
                annotation_id: ann.id.clone(),
                start,
                end: start + ann.text.len(),
            }),
            None => {
                tracing::warn!(annotation = %ann.id, text = %ann.text, "annotation could not be anchored");
            }
        }
    }
    accepted
}

/// Leftmost occurrence of `needle` that overlaps none of `used`, scanning
/// from the start of the text.
fn first_free_occurrence(text: &str, needle: &str, used: &[ResolvedSpan]) -> Option<usize> {
    let mut from = 0;
    while from <= text.len() {
        let rel = text[from..].find(needle)?;
        let start = from + rel;
        let end = start + needle.len();
        if !used.iter().any(|span| start < span.end && end > span.start) {
            return Some(start);
        }
        // Advance past the first char of the rejected occurrence, keeping
        // `from` on a char boundary.
        let step = text[start..].chars().next().map_or(1, char::len_utf8);
        from = start + step;
    }
    None
}
