use serde::{Deserialize, Serialize};

/// Fixed text shown in place of a consolidation when nothing has been
/// collected yet. The external consolidator is not called for it, and it is
/// never cached as a real consolidation.
pub const EMPTY_COLLECTION_TEXT: &str = "No knowledge items collected yet. \
Select text and mark as 'Collected' to build your consolidated view.";

/// The cached synthesis of all collected knowledge items.
///
/// `signature` fingerprints the collection at generation time; the view is
/// fresh exactly while the collection's current signature matches it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidatedView {
    pub text: String,
    pub signature: String,
}

impl ConsolidatedView {
    /// True when `text` holds a real consolidation rather than nothing or
    /// the empty-collection placeholder.
    pub fn is_real(&self) -> bool {
        !self.text.trim().is_empty() && !is_placeholder(&self.text)
    }
}

/// Recognizes the empty-collection placeholder, which must never be treated
/// as a cached consolidation.
pub fn is_placeholder(text: &str) -> bool {
    text.to_lowercase()
        .contains("no knowledge items collected yet")
}
