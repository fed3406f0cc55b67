use serde::{Deserialize, Serialize};

/// Identifier of a node in the version tree.
///
/// Ids come from a monotonically increasing per-tree counter starting at 1;
/// resetting the tree restarts the counter.
pub type NodeId = u64;

/// Maximum length of a display snippet derived from node content.
const SNIPPET_LEN: usize = 60;

/// One revision of the document in the version tree.
///
/// The root node holds the originally generated answer; every other node is
/// a derived text (a summary or an explanation of a highlighted passage)
/// branched off its parent. Nodes are immutable once created: revising
/// means branching, never editing in place.
///
/// Exactly one node has `parent_id == None`, and `children` lists mirror the
/// `parent_id` back-references, so the structure is always a single
/// connected tree rooted at that node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub title: String,
    pub content: String,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

impl DocumentNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Short whitespace-collapsed preview of the content, for tree displays.
    pub fn snippet(&self) -> String {
        let text = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() <= SNIPPET_LEN {
            return text;
        }
        let mut out: String = text.chars().take(SNIPPET_LEN).collect();
        out.push('…');
        out
    }

    /// Title shown in tree views: the root is labeled by its content
    /// snippet, derived nodes by the passage they were branched from.
    pub fn display_title(&self) -> String {
        if self.is_root() {
            self.snippet()
        } else {
            self.title.clone()
        }
    }
}

/// How a node came to exist.
///
/// - `Root`: the answer generated for the user's question
/// - `Summary`: branched from a "summarize" annotation
/// - `Explanation`: branched from a "need to know more" annotation
/// - `Other`: anything else (reserved)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Summary,
    Explanation,
    Other,
}
