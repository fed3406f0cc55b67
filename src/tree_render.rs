//! ASCII rendering of the version tree.

use crate::engine::{CollectionStore, VersionTree};
use crate::models::{DocumentNode, NodeKind};

const ROOT: char = '●';
const SUMMARY: char = '○';
const EXPLANATION: char = '◇';
const OTHER: char = '•';

/// Marker appended to nodes with collected knowledge items.
const COLLECTED: &str = " *";

fn kind_symbol(kind: NodeKind) -> char {
    match kind {
        NodeKind::Root => ROOT,
        NodeKind::Summary => SUMMARY,
        NodeKind::Explanation => EXPLANATION,
        NodeKind::Other => OTHER,
    }
}

/// Render the version tree as ASCII art.
///
/// Example output:
/// ```text
/// The water cycle describes how water moves between the ocean…
/// ├── ○ evaporation and condensation *
/// │   └── ◇ condensation nuclei
/// └── ◇ groundwater recharge
/// ```
pub fn render_tree(tree: &VersionTree, collection: &CollectionStore) -> String {
    let mut output = String::new();
    let Some(root_id) = tree.root_id() else {
        return output;
    };
    if let Some(root) = tree.get(root_id) {
        output.push_str(&root.display_title());
        if has_collected(collection, root) {
            output.push_str(COLLECTED);
        }
        output.push('\n');

        for (i, child_id) in root.children.iter().enumerate() {
            let is_last = i == root.children.len() - 1;
            render_node(&mut output, tree, collection, *child_id, "", is_last);
        }
    }
    output
}

fn has_collected(collection: &CollectionStore, node: &DocumentNode) -> bool {
    collection.items_for_node(node.id).next().is_some()
}

/// Recursively render a node and its children.
fn render_node(
    output: &mut String,
    tree: &VersionTree,
    collection: &CollectionStore,
    id: u64,
    prefix: &str,
    is_last: bool,
) {
    let Some(node) = tree.get(id) else {
        return;
    };

    let branch = if is_last { "└── " } else { "├── " };
    output.push_str(prefix);
    output.push_str(branch);
    output.push(kind_symbol(node.kind));
    output.push(' ');
    output.push_str(&node.display_title());
    if has_collected(collection, node) {
        output.push_str(COLLECTED);
    }
    output.push('\n');

    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
    for (i, child_id) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, tree, collection, *child_id, &child_prefix, child_is_last);
    }
}
