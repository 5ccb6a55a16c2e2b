//! Light-tree traversal
//!
//! Pre-order and post-order steps over parent/child/sibling links only.
//! Shadow roots are never entered; a walk started inside a shadow tree ends
//! at its root. `stay_within` bounds a walk to one subtree.

use crate::{Document, NodeId};

/// Next node in pre-order
pub fn next(doc: &Document, node: NodeId, stay_within: Option<NodeId>) -> Option<NodeId> {
    doc.first_child(node)
        .or_else(|| next_skipping_children(doc, node, stay_within))
}

/// Next node in pre-order, skipping the descendants of `node`
pub fn next_skipping_children(
    doc: &Document,
    node: NodeId,
    stay_within: Option<NodeId>,
) -> Option<NodeId> {
    let mut current = node;
    loop {
        if Some(current) == stay_within {
            return None;
        }
        if let Some(sibling) = doc.next_sibling(current) {
            return Some(sibling);
        }
        current = doc.parent_node(current)?;
    }
}

/// Previous node in pre-order
pub fn previous(doc: &Document, node: NodeId, stay_within: Option<NodeId>) -> Option<NodeId> {
    if Some(node) == stay_within {
        return None;
    }
    match doc.previous_sibling(node) {
        Some(sibling) => Some(last_within(doc, sibling)),
        None => doc.parent_node(node),
    }
}

/// Deepest last descendant of `node` (the node itself if it has no children)
pub fn last_within(doc: &Document, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(last) = doc.last_child(current) {
        current = last;
    }
    current
}

/// Next node in post-order
pub fn next_post_order(doc: &Document, node: NodeId, stay_within: Option<NodeId>) -> Option<NodeId> {
    if Some(node) == stay_within {
        return None;
    }
    match doc.next_sibling(node) {
        Some(mut sibling) => {
            while let Some(first) = doc.first_child(sibling) {
                sibling = first;
            }
            Some(sibling)
        }
        None => doc.parent_node(node),
    }
}

/// First node of a post-order walk over `root`'s subtree
pub fn first_post_order(doc: &Document, root: NodeId) -> NodeId {
    let mut current = root;
    while let Some(first) = doc.first_child(current) {
        current = first;
    }
    current
}

/// Descendants of `root` in pre-order (excluding `root`)
pub fn descendants(doc: &Document, root: NodeId) -> Descendants<'_> {
    Descendants {
        doc,
        root,
        next: doc.first_child(root),
    }
}

/// Iterator returned by [`descendants`]
#[derive(Debug)]
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = next(self.doc, current, Some(self.root));
        Some(current)
    }
}
