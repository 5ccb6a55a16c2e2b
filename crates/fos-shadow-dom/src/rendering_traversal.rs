//! Composed-tree traversal for rendering
//!
//! Thin wrappers over [`ComposedShadowTreeWalker`] that always cross shadow
//! boundaries. The renderer of a node hangs off the renderer of
//! [`parent`].

use crate::composed_walker::traverse_parent;
pub use crate::composed_walker::ParentDetails;
use crate::{ComposedShadowTreeWalker, Document, NodeId, Policy};

/// Rendering parent of `node`
pub fn parent(doc: &Document, node: NodeId) -> Option<NodeId> {
    parent_with_details(doc, node).0
}

/// Rendering parent of `node` plus what the step crossed
pub fn parent_with_details(doc: &Document, node: NodeId) -> (Option<NodeId>, ParentDetails) {
    let mut details = ParentDetails::default();
    let parent = traverse_parent(doc, node, Policy::CrossUpperBoundary, &mut details);
    (parent, details)
}

pub fn first_child(doc: &Document, node: NodeId) -> Option<NodeId> {
    ComposedShadowTreeWalker::new(doc, node, Policy::CrossUpperBoundary).first_child()
}

pub fn next_sibling(doc: &Document, node: NodeId) -> Option<NodeId> {
    ComposedShadowTreeWalker::new(doc, node, Policy::CrossUpperBoundary).next_sibling()
}

pub fn previous_sibling(doc: &Document, node: NodeId) -> Option<NodeId> {
    ComposedShadowTreeWalker::new(doc, node, Policy::CrossUpperBoundary).previous_sibling()
}

/// Next node in composed pre-order, bounded by `stay_within`
pub fn next(doc: &Document, node: NodeId, stay_within: Option<NodeId>) -> Option<NodeId> {
    if let Some(child) = first_child(doc, node) {
        return Some(child);
    }
    let mut current = node;
    loop {
        if Some(current) == stay_within {
            return None;
        }
        if let Some(sibling) = next_sibling(doc, current) {
            return Some(sibling);
        }
        current = parent(doc, current)?;
    }
}
