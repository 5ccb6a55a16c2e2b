//! Composed tree walker
//!
//! A cursor over the composed tree: shadow hosts show their shadow root's
//! children, active insertion points are replaced by their distributed nodes
//! (or their fallback children when nothing was distributed), and projected
//! nodes have the insertion point's position as parent and siblings.
//!
//! The walker holds no state besides its position. All structure comes
//! from the light tree and the cached distributions.

use crate::{Document, NodeId};

/// Whether a walk may leave a shadow tree through its host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    CrossUpperBoundary,
    DoNotCrossUpperBoundary,
}

/// What a parent step went through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParentDetails {
    /// First insertion point the child was projected through
    pub insertion_point: Option<NodeId>,
    /// A crossed shadow root or insertion point resets inheritance
    pub reset_style_inheritance: bool,
    /// The child is not part of the composed tree (undistributed light
    /// child, or fallback content of an insertion point that has a
    /// distribution)
    pub out_of_composition: bool,
}

impl ParentDetails {
    fn did_traverse_insertion_point(&mut self, insertion_point: NodeId) {
        if self.insertion_point.is_none() {
            self.insertion_point = Some(insertion_point);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Where distribution put a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Projection {
    /// Not a candidate for distribution
    Light,
    /// Shown at this (final) insertion point
    Projected(NodeId),
    /// Candidate for distribution but claimed by nothing
    Unassigned,
}

impl Document {
    /// Parent used to decide distribution: fallback children of an active
    /// insertion point are pooled by the insertion point's parent
    fn distribution_parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_node(node)?;
        if self.is_active_insertion_point(parent) {
            self.parent_node(parent)
        } else {
            Some(parent)
        }
    }

    /// Follow `node` through every level of redistribution
    pub(crate) fn projection(&self, node: NodeId) -> Projection {
        let mut current = node;
        let mut projected = None;
        while let Some(host) = self
            .distribution_parent(current)
            .filter(|&p| self.is_shadow_host(p))
        {
            match self.assigned_insertion_point(host, node) {
                Some(insertion_point) => {
                    projected = Some(insertion_point);
                    current = insertion_point;
                }
                None if projected.is_none() => return Projection::Unassigned,
                None => break,
            }
        }
        projected.map_or(Projection::Light, Projection::Projected)
    }
}

fn light_child(doc: &Document, node: NodeId, direction: Direction) -> Option<NodeId> {
    match direction {
        Direction::Forward => doc.first_child(node),
        Direction::Backward => doc.last_child(node),
    }
}

fn light_sibling(doc: &Document, node: NodeId, direction: Direction) -> Option<NodeId> {
    match direction {
        Direction::Forward => doc.next_sibling(node),
        Direction::Backward => doc.previous_sibling(node),
    }
}

fn traverse_child(doc: &Document, node: NodeId, direction: Direction) -> Option<NodeId> {
    let parent = doc.shadow_root(node).unwrap_or(node);
    traverse_light_children(doc, parent, direction)
}

fn traverse_light_children(doc: &Document, node: NodeId, direction: Direction) -> Option<NodeId> {
    traverse_siblings(doc, light_child(doc, node, direction), direction)
}

fn traverse_siblings(doc: &Document, start: Option<NodeId>, direction: Direction) -> Option<NodeId> {
    let mut sibling = start;
    while let Some(node) = sibling {
        if let Some(found) = traverse_node(doc, node, direction) {
            return Some(found);
        }
        sibling = light_sibling(doc, node, direction);
    }
    None
}

/// `node` itself, or for an active insertion point the first composed node
/// it stands for
fn traverse_node(doc: &Document, node: NodeId, direction: Direction) -> Option<NodeId> {
    if !doc.is_active_insertion_point(node) {
        return Some(node);
    }
    if doc.has_distribution(node) {
        let start = match direction {
            Direction::Forward => doc.first_distributed(node),
            Direction::Backward => doc.last_distributed(node),
        };
        traverse_distributed_nodes(doc, start, node, direction)
    } else {
        traverse_light_children(doc, node, direction)
    }
}

fn traverse_distributed_nodes(
    doc: &Document,
    start: Option<NodeId>,
    insertion_point: NodeId,
    direction: Direction,
) -> Option<NodeId> {
    let mut next = start;
    while let Some(node) = next {
        if let Some(found) = traverse_node(doc, node, direction) {
            return Some(found);
        }
        next = distributed_sibling(doc, insertion_point, node, direction);
    }
    None
}

fn distributed_sibling(
    doc: &Document,
    insertion_point: NodeId,
    node: NodeId,
    direction: Direction,
) -> Option<NodeId> {
    match direction {
        Direction::Forward => doc.next_distributed_to(insertion_point, node),
        Direction::Backward => doc.previous_distributed_to(insertion_point, node),
    }
}

/// Composed sibling of `node`: the next distributed node of its insertion
/// point, and once those run out, the sibling of the insertion point
fn traverse_sibling_or_back_to_insertion_point(
    doc: &Document,
    node: NodeId,
    direction: Direction,
) -> Option<NodeId> {
    match doc.projection(node) {
        Projection::Light => traverse_sibling_in_current_tree(doc, node, direction),
        Projection::Unassigned => None,
        Projection::Projected(insertion_point) => {
            let start = distributed_sibling(doc, insertion_point, node, direction);
            traverse_distributed_nodes(doc, start, insertion_point, direction).or_else(|| {
                traverse_sibling_or_back_to_insertion_point(doc, insertion_point, direction)
            })
        }
    }
}

fn traverse_sibling_in_current_tree(
    doc: &Document,
    node: NodeId,
    direction: Direction,
) -> Option<NodeId> {
    traverse_siblings(doc, light_sibling(doc, node, direction), direction)
        .or_else(|| escape_fallback_content_element(doc, node, direction))
}

/// Leave the fallback content of an insertion point
fn escape_fallback_content_element(
    doc: &Document,
    node: NodeId,
    direction: Direction,
) -> Option<NodeId> {
    let parent = doc.parent_node(node)?;
    if doc.is_active_insertion_point(parent) {
        traverse_sibling_or_back_to_insertion_point(doc, parent, direction)
    } else {
        None
    }
}

/// Composed parent of `node`, recording what was crossed in `details`
pub(crate) fn traverse_parent(
    doc: &Document,
    node: NodeId,
    policy: Policy,
    details: &mut ParentDetails,
) -> Option<NodeId> {
    let n = doc.node(node)?;
    if n.is_pseudo_element() {
        return n.parent_or_shadow_host();
    }
    if n.is_shadow_root() {
        if policy == Policy::DoNotCrossUpperBoundary {
            return None;
        }
        details.reset_style_inheritance |= doc.reset_style_inheritance(node).unwrap_or(false);
        return n.parent_or_shadow_host();
    }

    match doc.projection(node) {
        Projection::Projected(insertion_point) => {
            details.did_traverse_insertion_point(insertion_point);
            traverse_parent(doc, insertion_point, policy, details)
        }
        Projection::Unassigned => {
            details.out_of_composition = true;
            traverse_parent_or_host(doc, node, policy, details)
        }
        Projection::Light => traverse_parent_or_host(doc, node, policy, details),
    }
}

fn traverse_parent_or_host(
    doc: &Document,
    node: NodeId,
    policy: Policy,
    details: &mut ParentDetails,
) -> Option<NodeId> {
    let parent = doc.parent_node(node)?;
    if doc.is_shadow_root(parent) {
        return match policy {
            Policy::DoNotCrossUpperBoundary => Some(parent),
            Policy::CrossUpperBoundary => {
                details.reset_style_inheritance |=
                    doc.reset_style_inheritance(parent).unwrap_or(false);
                doc.parent_or_shadow_host(parent)
            }
        };
    }
    if doc.is_active_insertion_point(parent) {
        // fallback content is only shown while nothing is distributed
        if doc.has_distribution(parent) {
            details.out_of_composition = true;
        }
        return traverse_parent(doc, parent, policy, details);
    }
    Some(parent)
}

/// Cursor over the composed tree
#[derive(Debug, Clone)]
pub struct ComposedShadowTreeWalker<'a> {
    doc: &'a Document,
    node: Option<NodeId>,
    policy: Policy,
    start: NodeId,
}

impl<'a> ComposedShadowTreeWalker<'a> {
    pub fn new(doc: &'a Document, node: NodeId, policy: Policy) -> Self {
        let walker = Self {
            doc,
            node: Some(node),
            policy,
            start: node,
        };
        walker.assert_position();
        walker
    }

    /// Current position; `None` once a step walked off the tree
    pub fn get(&self) -> Option<NodeId> {
        self.node
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    fn step(&mut self, f: impl FnOnce(&Self, NodeId) -> Option<NodeId>) -> Option<NodeId> {
        let node = self.node?;
        self.node = f(self, node);
        self.assert_position();
        self.node
    }

    pub fn first_child(&mut self) -> Option<NodeId> {
        self.step(|w, n| traverse_child(w.doc, n, Direction::Forward))
    }

    pub fn last_child(&mut self) -> Option<NodeId> {
        self.step(|w, n| traverse_child(w.doc, n, Direction::Backward))
    }

    pub fn next_sibling(&mut self) -> Option<NodeId> {
        self.step(|w, n| traverse_sibling_or_back_to_insertion_point(w.doc, n, Direction::Forward))
    }

    pub fn previous_sibling(&mut self) -> Option<NodeId> {
        self.step(|w, n| traverse_sibling_or_back_to_insertion_point(w.doc, n, Direction::Backward))
    }

    pub fn parent(&mut self) -> Option<NodeId> {
        self.step(|w, n| w.parent_of(n))
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        traverse_parent(self.doc, node, self.policy, &mut ParentDetails::default())
    }

    /// Next node in composed pre-order
    pub fn next(&mut self) -> Option<NodeId> {
        self.step(|w, n| {
            let doc = w.doc;
            if let Some(child) = traverse_child(doc, n, Direction::Forward) {
                return Some(child);
            }
            let mut current = Some(n);
            while let Some(c) = current {
                if let Some(sibling) = traverse_sibling_or_back_to_insertion_point(doc, c, Direction::Forward) {
                    return Some(sibling);
                }
                current = w.parent_of(c);
            }
            None
        })
    }

    /// Previous node in composed pre-order
    pub fn previous(&mut self) -> Option<NodeId> {
        self.step(|w, n| {
            let doc = w.doc;
            match traverse_sibling_or_back_to_insertion_point(doc, n, Direction::Backward) {
                Some(mut current) => {
                    while let Some(child) = traverse_child(doc, current, Direction::Backward) {
                        current = child;
                    }
                    Some(current)
                }
                None => w.parent_of(n),
            }
        })
    }

    fn assert_position(&self) {
        let Some(node) = self.node else {
            return;
        };
        debug_assert!(
            !self.doc.is_active_insertion_point(node),
            "walker rests on active insertion point {}",
            node
        );
        debug_assert!(
            !self.doc.is_shadow_root(node)
                || node == self.start
                || self.policy == Policy::DoNotCrossUpperBoundary,
            "walker rests on shadow root {}",
            node
        );
    }
}
