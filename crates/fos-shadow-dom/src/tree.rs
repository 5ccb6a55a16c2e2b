//! DOM Tree (arena-based allocation)
//!
//! Raw link primitives. They keep `first_child`/`last_child` and the sibling
//! list consistent but perform no validation and no notification; the
//! mutation algorithms in `container` are the only callers.

use std::ops::{Index, IndexMut};

use crate::{Node, NodeId};

/// Arena-based DOM tree
#[derive(Debug, Default)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a new empty DOM tree
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Whether `id` was allocated by this tree
    pub fn contains(&self, id: NodeId) -> bool {
        id.is_valid() && id.index() < self.nodes.len()
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Link `child` as the last child of `parent`
    pub(crate) fn append_raw(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(!self[child].parent.is_valid());
        let last = self[parent].last_child;
        {
            let node = &mut self[child];
            node.parent = parent;
            node.prev_sibling = last;
            node.next_sibling = NodeId::NONE;
        }
        if last.is_valid() {
            self[last].next_sibling = child;
        } else {
            self[parent].first_child = child;
        }
        self[parent].last_child = child;
    }

    /// Link `child` under `parent` immediately before `next`
    pub(crate) fn insert_before_raw(&mut self, parent: NodeId, child: NodeId, next: NodeId) {
        if !next.is_valid() {
            self.append_raw(parent, child);
            return;
        }
        debug_assert_eq!(self[next].parent, parent);
        debug_assert!(!self[child].parent.is_valid());
        let prev = self[next].prev_sibling;
        {
            let node = &mut self[child];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = next;
        }
        self[next].prev_sibling = child;
        if prev.is_valid() {
            self[prev].next_sibling = child;
        } else {
            self[parent].first_child = child;
        }
    }

    /// Unlink `child` from its parent's child list
    pub(crate) fn remove_raw(&mut self, child: NodeId) {
        let (parent, prev, next) = {
            let node = &self[child];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        if !parent.is_valid() {
            return;
        }
        if prev.is_valid() {
            self[prev].next_sibling = next;
        } else {
            self[parent].first_child = next;
        }
        if next.is_valid() {
            self[next].prev_sibling = prev;
        } else {
            self[parent].last_child = prev;
        }
        let node = &mut self[child];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    /// Iterate the children of `parent`
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(parent).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    /// Iterate light-tree ancestors of `node`, nearest first
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(node).and_then(Node::parent_node),
        }
    }

    /// Verify the child list of `parent`: sibling links are mutually
    /// consistent, agree with `first_child`/`last_child`, and every child
    /// points back at `parent`.
    pub fn check_child_list(&self, parent: NodeId) -> bool {
        let Some(node) = self.get(parent) else {
            return false;
        };
        let mut prev = NodeId::NONE;
        let mut current = node.first_child;
        let mut steps = 0usize;
        while current.is_valid() {
            let Some(child) = self.get(current) else {
                return false;
            };
            if child.parent != parent || child.prev_sibling != prev {
                return false;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            prev = current;
            current = child.next_sibling;
        }
        prev == node.last_child
    }
}

impl Index<NodeId> for DomTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for DomTree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

/// Iterator over the children of a node
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next.get()?;
        self.next = self.tree[current].next_sibling;
        Some(current)
    }
}

/// Iterator over light-tree ancestors
pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree[current].parent_node();
        Some(current)
    }
}
