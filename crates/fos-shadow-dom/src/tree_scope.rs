//! Tree scopes
//!
//! A tree scope is the unit of ID lookup and of shadow-boundary tests: the
//! Document, or one ShadowRoot.

use crate::{node_traversal, Document, DomResult, NodeId};

/// Scope a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeScope {
    Document,
    /// Shadow tree rooted at this ShadowRoot
    Shadow(NodeId),
}

impl TreeScope {
    /// Root node of the scope
    pub fn root_node(self) -> NodeId {
        match self {
            TreeScope::Document => NodeId::ROOT,
            TreeScope::Shadow(root) => root,
        }
    }
}

impl Document {
    /// Root of the light tree containing `node` (the node itself if parentless)
    pub fn tree_root(&self, node: NodeId) -> NodeId {
        self.tree.ancestors(node).last().unwrap_or(node)
    }

    /// Scope of `node`. Detached subtrees belong to the document scope.
    pub fn tree_scope(&self, node: NodeId) -> TreeScope {
        match self.containing_shadow_root(node) {
            Some(root) => TreeScope::Shadow(root),
            None => TreeScope::Document,
        }
    }

    /// ShadowRoot whose tree contains `node` (the root itself included)
    pub fn containing_shadow_root(&self, node: NodeId) -> Option<NodeId> {
        if !self.tree.contains(node) {
            return None;
        }
        let root = self.tree_root(node);
        self.tree[root].is_shadow_root().then_some(root)
    }

    pub fn is_in_shadow_tree(&self, node: NodeId) -> bool {
        self.containing_shadow_root(node).is_some()
    }

    /// Host of the shadow tree containing `node`
    pub fn shadow_host(&self, node: NodeId) -> Option<NodeId> {
        let root = self.containing_shadow_root(node)?;
        self.tree[root].parent_or_shadow_host()
    }

    /// Whether `ancestor` is an inclusive ancestor of `node`, following host
    /// links out of shadow trees
    pub fn contains_including_host_elements(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.tree.get(n).and_then(|n| n.parent_or_shadow_host());
        }
        false
    }

    /// First element in `scope` whose `id` attribute equals `id`.
    ///
    /// Fails with `InvalidAccess` for a shadow root that lost its host.
    pub fn get_element_by_id(&self, scope: TreeScope, id: &str) -> DomResult<Option<NodeId>> {
        let root = scope.root_node();
        if let TreeScope::Shadow(shadow_root) = scope {
            self.shadow_root_host(shadow_root)?;
        }
        let found = node_traversal::descendants(self, root).find(|&n| {
            self.tree[n]
                .as_element()
                .is_some_and(|e| e.id() == Some(id))
        });
        Ok(found)
    }
}
