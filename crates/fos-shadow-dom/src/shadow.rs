//! Shadow trees
//!
//! A host element carries at most one ShadowRoot. The root is an ordinary
//! arena node whose parent pointer is the host; it is not in the host's
//! child list. Per-host state (the root and its distributor) lives in
//! `ElementShadow`, owned by the document and keyed by host.

use std::cell::{Ref, RefCell};

use crate::distributor::ContentDistributor;
use crate::node::{Node, NodeData, NodeFlags};
use crate::{node_traversal, Document, DomError, DomResult, NodeId};

/// Shadow root type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowRootType {
    /// Created by the engine for built-in controls
    UserAgent,
    #[default]
    Author,
}

/// ShadowRoot node data
#[derive(Debug, Clone, Default)]
pub struct ShadowRootData {
    pub(crate) root_type: ShadowRootType,
    /// Author styles of the enclosing scope apply inside the shadow tree
    pub(crate) apply_author_styles: bool,
    /// Inherited properties reset at the shadow boundary
    pub(crate) reset_style_inheritance: bool,
}

impl ShadowRootData {
    pub fn root_type(&self) -> ShadowRootType {
        self.root_type
    }

    pub fn apply_author_styles(&self) -> bool {
        self.apply_author_styles
    }

    pub fn reset_style_inheritance(&self) -> bool {
        self.reset_style_inheritance
    }
}

/// Shadow state of one host
#[derive(Debug)]
pub struct ElementShadow {
    root: NodeId,
    pub(crate) distributor: RefCell<ContentDistributor>,
}

impl ElementShadow {
    fn new(root: NodeId) -> Self {
        Self {
            root,
            distributor: RefCell::new(ContentDistributor::new()),
        }
    }

    pub fn shadow_root(&self) -> NodeId {
        self.root
    }

    /// Current distributor state (not recomputed)
    pub fn distributor(&self) -> Ref<'_, ContentDistributor> {
        self.distributor.borrow()
    }
}

impl Document {
    /// Attach a new shadow root to `host`.
    ///
    /// A host supports a single shadow root; a second call fails with
    /// `NotSupported`.
    pub fn add_shadow_root(&mut self, host: NodeId, root_type: ShadowRootType) -> DomResult<NodeId> {
        let Some(node) = self.tree.get(host) else {
            return Err(DomError::NotFound);
        };
        if !node.is_element() {
            return Err(DomError::InvalidNodeType);
        }
        if self.shadows.contains_key(&host) {
            return Err(DomError::NotSupported);
        }

        let in_document = node.in_document();
        let mut root = Node::new(NodeData::ShadowRoot(ShadowRootData {
            root_type,
            ..Default::default()
        }));
        root.parent = host;
        root.flags.set(NodeFlags::IN_DOCUMENT, in_document);
        let root = self.tree.alloc(root);

        self.shadows.insert(host, ElementShadow::new(root));
        self.tree[host].flags.insert(NodeFlags::NEEDS_COMPOSED_TRAVERSAL);
        tracing::debug!("Added {:?} shadow root {} to host {}", root_type, root, host);

        // The host's light children are no longer its composed children
        self.invalidate_distribution(host);
        Ok(root)
    }

    /// Shadow root of `host`, creating an author root if needed
    pub fn ensure_shadow(&mut self, host: NodeId) -> DomResult<NodeId> {
        match self.shadow_root(host) {
            Some(root) => Ok(root),
            None => self.add_shadow_root(host, ShadowRootType::Author),
        }
    }

    /// Tear down the shadow tree of `host`.
    ///
    /// The root keeps existing as an orphan: shadow-root operations on it
    /// fail with `InvalidAccess` afterwards.
    pub fn remove_shadow_root(&mut self, host: NodeId) -> DomResult<()> {
        let Some(shadow) = self.shadows.get(&host) else {
            return Err(DomError::NotFound);
        };
        let root = shadow.shadow_root();
        let was_attached = self.is_attached(host);
        if was_attached {
            self.detach(host);
        }

        self.shadows.remove(&host);
        self.tree[root].parent = NodeId::NONE;
        if !self.is_insertion_point(host) {
            self.tree[host].flags.remove(NodeFlags::NEEDS_COMPOSED_TRAVERSAL);
        }
        if self.tree[root].in_document() {
            self.set_in_document(root, false);
        }
        self.remove_children(root);
        tracing::debug!("Removed shadow root {} from host {}", root, host);

        if was_attached {
            self.lazy_attach(host);
        }
        Ok(())
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.shadows.get(&host).map(ElementShadow::shadow_root)
    }

    pub fn element_shadow(&self, host: NodeId) -> Option<&ElementShadow> {
        self.shadows.get(&host)
    }

    pub fn is_shadow_host(&self, node: NodeId) -> bool {
        self.shadows.contains_key(&node)
    }

    pub fn is_shadow_root(&self, node: NodeId) -> bool {
        self.tree.get(node).is_some_and(Node::is_shadow_root)
    }

    fn shadow_root_data(&self, root: NodeId) -> DomResult<&ShadowRootData> {
        self.tree
            .get(root)
            .and_then(Node::as_shadow_root)
            .ok_or(DomError::InvalidNodeType)
    }

    /// Host of a shadow root; `InvalidAccess` once the root lost its host
    pub fn shadow_root_host(&self, root: NodeId) -> DomResult<NodeId> {
        self.shadow_root_data(root)?;
        self.tree[root]
            .parent_or_shadow_host()
            .ok_or(DomError::InvalidAccess)
    }

    pub fn shadow_root_type(&self, root: NodeId) -> DomResult<ShadowRootType> {
        Ok(self.shadow_root_data(root)?.root_type)
    }

    pub fn apply_author_styles(&self, root: NodeId) -> DomResult<bool> {
        Ok(self.shadow_root_data(root)?.apply_author_styles)
    }

    pub fn reset_style_inheritance(&self, root: NodeId) -> DomResult<bool> {
        Ok(self.shadow_root_data(root)?.reset_style_inheritance)
    }

    pub fn set_apply_author_styles(&mut self, root: NodeId, value: bool) -> DomResult<()> {
        let host = self.shadow_root_host(root)?;
        if let NodeData::ShadowRoot(data) = &mut self.tree[root].data {
            data.apply_author_styles = value;
        }
        self.set_needs_style_recalc(host);
        Ok(())
    }

    pub fn set_reset_style_inheritance(&mut self, root: NodeId, value: bool) -> DomResult<()> {
        let host = self.shadow_root_host(root)?;
        if let NodeData::ShadowRoot(data) = &mut self.tree[root].data {
            data.reset_style_inheritance = value;
        }
        self.set_needs_style_recalc(host);
        Ok(())
    }

    /// Drop the distribution of `host` so it is recomputed on next access.
    ///
    /// When the previous distribution was non-empty (or never computed) an
    /// attached host is detached and lazily re-attached. Inner hosts whose
    /// light children include this shadow's insertion points are invalidated
    /// too, since their pool came from this distribution.
    pub fn invalidate_distribution(&mut self, host: NodeId) {
        let Some(shadow) = self.shadows.get(&host) else {
            return;
        };
        if !shadow.distributor.borrow().needs_invalidation() {
            return;
        }
        let root = shadow.shadow_root();
        let needs_reattach = shadow.distributor.borrow().needs_reattach();

        // detach while the old distribution is still cached so reprojected
        // nodes lose their renderers too
        if needs_reattach && self.is_attached(host) {
            self.detach(host);
            self.lazy_attach(host);
        }
        if let Some(shadow) = self.shadows.get(&host) {
            let mut distributor = shadow.distributor.borrow_mut();
            distributor.invalidate(&self.tree);
            distributor.finish_invalidation();
        }
        tracing::trace!("Invalidated distribution of host {}", host);

        let inner_hosts: Vec<NodeId> = self
            .collect_insertion_points(root)
            .into_iter()
            .filter_map(|ip| self.parent_node(ip))
            .filter(|&parent| self.is_shadow_host(parent))
            .collect();
        for inner in inner_hosts {
            self.invalidate_distribution(inner);
        }
    }

    /// Forget the cached insertion point list of `host`'s shadow tree
    pub(crate) fn invalidate_insertion_point_list(&self, host: NodeId) {
        if let Some(shadow) = self.shadows.get(&host) {
            shadow.distributor.borrow_mut().invalidate_insertion_point_list();
        }
    }

    /// Active insertion points of the shadow tree rooted at `root`, in tree order
    pub(crate) fn collect_insertion_points(&self, root: NodeId) -> Vec<NodeId> {
        let mut points = Vec::new();
        let mut current = node_traversal::next(self, root, Some(root));
        while let Some(node) = current {
            if self.tree[node].is_insertion_point() {
                // nested insertion points are inactive
                points.push(node);
                current = node_traversal::next_skipping_children(self, node, Some(root));
            } else {
                current = node_traversal::next(self, node, Some(root));
            }
        }
        points
    }

    /// Structural change below `parent` that may affect distribution
    pub(crate) fn children_changed(&mut self, parent: NodeId) {
        if self.is_shadow_host(parent) {
            self.invalidate_distribution(parent);
        }
        // an active insertion point among a host's children feeds that host's pool
        if self.is_active_insertion_point(parent) {
            if let Some(grand) = self.parent_node(parent).filter(|&p| self.is_shadow_host(p)) {
                self.invalidate_distribution(grand);
            }
        }
    }

    /// `subtree` entered or left the tree below `parent`: refresh the
    /// insertion point list and distribution of the enclosing shadow
    pub(crate) fn shadow_subtree_changed(&mut self, parent: NodeId, subtree: NodeId) {
        let Some(host) = self.shadow_host(parent) else {
            return;
        };
        let has_insertion_point = self.is_insertion_point(subtree)
            || node_traversal::descendants(self, subtree).any(|n| self.tree[n].is_insertion_point());
        if has_insertion_point {
            self.invalidate_insertion_point_list(host);
            self.invalidate_distribution(host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeOperations, Validity};

    #[test]
    fn test_add_shadow_root() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        doc.append_child(NodeId::ROOT, host).unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::UserAgent).unwrap();

        assert!(doc.is_shadow_host(host));
        assert!(doc.is_shadow_root(root));
        assert!(doc.in_document(root));
        assert_eq!(doc.shadow_root(host), Some(root));
        assert_eq!(doc.shadow_root_host(root), Ok(host));
        assert_eq!(doc.shadow_root_type(root), Ok(ShadowRootType::UserAgent));
        // a shadow root is not a child of its host
        assert!(doc.child_nodes(host).is_empty());
        assert_eq!(doc.parent_node(root), None);
    }

    #[test]
    fn test_single_shadow_root_per_host() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        let root = doc.ensure_shadow(host).unwrap();
        assert_eq!(doc.ensure_shadow(host), Ok(root));
        assert_eq!(
            doc.add_shadow_root(host, ShadowRootType::Author),
            Err(DomError::NotSupported)
        );
        let text = doc.create_text_node("x");
        assert_eq!(
            doc.add_shadow_root(text, ShadowRootType::Author),
            Err(DomError::InvalidNodeType)
        );
    }

    #[test]
    fn test_orphaned_root_rejects_shadow_operations() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        let child = doc.create_element("p").unwrap();
        doc.append_child(root, child).unwrap();

        doc.remove_shadow_root(host).unwrap();
        assert!(!doc.is_shadow_host(host));
        assert!(doc.child_nodes(root).is_empty());
        assert_eq!(doc.shadow_root_host(root), Err(DomError::InvalidAccess));
        assert_eq!(doc.set_apply_author_styles(root, true), Err(DomError::InvalidAccess));
        assert_eq!(doc.set_reset_style_inheritance(root, true), Err(DomError::InvalidAccess));
        assert_eq!(doc.remove_shadow_root(host), Err(DomError::NotFound));
    }

    #[test]
    fn test_style_flags() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        assert_eq!(doc.apply_author_styles(root), Ok(false));
        doc.set_apply_author_styles(root, true).unwrap();
        doc.set_reset_style_inheritance(root, true).unwrap();
        assert_eq!(doc.apply_author_styles(root), Ok(true));
        assert_eq!(doc.reset_style_inheritance(root), Ok(true));
        assert_eq!(doc.apply_author_styles(host), Err(DomError::InvalidNodeType));
    }

    #[test]
    fn test_nested_insertion_points_are_not_collected() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        let outer = doc.create_content_element(None);
        let nested = doc.create_content_element(None);
        let wrapper = doc.create_element("section").unwrap();
        let second = doc.create_content_element(Some("p"));
        doc.append_child(root, outer).unwrap();
        doc.append_child(outer, nested).unwrap();
        doc.append_child(root, wrapper).unwrap();
        doc.append_child(wrapper, second).unwrap();

        assert_eq!(doc.collect_insertion_points(root), vec![outer, second]);
        assert!(doc.is_active_insertion_point(outer));
        assert!(!doc.is_active_insertion_point(nested));
        assert!(doc.is_active_insertion_point(second));
    }

    #[test]
    fn test_light_child_change_invalidates() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        let content = doc.create_content_element(None);
        doc.append_child(root, content).unwrap();
        doc.ensure_distribution(root);
        assert_eq!(doc.distribution_validity(host), Some(Validity::Valid));

        let child = doc.create_element("p").unwrap();
        doc.append_child(host, child).unwrap();
        assert_eq!(doc.distribution_validity(host), Some(Validity::Invalidated));
    }
}
