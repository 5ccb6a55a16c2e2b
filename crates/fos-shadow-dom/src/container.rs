//! DOM Node Operations
//!
//! Child-list mutation: appendChild, insertBefore, replaceChild, removeChild,
//! removeChildren, plus the parser-only variants.
//!
//! Mutation events may run arbitrary listener code between the steps of an
//! operation. Every step re-checks the parent/sibling relation it relies on
//! and silently stops the batch when a listener moved things. Link updates
//! run inside a no-event-dispatch scope.

use crate::event::{Event, EventType};
use crate::node::{NodeFlags, NodeType};
use crate::{node_traversal, Document, DomError, DomResult, NodeId};

/// Node operations trait
pub trait NodeOperations {
    /// Append a child node; returns the appended node
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId>;

    /// Remove a child node; returns the removed node
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId>;

    /// Insert before a reference node (`None` appends); returns the inserted node
    fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        ref_child: Option<NodeId>,
    ) -> DomResult<NodeId>;

    /// Replace a child with another node; returns the replaced node
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> DomResult<NodeId>;
}

impl NodeOperations for Document {
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.append_child_impl(parent, child)
            .inspect_err(|e| tracing::debug!("appendChild({}, {}) failed: {}", parent, child, e))
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.remove_child_impl(parent, child)
            .inspect_err(|e| tracing::debug!("removeChild({}, {}) failed: {}", parent, child, e))
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        ref_child: Option<NodeId>,
    ) -> DomResult<NodeId> {
        self.insert_before_impl(parent, new_child, ref_child)
            .inspect_err(|e| tracing::debug!("insertBefore({}, {}) failed: {}", parent, new_child, e))
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> DomResult<NodeId> {
        self.replace_child_impl(parent, new_child, old_child)
            .inspect_err(|e| tracing::debug!("replaceChild({}, {}) failed: {}", parent, old_child, e))
    }
}

impl Document {
    /// Validate inserting `new_child` under `parent`, optionally in place of
    /// `replaced`
    pub(crate) fn check_pre_insertion(
        &self,
        parent: NodeId,
        new_child: NodeId,
        replaced: Option<NodeId>,
    ) -> DomResult<()> {
        let (Some(parent_node), Some(child_node)) = (self.tree.get(parent), self.tree.get(new_child)) else {
            return Err(DomError::NotFound);
        };
        if !parent_node.is_container() {
            return Err(DomError::HierarchyRequest);
        }
        if child_node.is_pseudo_element() {
            return Err(DomError::HierarchyRequest);
        }
        if self.is_read_only_node(parent) {
            return Err(DomError::NoModificationAllowed);
        }
        let child_type = child_node.node_type();
        if child_type == NodeType::DocumentType && child_node.in_document() {
            return Err(DomError::HierarchyRequest);
        }
        if self.contains_including_host_elements(new_child, parent) {
            return Err(DomError::HierarchyRequest);
        }

        let candidates: Vec<NodeId> = if child_type == NodeType::DocumentFragment {
            self.child_nodes(new_child)
        } else {
            vec![new_child]
        };
        let parent_type = parent_node.node_type();
        if candidates
            .iter()
            .any(|&c| !parent_type.child_type_allowed(self.tree[c].node_type()))
        {
            return Err(DomError::HierarchyRequest);
        }

        if parent_type == NodeType::Document {
            self.check_document_cardinality(parent, new_child, &candidates, replaced)?;
        }
        Ok(())
    }

    /// A Document has at most one element child and one doctype
    fn check_document_cardinality(
        &self,
        document: NodeId,
        new_child: NodeId,
        candidates: &[NodeId],
        replaced: Option<NodeId>,
    ) -> DomResult<()> {
        let mut elements = 0;
        let mut doctypes = 0;
        let existing = self
            .tree
            .children(document)
            .filter(|&c| Some(c) != replaced && c != new_child);
        for node in existing.chain(candidates.iter().copied()) {
            match self.tree[node].node_type() {
                NodeType::Element => elements += 1,
                NodeType::DocumentType => doctypes += 1,
                _ => {}
            }
        }
        if elements > 1 || doctypes > 1 {
            return Err(DomError::HierarchyRequest);
        }
        Ok(())
    }

    fn append_child_impl(&mut self, parent: NodeId, new_child: NodeId) -> DomResult<NodeId> {
        self.check_pre_insertion(parent, new_child, None)?;
        if self.last_child(parent) == Some(new_child) {
            return Ok(new_child);
        }
        self.insert_nodes(parent, new_child, None)?;
        Ok(new_child)
    }

    fn insert_before_impl(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        ref_child: Option<NodeId>,
    ) -> DomResult<NodeId> {
        let Some(next) = ref_child else {
            return self.append_child_impl(parent, new_child);
        };
        self.check_pre_insertion(parent, new_child, None)?;
        if self.parent_node(next) != Some(parent) {
            return Err(DomError::NotFound);
        }
        if next == new_child || self.previous_sibling(next) == Some(new_child) {
            return Ok(new_child);
        }
        self.insert_nodes(parent, new_child, Some(next))?;
        Ok(new_child)
    }

    fn replace_child_impl(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> DomResult<NodeId> {
        if old_child == new_child {
            return Ok(old_child);
        }
        if !self.tree.contains(old_child) {
            return Err(DomError::NotFound);
        }
        self.check_pre_insertion(parent, new_child, Some(old_child))?;
        if self.parent_node(old_child) != Some(parent) {
            return Err(DomError::NotFound);
        }

        let next = self.next_sibling(old_child);
        self.remove_child_impl(parent, old_child)?;
        if let Some(next) = next {
            if next == new_child || self.previous_sibling(next) == Some(new_child) {
                return Ok(old_child);
            }
        }
        // removal events may have changed the tree
        self.check_pre_insertion(parent, new_child, None)?;
        self.insert_nodes(parent, new_child, next)?;
        Ok(old_child)
    }

    /// Insert `new_child` (or the children of a fragment) before `next`.
    ///
    /// Stops without error as soon as a listener invalidates the expected
    /// relationships: `next` left `parent`, the next fragment child is no
    /// longer first in the fragment, or a child got a parent elsewhere.
    fn insert_nodes(&mut self, parent: NodeId, new_child: NodeId, next: Option<NodeId>) -> DomResult<()> {
        let is_fragment = self.tree[new_child].node_type() == NodeType::DocumentFragment;
        let targets = if is_fragment {
            self.child_nodes(new_child)
        } else {
            vec![new_child]
        };
        if targets.is_empty() {
            return Ok(());
        }

        if !is_fragment {
            if let Some(old_parent) = self.parent_node(new_child) {
                self.remove_child_impl(old_parent, new_child)?;
                // listeners ran during the removal
                self.check_pre_insertion(parent, new_child, None)?;
            }
        }

        let mut inserted = 0;
        for &child in &targets {
            if is_fragment {
                if self.first_child(new_child) != Some(child) {
                    break;
                }
                self.remove_common(new_child, child);
            }
            if let Some(next) = next {
                if self.parent_node(next) != Some(parent) {
                    break;
                }
            }
            if self.tree[child].parent.is_valid() || self.contains_including_host_elements(child, parent) {
                break;
            }
            self.insert_common(parent, child, next);
            self.update_tree_after_insertion(parent, child);
            inserted += 1;
        }
        if inserted < targets.len() {
            tracing::debug!(
                "Insertion into {} stopped after {} of {} nodes",
                parent,
                inserted,
                targets.len()
            );
        }

        self.dispatch_subtree_modified(parent);
        Ok(())
    }

    /// Link `child` and notify the tree. No events.
    fn insert_common(&mut self, parent: NodeId, child: NodeId, next: Option<NodeId>) {
        let _scope = self.forbid_event_dispatch();
        self.tree.insert_before_raw(parent, child, next.into());
        self.children_changed(parent);
        self.inserted_into(parent, child);
    }

    /// Unlink `child` and notify the tree. No events.
    fn remove_common(&mut self, parent: NodeId, child: NodeId) {
        if self.is_attached(child) {
            self.detach(child);
        }
        let _scope = self.forbid_event_dispatch();
        self.tree.remove_raw(child);
        self.children_changed(parent);
        self.removed_from(parent, child);
    }

    fn inserted_into(&mut self, parent: NodeId, child: NodeId) {
        if self.in_document(parent) {
            self.set_in_document(child, true);
        }
        self.shadow_subtree_changed(parent, child);
    }

    fn removed_from(&mut self, parent: NodeId, child: NodeId) {
        if self.in_document(child) {
            self.set_in_document(child, false);
        }
        self.shadow_subtree_changed(parent, child);
    }

    /// Set or clear the in-document bit over `node`'s subtree, shadow trees included
    pub(crate) fn set_in_document(&mut self, node: NodeId, value: bool) {
        for n in self.subtree_including_shadows(node) {
            self.tree[n].flags.set(NodeFlags::IN_DOCUMENT, value);
        }
    }

    fn update_tree_after_insertion(&mut self, parent: NodeId, child: NodeId) {
        if self.is_attached(parent) && !self.is_attached(child) && self.parent_node(child) == Some(parent) {
            if self.config.lazy_attach {
                self.lazy_attach(child);
            } else {
                self.attach(child);
            }
        }
        self.dispatch_child_insertion_events(child);
    }

    fn dispatch_child_insertion_events(&mut self, child: NodeId) {
        if self.is_in_shadow_tree(child) {
            return;
        }
        if let Some(parent) = self.parent_node(child) {
            if self.wants_mutation_event(&EventType::DomNodeInserted) {
                let mut event = Event::node_inserted(parent);
                self.dispatch_event(child, &mut event);
            }
        }
        if self.in_document(child) && self.wants_mutation_event(&EventType::DomNodeInsertedIntoDocument) {
            let subtree: Vec<NodeId> = std::iter::once(child)
                .chain(node_traversal::descendants(self, child))
                .collect();
            for node in subtree {
                let mut event = Event::node_inserted_into_document();
                self.dispatch_event(node, &mut event);
            }
        }
    }

    fn dispatch_child_removal_events(&mut self, child: NodeId) {
        if self.is_in_shadow_tree(child) {
            return;
        }
        if let Some(parent) = self.parent_node(child) {
            if self.wants_mutation_event(&EventType::DomNodeRemoved) {
                let mut event = Event::node_removed(parent);
                self.dispatch_event(child, &mut event);
            }
        }
        if self.in_document(child) && self.wants_mutation_event(&EventType::DomNodeRemovedFromDocument) {
            let subtree: Vec<NodeId> = std::iter::once(child)
                .chain(node_traversal::descendants(self, child))
                .collect();
            for node in subtree {
                let mut event = Event::node_removed_from_document();
                self.dispatch_event(node, &mut event);
            }
        }
    }

    fn dispatch_subtree_modified(&mut self, parent: NodeId) {
        if self.is_in_shadow_tree(parent) || self.is_event_dispatch_forbidden() {
            return;
        }
        if self.wants_mutation_event(&EventType::DomSubtreeModified) {
            let mut event = Event::subtree_modified();
            self.dispatch_event(parent, &mut event);
        }
    }

    fn remove_child_impl(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        if !self.tree.contains(parent) || !self.tree.contains(child) {
            return Err(DomError::NotFound);
        }
        if self.is_read_only_node(parent) || self.is_read_only_node(child) {
            return Err(DomError::NoModificationAllowed);
        }
        if self.parent_node(child) != Some(parent) {
            return Err(DomError::NotFound);
        }

        self.dispatch_child_removal_events(child);
        // a listener may have moved the child already
        if self.parent_node(child) != Some(parent) {
            return Err(DomError::NotFound);
        }

        self.remove_common(parent, child);
        self.dispatch_subtree_modified(parent);
        Ok(child)
    }

    /// Remove every child of `parent`, read-only or not. Never fails.
    pub fn remove_children(&mut self, parent: NodeId) {
        if !self.tree.contains(parent) {
            return;
        }
        for child in self.child_nodes(parent) {
            if self.parent_node(child) == Some(parent) {
                self.dispatch_child_removal_events(child);
            }
        }
        let children = self.child_nodes(parent);
        if children.is_empty() {
            return;
        }
        for child in children {
            self.remove_common(parent, child);
        }
        self.dispatch_subtree_modified(parent);
    }

    /// Start a parser session; parsing ends when it is dropped
    pub fn begin_parsing(&mut self) -> ParserSession<'_> {
        self.parsing = true;
        ParserSession { doc: self }
    }

    pub fn is_parsing(&self) -> bool {
        self.parsing
    }
}

/// Exclusive access to a document for the parser.
///
/// The parser-only mutations skip mutation events, reparenting and
/// attachment. They expect fresh, parentless nodes.
#[derive(Debug)]
pub struct ParserSession<'a> {
    doc: &'a mut Document,
}

impl ParserSession<'_> {
    pub fn document(&self) -> &Document {
        self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.doc
    }

    fn check_parser_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let (Some(parent_node), Some(child_node)) = (self.doc.tree.get(parent), self.doc.tree.get(child)) else {
            return Err(DomError::NotFound);
        };
        if !parent_node.is_container()
            || child_node.parent.is_valid()
            || child_node.node_type() == NodeType::DocumentFragment
        {
            return Err(DomError::HierarchyRequest);
        }
        Ok(())
    }

    pub fn parser_append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.check_parser_child(parent, child)?;
        self.doc.insert_common(parent, child, None);
        Ok(())
    }

    pub fn parser_insert_before(&mut self, parent: NodeId, child: NodeId, next: NodeId) -> DomResult<()> {
        self.check_parser_child(parent, child)?;
        if self.doc.parent_node(next) != Some(parent) {
            return Err(DomError::NotFound);
        }
        self.doc.insert_common(parent, child, Some(next));
        Ok(())
    }

    pub fn parser_remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if self.doc.parent_node(child) != Some(parent) {
            return Err(DomError::NotFound);
        }
        self.doc.remove_common(parent, child);
        Ok(())
    }
}

impl Drop for ParserSession<'_> {
    fn drop(&mut self) {
        self.doc.parsing = false;
    }
}
