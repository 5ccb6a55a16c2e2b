//! Attachment and renderer bookkeeping
//!
//! A node is "attached" once it has been considered for a renderer. The
//! renderer of a node hangs off its rendering parent, which is computed with
//! the composed walker: light children distributed into a shadow tree render
//! under the insertion point's parent, and unassigned light children render
//! nowhere. Style and renderer creation are delegated to collaborators.

use crate::node::{Node, NodeData, NodeFlags, NodeType, PseudoId};
use crate::{rendering_traversal, Document, DomError, DomResult, NodeId};

/// Display property values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Display {
    #[default]
    Inline,
    Block,
    None,
}

/// The subset of computed style attachment cares about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    pub display: Display,
}

/// Computes the style of a node about to be attached
pub trait StyleResolver {
    fn resolve(&self, doc: &Document, node: NodeId) -> ComputedStyle;
}

/// `hidden` elements get `display: none`, other elements are blocks and
/// everything else is inline
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStyleResolver;

impl StyleResolver for DefaultStyleResolver {
    fn resolve(&self, doc: &Document, node: NodeId) -> ComputedStyle {
        let display = match doc.node(node).map(Node::node_type) {
            Some(NodeType::Element) if doc.has_attribute(node, "hidden") => Display::None,
            Some(NodeType::Element) => Display::Block,
            _ => Display::Inline,
        };
        ComputedStyle { display }
    }
}

/// Receives renderer lifecycle notifications
pub trait RenderSink {
    /// A renderer was created for `node` under the renderer of `parent`
    /// (`None` for the Document's root renderer)
    fn create_renderer(&mut self, node: NodeId, parent: Option<NodeId>, style: &ComputedStyle);

    fn destroy_renderer(&mut self, node: NodeId);

    /// Runs as a post-attach callback once the attach burst is over
    fn did_attach(&mut self, _node: NodeId) {}
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderSink;

impl RenderSink for NullRenderSink {
    fn create_renderer(&mut self, _node: NodeId, _parent: Option<NodeId>, _style: &ComputedStyle) {}

    fn destroy_renderer(&mut self, _node: NodeId) {}
}

impl Document {
    pub fn set_style_resolver(&mut self, resolver: Box<dyn StyleResolver>) {
        self.style_resolver = resolver;
    }

    pub fn set_render_sink(&mut self, sink: Box<dyn RenderSink>) {
        self.render_sink = sink;
    }

    /// Attach the whole document
    pub fn attach_document(&mut self) {
        self.attach(NodeId::ROOT);
    }

    /// Attach `node` and its composed subtree. Post-attach callbacks queued
    /// during the walk run once it is over.
    pub fn attach(&mut self, node: NodeId) {
        if !self.tree.contains(node) || self.is_attached(node) {
            return;
        }
        self.suspend_post_attach_callbacks();
        self.attach_node(node);
        self.resume_post_attach_callbacks();
    }

    fn attach_node(&mut self, node: NodeId) {
        let parent = if node == NodeId::ROOT {
            None
        } else {
            let (parent, details) = rendering_traversal::parent_with_details(self, node);
            match parent {
                Some(p) if !details.out_of_composition => Some(p),
                _ => {
                    self.mark_attached(node);
                    self.attach_children(node);
                    return;
                }
            }
        };

        let candidate = match parent {
            None => true,
            Some(p) => self.has_renderer(p) && self.child_should_create_renderer(p, node),
        };
        if candidate {
            let style = self.style_resolver.resolve(self, node);
            if node == NodeId::ROOT || self.renderer_is_needed(node, &style) {
                self.render_sink.create_renderer(node, parent, &style);
                self.tree[node].flags.insert(NodeFlags::HAS_RENDERER);
            }
        }
        tracing::trace!("Attached {} (renderer: {})", node, self.has_renderer(node));
        self.mark_attached(node);
        self.attach_children(node);

        self.queue_post_attach_callback(Box::new(move |doc: &mut Document| {
            doc.render_sink.did_attach(node);
        }));
    }

    fn mark_attached(&mut self, node: NodeId) {
        let flags = &mut self.tree[node].flags;
        flags.insert(NodeFlags::ATTACHED);
        flags.remove(NodeFlags::NEEDS_STYLE_RECALC);
    }

    /// Shadow tree first, then distributed nodes, then pseudo-elements
    /// around the light children
    fn attach_children(&mut self, node: NodeId) {
        if let Some(root) = self.shadow_root(node) {
            self.attach_if_needed(root);
        }
        if self.is_active_insertion_point(node) {
            for distributed in self.distributed_nodes(node) {
                self.attach_if_needed(distributed);
            }
        }
        if let Some(before) = self.pseudo_element(node, PseudoId::Before) {
            self.attach_if_needed(before);
        }
        for child in self.child_nodes(node) {
            self.attach_if_needed(child);
        }
        if let Some(after) = self.pseudo_element(node, PseudoId::After) {
            self.attach_if_needed(after);
        }
    }

    fn attach_if_needed(&mut self, node: NodeId) {
        if !self.is_attached(node) {
            self.attach_node(node);
        }
    }

    /// Tear down the renderers of `node`'s composed subtree and clear the
    /// attached bits
    pub fn detach(&mut self, node: NodeId) {
        if !self.is_attached(node) {
            return;
        }
        if let Some(root) = self.shadow_root(node) {
            self.detach(root);
        }
        // only a cached, valid distribution: detaching never distributes
        for distributed in self.cached_distributed_nodes(node) {
            self.detach(distributed);
        }
        if let Some(before) = self.pseudo_element(node, PseudoId::Before) {
            self.detach(before);
        }
        for child in self.child_nodes(node) {
            self.detach(child);
        }
        if let Some(after) = self.pseudo_element(node, PseudoId::After) {
            self.detach(after);
        }

        let flags = &mut self.tree[node].flags;
        let had_renderer = flags.contains(NodeFlags::HAS_RENDERER);
        flags.remove(NodeFlags::HAS_RENDERER);
        flags.remove(NodeFlags::ATTACHED);
        if had_renderer {
            self.render_sink.destroy_renderer(node);
        }
        tracing::trace!("Detached {}", node);
    }

    /// Detach and attach again
    pub fn reattach(&mut self, node: NodeId) {
        self.detach(node);
        self.attach(node);
    }

    /// Mark `node` for attachment on the next [`Document::update_style_if_needed`]
    pub fn lazy_attach(&mut self, node: NodeId) {
        self.set_needs_style_recalc(node);
    }

    /// Attach pending nodes and reattach attached nodes marked for recalc
    pub fn update_style_if_needed(&mut self) {
        let pending: Vec<NodeId> = self
            .subtree_including_shadows(NodeId::ROOT)
            .into_iter()
            .filter(|&n| self.needs_style_recalc(n))
            .collect();
        if pending.is_empty() {
            return;
        }
        tracing::trace!("Style update: {} nodes pending", pending.len());

        for node in pending {
            // an ancestor processed earlier may have handled it
            if !self.needs_style_recalc(node) {
                continue;
            }
            if self.is_attached(node) {
                self.reattach(node);
                continue;
            }
            let parent_attached = node == NodeId::ROOT
                || self.parent_or_shadow_host(node).is_some_and(|p| self.is_attached(p));
            if parent_attached {
                self.attach(node);
            }
        }
    }

    /// Whether `node` gets a renderer once its rendering parent accepted it
    pub fn renderer_is_needed(&self, node: NodeId, style: &ComputedStyle) -> bool {
        if style.display == Display::None {
            return false;
        }
        let Some(n) = self.tree.get(node) else {
            return false;
        };
        match &n.data {
            NodeData::Element(_) => !self.is_active_insertion_point(node),
            NodeData::Text(text) => !text.is_empty(),
            NodeData::PseudoElement(_) => true,
            _ => false,
        }
    }

    /// Whether `parent`'s renderer accepts a child renderer for `child`
    pub fn child_should_create_renderer(&self, parent: NodeId, child: NodeId) -> bool {
        match self.node_type(parent) {
            Some(NodeType::Document) => self.node_type(child) == Some(NodeType::Element),
            Some(_) => true,
            None => false,
        }
    }

    /// Create (or return) the `::before`/`::after` node of an element
    pub fn create_pseudo_element(&mut self, host: NodeId, pseudo: PseudoId) -> DomResult<NodeId> {
        let Some(node) = self.tree.get(host) else {
            return Err(DomError::NotFound);
        };
        if !node.is_element() {
            return Err(DomError::InvalidNodeType);
        }
        if let Some(existing) = self.pseudo_element(host, pseudo) {
            return Ok(existing);
        }

        let in_document = node.in_document();
        let mut pseudo_node = Node::new(NodeData::PseudoElement(pseudo));
        pseudo_node.parent = host;
        pseudo_node.flags.set(NodeFlags::IN_DOCUMENT, in_document);
        let id = self.tree.alloc(pseudo_node);
        if let Some(element) = self.tree[host].as_element_mut() {
            match pseudo {
                PseudoId::Before => element.before = id,
                PseudoId::After => element.after = id,
            }
        }

        if self.is_attached(host) {
            self.attach(id);
        }
        Ok(id)
    }

    pub fn pseudo_element(&self, host: NodeId, pseudo: PseudoId) -> Option<NodeId> {
        self.tree.get(host)?.as_element()?.pseudo_element(pseudo)
    }
}
