//! Document - arena owner and node factory
//!
//! The Document owns every node of its tree, the per-host shadow state,
//! the listener registry and the rendering collaborators. Nodes refer to
//! their document implicitly: a `NodeId` is only meaningful for the
//! Document that created it.

use std::collections::HashMap;
use std::fmt;

use crate::event::{Event, EventType};
use crate::guard::{EventDispatchCounter, PostAttachQueue};
use crate::insertion_point::InsertionPointData;
use crate::listeners::ListenerRegistry;
use crate::node::{
    Attribute, ElementData, Node, NodeData, NodeFlags, NodeType, QualName, HTML_NAMESPACE,
    XMLNS_NAMESPACE, XML_NAMESPACE,
};
use crate::render::{DefaultStyleResolver, NullRenderSink, RenderSink, StyleResolver};
use crate::shadow::ElementShadow;
use crate::{Config, DomError, DomResult, DomTree, NodeId};

/// DOM Document
pub struct Document {
    pub(crate) tree: DomTree,
    /// Shadow state keyed by host element
    pub(crate) shadows: HashMap<NodeId, ElementShadow>,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) dispatch_counter: EventDispatchCounter,
    pub(crate) post_attach: PostAttachQueue,
    pub(crate) style_resolver: Box<dyn StyleResolver>,
    pub(crate) render_sink: Box<dyn RenderSink>,
    pub(crate) parsing: bool,
    pub(crate) config: Config,
}

impl Document {
    /// Create an empty document with the default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an empty document
    pub fn with_config(config: Config) -> Self {
        let mut tree = DomTree::new();
        let mut root = Node::new(NodeData::Document);
        root.flags.insert(NodeFlags::IN_DOCUMENT);
        let id = tree.alloc(root);
        debug_assert_eq!(id, NodeId::ROOT);

        Self {
            tree,
            shadows: HashMap::new(),
            listeners: ListenerRegistry::default(),
            dispatch_counter: EventDispatchCounter::default(),
            post_attach: PostAttachQueue::new(),
            style_resolver: Box::new(DefaultStyleResolver),
            render_sink: Box::new(NullRenderSink),
            parsing: false,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The Document node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Node arena
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id)
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.tree.get(id).map(Node::node_type)
    }

    /// First element child of the Document
    pub fn document_element(&self) -> Option<NodeId> {
        self.tree
            .children(NodeId::ROOT)
            .find(|&c| self.tree[c].is_element())
    }

    // ------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------

    /// Create an HTML element. `content` creates an insertion point.
    pub fn create_element(&mut self, name: &str) -> DomResult<NodeId> {
        if !is_valid_name(name) {
            return Err(DomError::InvalidCharacter);
        }
        Ok(self.alloc_element(QualName::html(name)))
    }

    /// Create an element with an explicit namespace
    pub fn create_element_ns(
        &mut self,
        namespace: Option<&str>,
        qualified_name: &str,
    ) -> DomResult<NodeId> {
        let name = validate_qualified_name(namespace, qualified_name)?;
        Ok(self.alloc_element(name))
    }

    /// Create a `<content>` insertion point with an optional `select` filter
    pub fn create_content_element(&mut self, select: Option<&str>) -> NodeId {
        let id = self.alloc_element(QualName::html("content"));
        if let (Some(select), Some(element)) = (select, self.tree[id].as_element_mut()) {
            element.attributes.push(Attribute {
                name: "select".into(),
                value: select.into(),
            });
            if let Some(ip) = element.insertion_point.as_mut() {
                ip.set_select(Some(select));
            }
        }
        id
    }

    fn alloc_element(&mut self, name: QualName) -> NodeId {
        let is_content = name.is_html("content");
        let mut data = ElementData::new(name);
        if is_content {
            data.insertion_point = Some(InsertionPointData::new(None));
        }
        self.tree.alloc(Node::new(NodeData::Element(data)))
    }

    pub fn create_text_node(&mut self, data: &str) -> NodeId {
        self.tree.alloc(Node::new(NodeData::Text(data.to_string())))
    }

    pub fn create_comment(&mut self, data: &str) -> NodeId {
        self.tree.alloc(Node::new(NodeData::Comment(data.to_string())))
    }

    pub fn create_cdata_section(&mut self, data: &str) -> NodeId {
        self.tree.alloc(Node::new(NodeData::CDataSection(data.to_string())))
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> DomResult<NodeId> {
        if !is_valid_name(target) {
            return Err(DomError::InvalidCharacter);
        }
        Ok(self.tree.alloc(Node::new(NodeData::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        })))
    }

    pub fn create_document_fragment(&mut self) -> NodeId {
        self.tree.alloc(Node::new(NodeData::DocumentFragment))
    }

    pub fn create_document_type(&mut self, name: &str) -> DomResult<NodeId> {
        if !is_valid_name(name) {
            return Err(DomError::InvalidCharacter);
        }
        Ok(self.tree.alloc(Node::new(NodeData::DocumentType {
            name: name.to_string(),
        })))
    }

    /// Entity references and their descendants are read-only
    pub fn create_entity_reference(&mut self, name: &str) -> DomResult<NodeId> {
        if !is_valid_name(name) {
            return Err(DomError::InvalidCharacter);
        }
        Ok(self.tree.alloc(Node::new(NodeData::EntityReference {
            name: name.to_string(),
        })))
    }

    pub fn create_attribute(&mut self, name: &str) -> DomResult<NodeId> {
        if !is_valid_name(name) {
            return Err(DomError::InvalidCharacter);
        }
        Ok(self.tree.alloc(Node::new(NodeData::Attr {
            name: QualName {
                prefix: None,
                local: name.to_string(),
                namespace: None,
            },
            value: String::new(),
        })))
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent_node(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent_node()
    }

    pub fn parent_or_shadow_host(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent_or_shadow_host()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.first_child()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.last_child()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.next_sibling()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.previous_sibling()
    }

    /// Snapshot of the light children of `id`
    pub fn child_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.children(id).collect()
    }

    /// Entity references and everything below them are read-only
    pub fn is_read_only_node(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            let Some(n) = self.tree.get(node) else {
                return false;
            };
            if n.node_type() == NodeType::EntityReference {
                return true;
            }
            current = n.parent_or_shadow_host();
        }
        false
    }

    pub fn in_document(&self, id: NodeId) -> bool {
        self.tree.get(id).is_some_and(Node::in_document)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.tree.get(id).is_some_and(Node::attached)
    }

    pub fn has_renderer(&self, id: NodeId) -> bool {
        self.tree
            .get(id)
            .is_some_and(|n| n.flags.contains(NodeFlags::HAS_RENDERER))
    }

    pub fn needs_style_recalc(&self, id: NodeId) -> bool {
        self.tree
            .get(id)
            .is_some_and(|n| n.flags.contains(NodeFlags::NEEDS_STYLE_RECALC))
    }

    pub fn set_needs_style_recalc(&mut self, id: NodeId) {
        if let Some(node) = self.tree.get_mut(id) {
            node.flags.insert(NodeFlags::NEEDS_STYLE_RECALC);
        }
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.tree.get(id)?.as_element().map(|e| e.name.local.as_str())
    }

    /// Text, Comment, CDATA or processing-instruction data
    pub fn character_data(&self, id: NodeId) -> Option<&str> {
        self.tree.get(id)?.character_data()
    }

    /// Replace character data, dispatching `DOMCharacterDataModified`
    pub fn set_character_data(&mut self, id: NodeId, data: &str) -> DomResult<()> {
        if !self.tree.contains(id) {
            return Err(DomError::NotFound);
        }
        if self.is_read_only_node(id) {
            return Err(DomError::NoModificationAllowed);
        }
        let old = match &mut self.tree[id].data {
            NodeData::Text(s) | NodeData::Comment(s) | NodeData::CDataSection(s) => {
                std::mem::replace(s, data.to_string())
            }
            NodeData::ProcessingInstruction { data: d, .. } => std::mem::replace(d, data.to_string()),
            _ => return Err(DomError::InvalidNodeType),
        };

        if self.wants_mutation_event(&EventType::DomCharacterDataModified) {
            let mut event = Event::char_data_modified(&old, data);
            self.dispatch_event(id, &mut event);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn get_attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        self.tree.get(element)?.as_element()?.get_attribute(name)
    }

    pub fn has_attribute(&self, element: NodeId, name: &str) -> bool {
        self.get_attribute(element, name).is_some()
    }

    /// Set an attribute. Names are validated and lowercased.
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> DomResult<()> {
        if !is_valid_name(name) {
            return Err(DomError::InvalidCharacter);
        }
        self.check_attribute_target(element)?;
        let name = name.to_ascii_lowercase();
        let old = {
            let Some(data) = self.tree[element].as_element_mut() else {
                return Err(DomError::InvalidNodeType);
            };
            match data.attributes.iter_mut().find(|a| a.name == name) {
                Some(attr) => Some(std::mem::replace(&mut attr.value, value.to_string())),
                None => {
                    data.attributes.push(Attribute {
                        name: name.clone(),
                        value: value.to_string(),
                    });
                    None
                }
            }
        };
        self.attribute_changed(element, &name, old, Some(value.to_string()));
        Ok(())
    }

    /// Remove an attribute; returns whether it was present
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> DomResult<bool> {
        self.check_attribute_target(element)?;
        let name = name.to_ascii_lowercase();
        let old = {
            let Some(data) = self.tree[element].as_element_mut() else {
                return Err(DomError::InvalidNodeType);
            };
            match data.attributes.iter().position(|a| a.name == name) {
                Some(index) => data.attributes.remove(index).value,
                None => return Ok(false),
            }
        };
        self.attribute_changed(element, &name, Some(old), None);
        Ok(true)
    }

    fn check_attribute_target(&self, element: NodeId) -> DomResult<()> {
        let Some(node) = self.tree.get(element) else {
            return Err(DomError::NotFound);
        };
        if !node.is_element() {
            return Err(DomError::InvalidNodeType);
        }
        if self.is_read_only_node(element) {
            return Err(DomError::NoModificationAllowed);
        }
        Ok(())
    }

    fn attribute_changed(
        &mut self,
        element: NodeId,
        name: &str,
        old: Option<String>,
        new: Option<String>,
    ) {
        if name == "select" {
            if let Some(ip) = self.tree[element]
                .as_element_mut()
                .and_then(|e| e.insertion_point.as_mut())
            {
                ip.set_select(new.as_deref());
                if let Some(host) = self.shadow_host(element) {
                    self.invalidate_distribution(host);
                }
            }
        }
        if matches!(name, "id" | "class") {
            // selectors of the parent's insertion points may now match differently
            if let Some(parent) = self.parent_node(element) {
                if self.is_shadow_host(parent) {
                    self.invalidate_distribution(parent);
                }
                // fallback content of an active insertion point is pooled by
                // the host owning that insertion point
                if self.is_active_insertion_point(parent) {
                    if let Some(host) = self.parent_node(parent).filter(|&p| self.is_shadow_host(p)) {
                        self.invalidate_distribution(host);
                    }
                }
            }
        }
        self.set_needs_style_recalc(element);

        if self.wants_mutation_event(&EventType::DomAttrModified) {
            let mut event = Event::attr_modified(name, old.as_deref(), new.as_deref());
            self.dispatch_event(element, &mut event);
        }
    }

    /// Whether a mutation event of this type should be built at all
    pub(crate) fn wants_mutation_event(&self, event_type: &EventType) -> bool {
        self.config.mutation_events && self.listeners.has_listeners_of_type(event_type)
    }

    /// Inclusive subtree of `node` in pre-order, descending into shadow roots
    /// (before light children) and pseudo-elements
    pub(crate) fn subtree_including_shadows(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            let n = &self.tree[current];
            let mut pending = Vec::new();
            if let Some(element) = n.as_element() {
                pending.extend(element.before.get());
                if let Some(shadow) = self.shadows.get(&current) {
                    pending.push(shadow.shadow_root());
                }
            }
            pending.extend(self.tree.children(current));
            if let Some(after) = n.as_element().and_then(|e| e.after.get()) {
                pending.push(after);
            }
            stack.extend(pending.into_iter().rev());
        }
        out
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree.len())
            .field("shadow_hosts", &self.shadows.len())
            .field("parsing", &self.parsing)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn is_name_start_char(c: char) -> bool {
    c == ':' || c == '_' || c.is_ascii_alphabetic() || (c as u32 >= 0xC0 && c != '\u{D7}' && c != '\u{F7}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c.is_ascii_digit() || c == '-' || c == '.' || c == '\u{B7}'
}

/// XML `Name` production (simplified to the BMP ranges that matter here)
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// Validate a qualified name against a namespace
pub(crate) fn validate_qualified_name(
    namespace: Option<&str>,
    qualified_name: &str,
) -> DomResult<QualName> {
    if !is_valid_name(qualified_name) {
        return Err(DomError::InvalidCharacter);
    }
    let namespace = namespace.filter(|ns| !ns.is_empty());
    let (prefix, local) = match qualified_name.split_once(':') {
        Some((prefix, local)) => {
            if prefix.is_empty() || local.is_empty() || local.contains(':') {
                return Err(DomError::Namespace);
            }
            (Some(prefix), local)
        }
        None => (None, qualified_name),
    };

    if prefix.is_some() && namespace.is_none() {
        return Err(DomError::Namespace);
    }
    if prefix == Some("xml") && namespace != Some(XML_NAMESPACE) {
        return Err(DomError::Namespace);
    }
    let is_xmlns = prefix == Some("xmlns") || (prefix.is_none() && local == "xmlns");
    if is_xmlns != (namespace == Some(XMLNS_NAMESPACE)) {
        return Err(DomError::Namespace);
    }

    let local = if namespace == Some(HTML_NAMESPACE) {
        local.to_ascii_lowercase()
    } else {
        local.to_string()
    };
    Ok(QualName {
        prefix: prefix.map(str::to_string),
        local,
        namespace: namespace.map(str::to_string),
    })
}
