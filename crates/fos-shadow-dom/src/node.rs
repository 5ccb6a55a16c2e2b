//! DOM Node - arena representation
//!
//! Links between nodes are `NodeId` indices into the document arena:
//! - `parent` doubles as the host pointer for shadow roots and pseudo-elements
//! - sibling links are non-owning; the parent's child list owns the child
//! - node-kind behaviour is a closed enum (`NodeData`) with capability queries

use crate::insertion_point::InsertionPointData;
use crate::shadow::ShadowRootData;
use crate::NodeId;

/// HTML namespace URI
pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
/// XML namespace URI (bound to the `xml` prefix)
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// XMLNS namespace URI (bound to the `xmlns` prefix)
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Node type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Attribute,
    Text,
    CDataSection,
    EntityReference,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentType,
    DocumentFragment,
    ShadowRoot,
    PseudoElement,
}

impl NodeType {
    /// Whether nodes of this type may have children at all
    pub fn is_container(self) -> bool {
        matches!(
            self,
            NodeType::Element
                | NodeType::Attribute
                | NodeType::EntityReference
                | NodeType::Document
                | NodeType::DocumentFragment
                | NodeType::ShadowRoot
        )
    }

    /// Whether a node of type `child` may be a direct child of this type.
    ///
    /// Document cardinality (one element, one doctype) is checked separately.
    pub fn child_type_allowed(self, child: NodeType) -> bool {
        use NodeType::*;
        match self {
            Document => matches!(child, Element | ProcessingInstruction | Comment | DocumentType),
            Element | DocumentFragment | ShadowRoot | EntityReference => matches!(
                child,
                Element | ProcessingInstruction | Comment | Text | CDataSection | EntityReference
            ),
            Attribute => matches!(child, Text | EntityReference),
            _ => false,
        }
    }
}

/// Node state bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags(u16);

impl NodeFlags {
    /// Attached to the render tree
    pub const ATTACHED: Self = Self(1 << 0);
    /// Style must be recomputed (and the node attached) on the next update
    pub const NEEDS_STYLE_RECALC: Self = Self(1 << 1);
    /// Node is a shadow root
    pub const IS_SHADOW_ROOT: Self = Self(1 << 2);
    /// Node is an insertion point (`<content>`)
    pub const IS_INSERTION_POINT: Self = Self(1 << 3);
    /// Node is a shadow host or insertion point; its children are not
    /// necessarily its composed children
    pub const NEEDS_COMPOSED_TRAVERSAL: Self = Self(1 << 4);
    /// Reachable from the Document through parent or host links
    pub const IN_DOCUMENT: Self = Self(1 << 5);
    /// A renderer was created for this node
    pub const HAS_RENDERER: Self = Self(1 << 6);

    /// No bits set
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

/// Qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl QualName {
    /// Name in the HTML namespace
    pub fn html(local: &str) -> Self {
        Self {
            prefix: None,
            local: local.to_ascii_lowercase(),
            namespace: Some(HTML_NAMESPACE.to_string()),
        }
    }

    pub fn is_html(&self, local: &str) -> bool {
        self.namespace.as_deref() == Some(HTML_NAMESPACE) && self.local == local
    }
}

/// Element attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Which pseudo-element a `PseudoElement` node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoId {
    Before,
    After,
}

/// Element-specific data
#[derive(Debug)]
pub struct ElementData {
    pub name: QualName,
    pub attributes: Vec<Attribute>,
    /// Present iff the element is an insertion point
    pub(crate) insertion_point: Option<InsertionPointData>,
    pub(crate) before: NodeId,
    pub(crate) after: NodeId,
}

impl ElementData {
    pub fn new(name: QualName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            insertion_point: None,
            before: NodeId::NONE,
            after: NodeId::NONE,
        }
    }

    /// Get attribute value
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Element `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    /// Whether the `class` attribute contains `class`
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|v| v.split_ascii_whitespace().any(|c| c == class))
    }

    /// Insertion point data, if this element is one
    pub fn insertion_point(&self) -> Option<&InsertionPointData> {
        self.insertion_point.as_ref()
    }

    /// Pseudo-element node attached to this element
    pub fn pseudo_element(&self, pseudo: PseudoId) -> Option<NodeId> {
        match pseudo {
            PseudoId::Before => self.before.get(),
            PseudoId::After => self.after.get(),
        }
    }
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    Document,
    DocumentType { name: String },
    DocumentFragment,
    ShadowRoot(ShadowRootData),
    Element(ElementData),
    Text(String),
    Comment(String),
    CDataSection(String),
    ProcessingInstruction { target: String, data: String },
    EntityReference { name: String },
    Attr { name: QualName, value: String },
    PseudoElement(PseudoId),
}

/// DOM Node
#[derive(Debug)]
pub struct Node {
    /// Parent node, or the host for shadow roots and pseudo-elements
    pub(crate) parent: NodeId,
    pub(crate) first_child: NodeId,
    /// Last child (for O(1) append)
    pub(crate) last_child: NodeId,
    pub(crate) prev_sibling: NodeId,
    pub(crate) next_sibling: NodeId,
    pub(crate) flags: NodeFlags,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        let mut flags = NodeFlags::empty();
        match &data {
            NodeData::ShadowRoot(_) => {
                flags.insert(NodeFlags::IS_SHADOW_ROOT);
                flags.insert(NodeFlags::NEEDS_COMPOSED_TRAVERSAL);
            }
            NodeData::Element(e) if e.insertion_point.is_some() => {
                flags.insert(NodeFlags::IS_INSERTION_POINT);
                flags.insert(NodeFlags::NEEDS_COMPOSED_TRAVERSAL);
            }
            _ => {}
        }
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            flags,
            data,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match &self.data {
            NodeData::Document => NodeType::Document,
            NodeData::DocumentType { .. } => NodeType::DocumentType,
            NodeData::DocumentFragment => NodeType::DocumentFragment,
            NodeData::ShadowRoot(_) => NodeType::ShadowRoot,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
            NodeData::CDataSection(_) => NodeType::CDataSection,
            NodeData::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            NodeData::EntityReference { .. } => NodeType::EntityReference,
            NodeData::Attr { .. } => NodeType::Attribute,
            NodeData::PseudoElement(_) => NodeType::PseudoElement,
        }
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self.data, NodeData::Document)
    }

    pub fn is_shadow_root(&self) -> bool {
        self.flags.contains(NodeFlags::IS_SHADOW_ROOT)
    }

    pub fn is_insertion_point(&self) -> bool {
        self.flags.contains(NodeFlags::IS_INSERTION_POINT)
    }

    pub fn is_pseudo_element(&self) -> bool {
        matches!(self.data, NodeData::PseudoElement(_))
    }

    pub fn is_container(&self) -> bool {
        self.node_type().is_container()
    }

    pub fn in_document(&self) -> bool {
        self.flags.contains(NodeFlags::IN_DOCUMENT)
    }

    pub fn attached(&self) -> bool {
        self.flags.contains(NodeFlags::ATTACHED)
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_shadow_root(&self) -> Option<&ShadowRootData> {
        match &self.data {
            NodeData::ShadowRoot(s) => Some(s),
            _ => None,
        }
    }

    /// Text, Comment or CDATA content
    pub fn character_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(s) | NodeData::Comment(s) | NodeData::CDataSection(s) => Some(s),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Light-tree parent. Shadow roots and pseudo-elements have none.
    pub fn parent_node(&self) -> Option<NodeId> {
        if self.is_shadow_root() || self.is_pseudo_element() {
            None
        } else {
            self.parent.get()
        }
    }

    /// Parent, or host for shadow roots and pseudo-elements
    pub fn parent_or_shadow_host(&self) -> Option<NodeId> {
        self.parent.get()
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child.get()
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child.get()
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling.get()
    }

    pub fn previous_sibling(&self) -> Option<NodeId> {
        self.prev_sibling.get()
    }

    pub fn has_children(&self) -> bool {
        self.first_child.is_valid()
    }
}
