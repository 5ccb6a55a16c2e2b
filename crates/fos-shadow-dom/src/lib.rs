//! fOS Shadow DOM - DOM tree with shadow-tree composition
//!
//! Arena-based DOM tree that supports:
//! - Light-tree mutation with mutation events (`insert_before`, `remove_child`, ...)
//! - Shadow roots and `<content>` insertion points with lazy distribution
//! - Composed-tree traversal across shadow boundaries
//! - Event dispatch with shadow retargeting
//!
//! The light tree (parent/child/sibling links) is the only ownership
//! structure. The composed tree is computed on demand by
//! [`ComposedShadowTreeWalker`] from the cached distribution of each
//! [`ElementShadow`].

mod config;
mod container;
mod dispatcher;
mod distributor;
mod document;
mod error;
mod event;
mod event_path;
mod guard;
mod insertion_point;
mod listeners;
mod node;
mod render;
mod shadow;
mod tree;
mod tree_scope;

pub mod composed_walker;
pub mod node_traversal;
pub mod rendering_traversal;

pub use composed_walker::{ComposedShadowTreeWalker, Policy};
pub use config::Config;
pub use container::{NodeOperations, ParserSession};
pub use dispatcher::{DispatchState, EventDispatcher};
pub use distributor::{ContentDistribution, ContentDistributor, Validity};
pub use document::Document;
pub use error::{DomError, DomResult};
pub use event::{Event, EventPhase, EventTarget, EventType};
pub use event_path::{EventContext, EventPath, EventPathWalker, EventRetargeter};
pub use guard::{EventDispatchForbiddenScope, PostAttachCallback, PostAttachQueue};
pub use insertion_point::{CompoundSelector, ContentSelector, InsertionPointData, MatchType};
pub use listeners::{EventCallback, ListenerId, NodeEventHooks};
pub use node::{
    Attribute, ElementData, Node, NodeData, NodeFlags, NodeType, PseudoId, QualName,
    HTML_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE,
};
pub use render::{
    ComputedStyle, DefaultStyleResolver, Display, NullRenderSink, RenderSink, StyleResolver,
};
pub use rendering_traversal::ParentDetails;
pub use shadow::{ElementShadow, ShadowRootData, ShadowRootType};
pub use tree::DomTree;
pub use tree_scope::TreeScope;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Node identifier (index into the document arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The Document node of every arena
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this ID refers to a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// `Some(self)` unless this is the sentinel
    #[inline]
    pub(crate) fn get(self) -> Option<NodeId> {
        if self.is_valid() { Some(self) } else { None }
    }
}

impl From<Option<NodeId>> for NodeId {
    fn from(id: Option<NodeId>) -> Self {
        id.unwrap_or(NodeId::NONE)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#none")
        }
    }
}
