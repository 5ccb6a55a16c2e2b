//! DOM Events
//!
//! The event object passed to listeners, plus the mutation events the tree
//! fires on structural and attribute changes.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::NodeId;

/// DOM event types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    // Node mutation events
    DomNodeInserted,
    DomNodeRemoved,
    DomNodeInsertedIntoDocument,
    DomNodeRemovedFromDocument,
    DomSubtreeModified,
    DomAttrModified,
    DomCharacterDataModified,

    // Events that never leave the shadow tree of their target
    Abort,
    Change,
    Error,
    Load,
    Reset,
    Resize,
    Scroll,
    Select,
    SelectStart,

    // UI
    Click,
    Focus,
    Blur,
    Input,

    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::DomNodeInserted => "DOMNodeInserted",
            EventType::DomNodeRemoved => "DOMNodeRemoved",
            EventType::DomNodeInsertedIntoDocument => "DOMNodeInsertedIntoDocument",
            EventType::DomNodeRemovedFromDocument => "DOMNodeRemovedFromDocument",
            EventType::DomSubtreeModified => "DOMSubtreeModified",
            EventType::DomAttrModified => "DOMAttrModified",
            EventType::DomCharacterDataModified => "DOMCharacterDataModified",
            EventType::Abort => "abort",
            EventType::Change => "change",
            EventType::Error => "error",
            EventType::Load => "load",
            EventType::Reset => "reset",
            EventType::Resize => "resize",
            EventType::Scroll => "scroll",
            EventType::Select => "select",
            EventType::SelectStart => "selectstart",
            EventType::Click => "click",
            EventType::Focus => "focus",
            EventType::Blur => "blur",
            EventType::Input => "input",
            EventType::Custom(name) => name,
        }
    }

    pub fn is_mutation_event(&self) -> bool {
        matches!(
            self,
            EventType::DomNodeInserted
                | EventType::DomNodeRemoved
                | EventType::DomNodeInsertedIntoDocument
                | EventType::DomNodeRemovedFromDocument
                | EventType::DomSubtreeModified
                | EventType::DomAttrModified
                | EventType::DomCharacterDataModified
        )
    }

    /// Legacy event types whose path ends at the shadow root of the target
    pub fn stays_inside_shadow(&self) -> bool {
        matches!(
            self,
            EventType::Abort
                | EventType::Change
                | EventType::Error
                | EventType::Load
                | EventType::Reset
                | EventType::Resize
                | EventType::Scroll
                | EventType::Select
                | EventType::SelectStart
        )
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        match name {
            "DOMNodeInserted" => EventType::DomNodeInserted,
            "DOMNodeRemoved" => EventType::DomNodeRemoved,
            "DOMNodeInsertedIntoDocument" => EventType::DomNodeInsertedIntoDocument,
            "DOMNodeRemovedFromDocument" => EventType::DomNodeRemovedFromDocument,
            "DOMSubtreeModified" => EventType::DomSubtreeModified,
            "DOMAttrModified" => EventType::DomAttrModified,
            "DOMCharacterDataModified" => EventType::DomCharacterDataModified,
            "abort" => EventType::Abort,
            "change" => EventType::Change,
            "error" => EventType::Error,
            "load" => EventType::Load,
            "reset" => EventType::Reset,
            "resize" => EventType::Resize,
            "scroll" => EventType::Scroll,
            "select" => EventType::Select,
            "selectstart" => EventType::SelectStart,
            "click" => EventType::Click,
            "focus" => EventType::Focus,
            "blur" => EventType::Blur,
            "input" => EventType::Input,
            other => EventType::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// Something listeners can be registered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Node(NodeId),
    /// The document's window, the last stop of paths that reach the Document
    Window,
}

impl EventTarget {
    pub fn as_node(self) -> Option<NodeId> {
        match self {
            EventTarget::Node(id) => Some(id),
            EventTarget::Window => None,
        }
    }
}

impl From<NodeId> for EventTarget {
    fn from(id: NodeId) -> Self {
        EventTarget::Node(id)
    }
}

/// DOM event
#[derive(Debug, Clone)]
pub struct Event {
    event_type: EventType,
    pub bubbles: bool,
    pub cancelable: bool,
    pub related_node: Option<NodeId>,
    pub prev_value: Option<String>,
    pub new_value: Option<String>,
    pub attr_name: Option<String>,
    /// Milliseconds since the Unix epoch at creation
    pub timestamp: f64,
    target: Option<EventTarget>,
    current_target: Option<EventTarget>,
    phase: EventPhase,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
    cancel_bubble: bool,
    default_handled: bool,
}

impl Event {
    pub fn new(event_type: impl Into<EventType>, bubbles: bool, cancelable: bool) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64() * 1000.0);
        Self {
            event_type: event_type.into(),
            bubbles,
            cancelable,
            related_node: None,
            prev_value: None,
            new_value: None,
            attr_name: None,
            timestamp,
            target: None,
            current_target: None,
            phase: EventPhase::None,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            cancel_bubble: false,
            default_handled: false,
        }
    }

    /// Create node inserted event, fired on the inserted node
    pub fn node_inserted(parent: NodeId) -> Self {
        let mut event = Self::new(EventType::DomNodeInserted, true, false);
        event.related_node = Some(parent);
        event
    }

    /// Create node removed event, fired on the node about to be removed
    pub fn node_removed(parent: NodeId) -> Self {
        let mut event = Self::new(EventType::DomNodeRemoved, true, false);
        event.related_node = Some(parent);
        event
    }

    pub fn node_inserted_into_document() -> Self {
        Self::new(EventType::DomNodeInsertedIntoDocument, false, false)
    }

    pub fn node_removed_from_document() -> Self {
        Self::new(EventType::DomNodeRemovedFromDocument, false, false)
    }

    pub fn subtree_modified() -> Self {
        Self::new(EventType::DomSubtreeModified, true, false)
    }

    /// Create attribute modified event
    pub fn attr_modified(name: &str, old_value: Option<&str>, new_value: Option<&str>) -> Self {
        let mut event = Self::new(EventType::DomAttrModified, true, false);
        event.attr_name = Some(name.to_string());
        event.prev_value = old_value.map(str::to_string);
        event.new_value = new_value.map(str::to_string);
        event
    }

    /// Create character data modified event
    pub fn char_data_modified(old_value: &str, new_value: &str) -> Self {
        let mut event = Self::new(EventType::DomCharacterDataModified, true, false);
        event.prev_value = Some(old_value.to_string());
        event.new_value = Some(new_value.to_string());
        event
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// Target as seen from the current context
    pub fn target(&self) -> Option<EventTarget> {
        self.target
    }

    pub fn current_target(&self) -> Option<EventTarget> {
        self.current_target
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    /// Prevent default action (ignored unless cancelable)
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop after the current context's listeners
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stop before the next listener
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped
    }

    /// Legacy `cancelBubble`: stops the bubbling phase only
    pub fn set_cancel_bubble(&mut self, value: bool) {
        self.cancel_bubble = value;
    }

    pub fn cancel_bubble(&self) -> bool {
        self.cancel_bubble
    }

    /// Mark the default action as performed; later default handlers are skipped
    pub fn set_default_handled(&mut self) {
        self.default_handled = true;
    }

    pub fn is_default_handled(&self) -> bool {
        self.default_handled
    }

    pub(crate) fn set_target(&mut self, target: Option<EventTarget>) {
        self.target = target;
    }

    pub(crate) fn set_current_target(&mut self, target: Option<EventTarget>) {
        self.current_target = target;
    }

    pub(crate) fn set_phase(&mut self, phase: EventPhase) {
        self.phase = phase;
    }
}
