//! Event listeners
//!
//! Listeners are reference-counted callbacks keyed by target. A dispatch
//! snapshots the lists of every target on its path before the first
//! listener runs, so a listener may add or remove listeners (or mutate the
//! tree) while it runs. Additions wait for the next dispatch; removals take
//! effect immediately.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::event::{Event, EventPhase, EventTarget, EventType};
use crate::{Document, NodeId};

/// Listener callback
pub type EventCallback = Rc<dyn Fn(&mut Document, &mut Event)>;

/// Handle returned by [`Document::add_event_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Per-node behaviour around a dispatch. All methods default to no-ops.
pub trait NodeEventHooks {
    /// Runs before the capturing phase when this node is the target
    fn pre_dispatch(&self, _doc: &mut Document, _node: NodeId, _event: &mut Event) {}

    /// Runs after the bubbling phase when this node is the target
    fn post_dispatch(&self, _doc: &mut Document, _node: NodeId, _event: &mut Event) {}

    /// Default action; call `event.set_default_handled()` to consume the event
    fn default_event_handler(&self, _doc: &mut Document, _node: NodeId, _event: &mut Event) {}
}

#[derive(Clone)]
struct RegisteredListener {
    id: ListenerId,
    event_type: EventType,
    capture: bool,
    callback: EventCallback,
    removed: Rc<Cell<bool>>,
}

/// Listener lists of the targets on one dispatch path
#[derive(Clone, Default)]
pub(crate) struct ListenerSnapshot {
    lists: HashMap<EventTarget, Vec<RegisteredListener>>,
}

impl fmt::Debug for ListenerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSnapshot")
            .field("targets", &self.lists.len())
            .finish()
    }
}

/// Listeners and hooks of one document
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    listeners: HashMap<EventTarget, Vec<RegisteredListener>>,
    /// Registered listeners per type, for cheap "anyone listening?" checks
    type_counts: HashMap<EventType, usize>,
    hooks: HashMap<NodeId, Rc<dyn NodeEventHooks>>,
}

impl ListenerRegistry {
    pub(crate) fn has_listeners_of_type(&self, event_type: &EventType) -> bool {
        self.type_counts.get(event_type).is_some_and(|&n| n > 0)
    }

    fn add(&mut self, target: EventTarget, event_type: EventType, capture: bool, callback: EventCallback) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        *self.type_counts.entry(event_type.clone()).or_default() += 1;
        self.listeners.entry(target).or_default().push(RegisteredListener {
            id,
            event_type,
            capture,
            callback,
            removed: Rc::new(Cell::new(false)),
        });
        id
    }

    fn remove(&mut self, target: EventTarget, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(&target) else {
            return false;
        };
        let Some(index) = list.iter().position(|l| l.id == id) else {
            return false;
        };
        let listener = list.remove(index);
        listener.removed.set(true);
        if let Some(count) = self.type_counts.get_mut(&listener.event_type) {
            *count = count.saturating_sub(1);
        }
        true
    }

    fn snapshot(&self, target: EventTarget, event_type: &EventType) -> Vec<RegisteredListener> {
        self.listeners
            .get(&target)
            .map(|list| {
                list.iter()
                    .filter(|l| &l.event_type == event_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn has_listeners(&self, target: EventTarget, event_type: &EventType) -> bool {
        self.listeners
            .get(&target)
            .is_some_and(|list| list.iter().any(|l| &l.event_type == event_type))
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("targets", &self.listeners.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Document {
    /// Register a listener on `target` for `event_type`
    pub fn add_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: impl Into<EventType>,
        capture: bool,
        callback: EventCallback,
    ) -> ListenerId {
        self.listeners.add(target.into(), event_type.into(), capture, callback)
    }

    /// Unregister a listener. A listener removed during a dispatch is not
    /// invoked for the rest of that dispatch.
    pub fn remove_event_listener(&mut self, target: impl Into<EventTarget>, id: ListenerId) -> bool {
        self.listeners.remove(target.into(), id)
    }

    pub fn has_event_listeners(&self, target: impl Into<EventTarget>, event_type: &EventType) -> bool {
        self.listeners.has_listeners(target.into(), event_type)
    }

    /// Install dispatch hooks for `node`, replacing previous ones
    pub fn set_event_hooks(&mut self, node: NodeId, hooks: Rc<dyn NodeEventHooks>) {
        self.listeners.hooks.insert(node, hooks);
    }

    pub(crate) fn event_hooks(&self, node: NodeId) -> Option<Rc<dyn NodeEventHooks>> {
        self.listeners.hooks.get(&node).cloned()
    }

    /// Copy the current listener lists of `targets` for `event_type`
    pub(crate) fn snapshot_listeners(
        &self,
        targets: impl IntoIterator<Item = EventTarget>,
        event_type: &EventType,
    ) -> ListenerSnapshot {
        let mut lists = HashMap::new();
        for target in targets {
            let list = self.listeners.snapshot(target, event_type);
            if !list.is_empty() {
                lists.insert(target, list);
            }
        }
        ListenerSnapshot { lists }
    }

    /// Invoke the snapshotted listeners of `target` that apply to the
    /// event's phase and were not removed since
    pub(crate) fn fire_event_listeners(
        &mut self,
        snapshot: &ListenerSnapshot,
        target: EventTarget,
        event: &mut Event,
    ) {
        let Some(list) = snapshot.lists.get(&target) else {
            return;
        };
        for listener in list {
            if listener.removed.get() {
                continue;
            }
            let applies = match event.phase() {
                EventPhase::Capturing => listener.capture,
                EventPhase::Bubbling => !listener.capture,
                EventPhase::AtTarget => true,
                EventPhase::None => false,
            };
            if !applies {
                continue;
            }
            (listener.callback)(self, event);
            if event.is_immediate_propagation_stopped() {
                break;
            }
        }
    }
}
