//! Event dispatch
//!
//! Runs one event through its precomputed path:
//! PreProcess -> Capturing -> AtTarget -> Bubbling -> PostProcess.
//! Stopping propagation skips straight to PostProcess. The path and the
//! listener lists along it are taken before the first listener runs, so
//! listeners may mutate the tree or register listeners without affecting
//! the dispatch in flight.

use crate::event::{Event, EventPhase, EventTarget, EventType};
use crate::event_path::{EventContext, EventPath, EventRetargeter};
use crate::listeners::ListenerSnapshot;
use crate::{Document, NodeId};

/// Dispatch state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    PreProcess,
    Capturing,
    AtTarget,
    Bubbling,
    PostProcess,
}

/// One dispatch of one event
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    node: NodeId,
    path: EventPath,
    /// Present when the path reaches the Document and a window exists
    window: Option<EventContext>,
    listeners: ListenerSnapshot,
    state: DispatchState,
}

impl EventDispatcher {
    /// Snapshot the path of `event` fired at `node`
    pub fn new(doc: &Document, node: NodeId, event: &Event) -> Self {
        let path = EventRetargeter::calculate_event_path(doc, node, event);
        let window = path
            .last()
            .filter(|top| {
                doc.config.has_window
                    && top.node() == NodeId::ROOT
                    && event.event_type() != &EventType::Load
            })
            .map(|top| EventContext::new(NodeId::ROOT, EventTarget::Window, top.target()));
        // the walk may have started from a pseudo-element's host
        let node = path.get(0).map_or(node, EventContext::node);
        let targets = path
            .contexts()
            .iter()
            .chain(window.as_ref())
            .map(EventContext::current_target);
        let listeners = doc.snapshot_listeners(targets, event.event_type());
        Self {
            node,
            path,
            window,
            listeners,
            state: DispatchState::PreProcess,
        }
    }

    pub fn path(&self) -> &EventPath {
        &self.path
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn has_window_context(&self) -> bool {
        self.window.is_some()
    }

    /// Run the dispatch. Returns whether the default action was not prevented.
    pub fn dispatch(&mut self, doc: &mut Document, event: &mut Event) -> bool {
        event.set_target(Some(EventTarget::Node(self.node)));
        let hooks = doc.event_hooks(self.node);

        self.state = DispatchState::PreProcess;
        if let Some(hooks) = &hooks {
            hooks.pre_dispatch(doc, self.node, event);
        }

        if !self.path.is_empty() && !event.is_propagation_stopped() {
            self.state = DispatchState::Capturing;
            if self.dispatch_capturing(doc, event) {
                self.state = DispatchState::AtTarget;
                if self.dispatch_at_target(doc, event) {
                    self.state = DispatchState::Bubbling;
                    self.dispatch_bubbling(doc, event);
                }
            }
        }

        self.state = DispatchState::PostProcess;
        self.dispatch_post_process(doc, event);

        // listeners see the retargeted target; the caller sees the outermost one
        let final_target = match &self.window {
            Some(window) => Some(window.target()),
            None => self.path.last().map(EventContext::target),
        };
        event.set_target(final_target.or(Some(EventTarget::Node(self.node))));
        event.set_current_target(None);
        !event.is_default_prevented()
    }

    fn handle_local_events(&self, doc: &mut Document, context: &EventContext, event: &mut Event) {
        event.set_target(Some(context.target()));
        event.set_current_target(Some(context.current_target()));
        doc.fire_event_listeners(&self.listeners, context.current_target(), event);
    }

    /// Returns whether dispatch continues
    fn dispatch_capturing(&self, doc: &mut Document, event: &mut Event) -> bool {
        tracing::trace!("Capturing {} towards {}", event.event_type(), self.node);
        event.set_phase(EventPhase::Capturing);
        if let Some(window) = &self.window {
            self.handle_local_events(doc, window, event);
            if event.is_propagation_stopped() {
                return false;
            }
        }

        for context in self.path.contexts()[1..].iter().rev() {
            if context.current_target_same_as_target() {
                // retargeted host: handled as at-target while bubbling
                if event.bubbles {
                    continue;
                }
                event.set_phase(EventPhase::AtTarget);
            } else {
                event.set_phase(EventPhase::Capturing);
            }
            self.handle_local_events(doc, context, event);
            if event.is_propagation_stopped() {
                return false;
            }
        }
        true
    }

    fn dispatch_at_target(&self, doc: &mut Document, event: &mut Event) -> bool {
        event.set_phase(EventPhase::AtTarget);
        if let Some(target) = self.path.get(0) {
            self.handle_local_events(doc, target, event);
        }
        !event.is_propagation_stopped()
    }

    fn dispatch_bubbling(&self, doc: &mut Document, event: &mut Event) {
        if !event.bubbles {
            return;
        }
        tracing::trace!("Bubbling {} from {}", event.event_type(), self.node);
        for context in &self.path.contexts()[1..] {
            // cancelBubble only silences the bubbling phase; retargeted
            // hosts still see the event at target
            let phase = if context.current_target_same_as_target() {
                EventPhase::AtTarget
            } else if !event.cancel_bubble() {
                EventPhase::Bubbling
            } else {
                continue;
            };
            event.set_phase(phase);
            self.handle_local_events(doc, context, event);
            if event.is_propagation_stopped() {
                return;
            }
        }
        if let Some(window) = &self.window {
            if !event.cancel_bubble() {
                event.set_phase(EventPhase::Bubbling);
                self.handle_local_events(doc, window, event);
            }
        }
    }

    fn dispatch_post_process(&self, doc: &mut Document, event: &mut Event) {
        event.set_target(Some(EventTarget::Node(self.node)));
        event.set_current_target(None);
        event.set_phase(EventPhase::None);

        if let Some(hooks) = doc.event_hooks(self.node) {
            hooks.post_dispatch(doc, self.node, event);
        }

        if event.is_default_prevented() || event.is_default_handled() {
            return;
        }
        // non-bubbling events only run the target's default handler
        let limit = if event.bubbles { self.path.len() } else { 1 };
        for node in self.path.nodes().into_iter().take(limit) {
            if let Some(hooks) = doc.event_hooks(node) {
                hooks.default_event_handler(doc, node, event);
            }
            if event.is_default_handled() {
                return;
            }
        }
    }
}

impl Document {
    /// Dispatch `event` at `node`. Returns whether the default action was
    /// not prevented.
    pub fn dispatch_event(&mut self, node: NodeId, event: &mut Event) -> bool {
        if !self.tree.contains(node) {
            return !event.is_default_prevented();
        }
        if self.is_event_dispatch_forbidden() {
            debug_assert!(false, "event dispatch while forbidden: {}", event.event_type());
            tracing::warn!("Dispatching {} at {} while event dispatch is forbidden", event.event_type(), node);
        }
        let mut dispatcher = EventDispatcher::new(self, node, event);
        dispatcher.dispatch(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeEventHooks, NodeOperations, ShadowRootType};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(NodeId, EventPhase)>>>;

    fn listen(doc: &mut Document, node: NodeId, capture: bool, log: &Log) {
        let log = Rc::clone(log);
        doc.add_event_listener(
            node,
            EventType::Click,
            capture,
            Rc::new(move |_: &mut Document, event: &mut Event| {
                let current = event.current_target().and_then(EventTarget::as_node);
                if let Some(current) = current {
                    log.borrow_mut().push((current, event.phase()));
                }
            }),
        );
    }

    fn chain(doc: &mut Document) -> (NodeId, NodeId, NodeId) {
        let a = doc.create_element("div").unwrap();
        let b = doc.create_element("div").unwrap();
        let c = doc.create_element("div").unwrap();
        doc.append_child(NodeId::ROOT, a).unwrap();
        doc.append_child(a, b).unwrap();
        doc.append_child(b, c).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_capture_target_bubble_order() {
        let mut doc = Document::new();
        let (a, b, c) = chain(&mut doc);
        let log: Log = Rc::default();
        for node in [a, b, c] {
            listen(&mut doc, node, true, &log);
            listen(&mut doc, node, false, &log);
        }

        let mut event = Event::new(EventType::Click, true, true);
        assert!(doc.dispatch_event(c, &mut event));
        assert_eq!(
            *log.borrow(),
            vec![
                (a, EventPhase::Capturing),
                (b, EventPhase::Capturing),
                (c, EventPhase::AtTarget),
                (c, EventPhase::AtTarget),
                (b, EventPhase::Bubbling),
                (a, EventPhase::Bubbling),
            ]
        );
        assert_eq!(event.target(), Some(EventTarget::Node(c)));
        assert_eq!(event.current_target(), None);
        assert_eq!(event.phase(), EventPhase::None);
    }

    #[test]
    fn test_stop_propagation_skips_to_post_process() {
        let mut doc = Document::new();
        let (a, b, c) = chain(&mut doc);
        let log: Log = Rc::default();
        doc.add_event_listener(
            a,
            EventType::Click,
            true,
            Rc::new(|_: &mut Document, event: &mut Event| event.stop_propagation()),
        );
        listen(&mut doc, b, false, &log);
        listen(&mut doc, c, false, &log);

        let mut event = Event::new(EventType::Click, true, false);
        doc.dispatch_event(c, &mut event);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_non_bubbling_event_skips_bubble_phase() {
        let mut doc = Document::new();
        let (a, _, c) = chain(&mut doc);
        let log: Log = Rc::default();
        listen(&mut doc, a, true, &log);
        listen(&mut doc, a, false, &log);
        listen(&mut doc, c, false, &log);

        let mut event = Event::new(EventType::Click, false, false);
        doc.dispatch_event(c, &mut event);
        assert_eq!(
            *log.borrow(),
            vec![(a, EventPhase::Capturing), (c, EventPhase::AtTarget)]
        );
    }

    #[test]
    fn test_window_context() {
        let mut doc = Document::new();
        let (_, _, c) = chain(&mut doc);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        doc.add_event_listener(
            EventTarget::Window,
            EventType::Click,
            false,
            Rc::new(move |_: &mut Document, event: &mut Event| s.borrow_mut().push(event.target())),
        );

        let mut event = Event::new(EventType::Click, true, false);
        let dispatcher = EventDispatcher::new(&doc, c, &event);
        assert!(dispatcher.has_window_context());
        doc.dispatch_event(c, &mut event);
        assert_eq!(*seen.borrow(), vec![Some(EventTarget::Node(c))]);

        let load = Event::new(EventType::Load, false, false);
        assert!(!EventDispatcher::new(&doc, c, &load).has_window_context());

        let detached = doc.create_element("p").unwrap();
        assert!(!EventDispatcher::new(&doc, detached, &event).has_window_context());
    }

    struct Defaults {
        log: Rc<RefCell<Vec<NodeId>>>,
        consume: bool,
    }

    impl NodeEventHooks for Defaults {
        fn default_event_handler(&self, _doc: &mut Document, node: NodeId, event: &mut Event) {
            self.log.borrow_mut().push(node);
            if self.consume {
                event.set_default_handled();
            }
        }
    }

    #[test]
    fn test_default_handlers_run_until_handled() {
        let mut doc = Document::new();
        let (a, b, c) = chain(&mut doc);
        let log = Rc::new(RefCell::new(Vec::new()));
        for (node, consume) in [(a, false), (b, true), (c, false)] {
            let hooks = Defaults { log: Rc::clone(&log), consume };
            doc.set_event_hooks(node, Rc::new(hooks));
        }

        let mut event = Event::new(EventType::Click, true, true);
        doc.dispatch_event(c, &mut event);
        assert_eq!(*log.borrow(), vec![c, b]);

        log.borrow_mut().clear();
        let mut event = Event::new(EventType::Click, true, true);
        doc.add_event_listener(
            c,
            EventType::Click,
            false,
            Rc::new(|_: &mut Document, event: &mut Event| event.prevent_default()),
        );
        assert!(!doc.dispatch_event(c, &mut event));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_final_target_is_outermost_retargeted() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        doc.append_child(NodeId::ROOT, host).unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        let inner = doc.create_element("span").unwrap();
        doc.append_child(root, inner).unwrap();

        let mut event = Event::new(EventType::Click, true, false);
        doc.dispatch_event(inner, &mut event);
        assert_eq!(event.target(), Some(EventTarget::Node(host)));
    }

    #[test]
    fn test_listener_added_during_dispatch_waits() {
        let mut doc = Document::new();
        let (_, b, c) = chain(&mut doc);
        let late = Rc::new(RefCell::new(0));
        let l = Rc::clone(&late);
        doc.add_event_listener(
            c,
            EventType::Click,
            false,
            Rc::new(move |doc: &mut Document, _: &mut Event| {
                let l = Rc::clone(&l);
                doc.add_event_listener(
                    b,
                    EventType::Click,
                    false,
                    Rc::new(move |_: &mut Document, _: &mut Event| *l.borrow_mut() += 1),
                );
            }),
        );

        let mut event = Event::new(EventType::Click, true, false);
        doc.dispatch_event(c, &mut event);
        assert_eq!(*late.borrow(), 0);

        // registered by the first dispatch; the second one adds another
        let mut event = Event::new(EventType::Click, true, false);
        doc.dispatch_event(c, &mut event);
        assert_eq!(*late.borrow(), 1);
    }

    #[test]
    fn test_cancel_bubble_keeps_retargeted_host_at_target() {
        let mut doc = Document::new();
        let host = doc.create_element("div").unwrap();
        doc.append_child(NodeId::ROOT, host).unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        let inner = doc.create_element("span").unwrap();
        doc.append_child(root, inner).unwrap();

        let log: Log = Rc::default();
        doc.add_event_listener(
            inner,
            EventType::Click,
            false,
            Rc::new(|_: &mut Document, event: &mut Event| event.set_cancel_bubble(true)),
        );
        listen(&mut doc, root, false, &log);
        listen(&mut doc, host, false, &log);
        listen(&mut doc, NodeId::ROOT, false, &log);

        let mut event = Event::new(EventType::Click, true, false);
        doc.dispatch_event(inner, &mut event);
        assert_eq!(*log.borrow(), vec![(host, EventPhase::AtTarget)]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "event dispatch while forbidden")]
    fn test_dispatch_while_forbidden_asserts() {
        let mut doc = Document::new();
        let counter = doc.dispatch_counter.clone();
        let _scope = counter.enter();
        let mut event = Event::new(EventType::Click, true, false);
        doc.dispatch_event(NodeId::ROOT, &mut event);
    }
}
