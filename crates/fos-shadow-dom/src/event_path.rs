//! Event paths
//!
//! The path of an event is computed once, before any listener runs, by
//! walking composed ancestors from the target outward. Each context records
//! the target as seen from that node: nodes outside a shadow tree see the
//! host instead of anything inside it.

use crate::event::{Event, EventTarget};
use crate::{Document, NodeId};

/// One stop of an event path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    node: NodeId,
    current_target: EventTarget,
    target: EventTarget,
}

impl EventContext {
    pub fn new(node: NodeId, current_target: EventTarget, target: EventTarget) -> Self {
        Self {
            node,
            current_target,
            target,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn current_target(&self) -> EventTarget {
        self.current_target
    }

    /// Target as seen from this context
    pub fn target(&self) -> EventTarget {
        self.target
    }

    pub fn current_target_same_as_target(&self) -> bool {
        self.current_target == self.target
    }
}

/// Contexts ordered from the target (index 0) outward
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPath(Vec<EventContext>);

impl EventPath {
    pub fn contexts(&self) -> &[EventContext] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EventContext> {
        self.0.get(index)
    }

    pub fn last(&self) -> Option<&EventContext> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventContext> {
        self.0.iter()
    }

    /// Path nodes, target first
    pub fn nodes(&self) -> Vec<NodeId> {
        self.0.iter().map(EventContext::node).collect()
    }
}

impl<'a> IntoIterator for &'a EventPath {
    type Item = &'a EventContext;
    type IntoIter = std::slice::Iter<'a, EventContext>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Upward walk used to build event paths.
///
/// Like the composed walker's parent step, but a projected node goes to
/// every insertion point it was projected through, and shadow roots are
/// visited on the way to their hosts.
#[derive(Debug, Clone)]
pub struct EventPathWalker<'a> {
    doc: &'a Document,
    node: Option<NodeId>,
    /// Node whose distribution is being followed
    distributed_node: NodeId,
    visiting_insertion_point_in_reprojection: bool,
}

impl<'a> EventPathWalker<'a> {
    pub fn new(doc: &'a Document, node: NodeId) -> Self {
        Self {
            doc,
            node: Some(node),
            distributed_node: node,
            visiting_insertion_point_in_reprojection: false,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Whether the last step entered an insertion point the current
    /// distributed node was projected to
    pub fn is_visiting_insertion_point_in_reprojection(&self) -> bool {
        self.visiting_insertion_point_in_reprojection
    }

    pub fn move_to_parent(&mut self) {
        let Some(node) = self.node else {
            return;
        };
        let doc = self.doc;

        if let Some(host) = doc.parent_node(node).filter(|&p| doc.is_shadow_host(p)) {
            if let Some(insertion_point) = doc.assigned_insertion_point(host, self.distributed_node) {
                self.node = Some(insertion_point);
                self.visiting_insertion_point_in_reprojection = true;
                return;
            }
        }

        self.visiting_insertion_point_in_reprojection = false;
        self.node = doc.parent_or_shadow_host(node);
        if let Some(next) = self.node {
            self.distributed_node = next;
        }
    }

    /// Single step from `node`
    pub fn parent(doc: &Document, node: NodeId) -> Option<NodeId> {
        let mut walker = EventPathWalker::new(doc, node);
        walker.move_to_parent();
        walker.node()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchBehavior {
    RetargetEvent,
    StayInsideShadowDom,
}

/// Builds event paths
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRetargeter;

impl EventRetargeter {
    /// Composed path of `event` fired at `node`, target first
    pub fn calculate_event_path(doc: &Document, node: NodeId, event: &Event) -> EventPath {
        let node = event_target_respecting_target_rules(doc, node);
        let in_document = doc.in_document(node);
        let mut contexts = Vec::new();
        let mut target_stack: Vec<NodeId> = Vec::new();

        let mut walker = EventPathWalker::new(doc, node);
        while let Some(current) = walker.node() {
            if in_document && !doc.in_document(current) {
                break;
            }
            match target_stack.last().copied() {
                None => target_stack.push(event_target_respecting_target_rules(doc, current)),
                Some(top) if walker.is_visiting_insertion_point_in_reprojection() => {
                    target_stack.push(top)
                }
                Some(_) => {}
            }
            let target = target_stack.last().copied().unwrap_or(current);
            contexts.push(EventContext::new(
                current,
                EventTarget::Node(event_target_respecting_target_rules(doc, current)),
                EventTarget::Node(target),
            ));

            if doc.is_shadow_root(current) {
                if determine_dispatch_behavior(doc, event, current, target)
                    == DispatchBehavior::StayInsideShadowDom
                {
                    break;
                }
                target_stack.pop();
            }
            walker.move_to_parent();
        }

        tracing::trace!(
            "Event path for {} at {}: {} contexts",
            event.event_type(),
            node,
            contexts.len()
        );
        EventPath(contexts)
    }
}

/// Pseudo-elements are represented by their host
fn event_target_respecting_target_rules(doc: &Document, node: NodeId) -> NodeId {
    match doc.node(node) {
        Some(n) if n.is_pseudo_element() => n.parent_or_shadow_host().unwrap_or(node),
        _ => node,
    }
}

fn determine_dispatch_behavior(
    doc: &Document,
    event: &Event,
    shadow_root: NodeId,
    target: NodeId,
) -> DispatchBehavior {
    if event.event_type().stays_inside_shadow() && doc.containing_shadow_root(target) == Some(shadow_root) {
        DispatchBehavior::StayInsideShadowDom
    } else {
        DispatchBehavior::RetargetEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventType, NodeOperations, PseudoId, ShadowRootType};

    struct Fixture {
        doc: Document,
        parent: NodeId,
        host: NodeId,
        root: NodeId,
        content: NodeId,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new();
        let parent = doc.create_element("body").unwrap();
        doc.append_child(NodeId::ROOT, parent).unwrap();
        let host = doc.create_element("div").unwrap();
        doc.append_child(parent, host).unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        let content = doc.create_content_element(None);
        doc.append_child(root, content).unwrap();
        Fixture { doc, parent, host, root, content }
    }

    fn targets(path: &EventPath) -> Vec<NodeId> {
        path.iter().filter_map(|c| c.target().as_node()).collect()
    }

    #[test]
    fn test_shadow_target_is_retargeted_to_host() {
        let mut f = fixture();
        let inner = f.doc.create_element("span").unwrap();
        f.doc.append_child(f.root, inner).unwrap();

        let event = Event::new(EventType::Click, true, false);
        let path = EventRetargeter::calculate_event_path(&f.doc, inner, &event);
        assert_eq!(path.nodes(), vec![inner, f.root, f.host, f.parent, NodeId::ROOT]);
        assert_eq!(targets(&path), vec![inner, inner, f.host, f.host, f.host]);
        assert!(path.get(0).unwrap().current_target_same_as_target());
        assert!(path.get(2).unwrap().current_target_same_as_target());
    }

    #[test]
    fn test_distributed_light_child_keeps_its_target() {
        let mut f = fixture();
        let light = f.doc.create_element("p").unwrap();
        f.doc.append_child(f.host, light).unwrap();

        let event = Event::new(EventType::Click, true, false);
        let path = EventRetargeter::calculate_event_path(&f.doc, light, &event);
        assert_eq!(
            path.nodes(),
            vec![light, f.content, f.root, f.host, f.parent, NodeId::ROOT]
        );
        assert!(targets(&path).iter().all(|&t| t == light));

        let mut walker = EventPathWalker::new(&f.doc, light);
        walker.move_to_parent();
        assert!(walker.is_visiting_insertion_point_in_reprojection());
        walker.move_to_parent();
        assert!(!walker.is_visiting_insertion_point_in_reprojection());
    }

    #[test]
    fn test_scoped_events_stay_inside_shadow() {
        let mut f = fixture();
        let inner = f.doc.create_element("span").unwrap();
        f.doc.append_child(f.root, inner).unwrap();

        let event = Event::new(EventType::SelectStart, true, false);
        let path = EventRetargeter::calculate_event_path(&f.doc, inner, &event);
        assert_eq!(path.nodes(), vec![inner, f.root]);

        // a light child projected into the shadow is not scoped to it
        let light = f.doc.create_element("p").unwrap();
        f.doc.append_child(f.host, light).unwrap();
        let path = EventRetargeter::calculate_event_path(&f.doc, light, &event);
        assert_eq!(path.last().unwrap().node(), NodeId::ROOT);
    }

    #[test]
    fn test_pseudo_element_target_is_its_host() {
        let mut f = fixture();
        let after = f.doc.create_pseudo_element(f.host, PseudoId::After).unwrap();
        let event = Event::new(EventType::Click, true, false);
        let path = EventRetargeter::calculate_event_path(&f.doc, after, &event);
        assert_eq!(path.nodes(), vec![f.host, f.parent, NodeId::ROOT]);
    }

    #[test]
    fn test_detached_target_gets_full_path() {
        let mut doc = Document::new();
        let a = doc.create_element("div").unwrap();
        let b = doc.create_element("span").unwrap();
        doc.append_child(a, b).unwrap();
        let event = Event::new(EventType::Click, true, false);
        let path = EventRetargeter::calculate_event_path(&doc, b, &event);
        assert_eq!(path.nodes(), vec![b, a]);
        assert_eq!(EventPathWalker::parent(&doc, b), Some(a));
    }
}
