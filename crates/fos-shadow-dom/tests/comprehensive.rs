//! Comprehensive tests for fos-shadow-dom
//!
//! Distribution, composed traversal and event dispatch across shadow
//! boundaries, plus the tree-integrity and ordering properties the rest of
//! the engine relies on.

use std::cell::RefCell;
use std::rc::Rc;

use fos_shadow_dom::{
    ComposedShadowTreeWalker, Document, Event, EventPhase, EventTarget, EventType, NodeId,
    NodeOperations, Policy, ShadowRootType, Validity,
};

/// Host with a shadow root holding one insertion point, plus three light children
struct Fixture {
    doc: Document,
    host: NodeId,
    root: NodeId,
    content: NodeId,
    children: [NodeId; 3],
}

fn fixture(select: Option<&str>) -> Fixture {
    let mut doc = Document::new();
    let host = doc.create_element("div").unwrap();
    doc.append_child(NodeId::ROOT, host).unwrap();
    let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
    let content = doc.create_content_element(select);
    doc.append_child(root, content).unwrap();

    let mut children = [NodeId::ROOT; 3];
    for (i, slot) in children.iter_mut().enumerate() {
        let child = doc.create_element("span").unwrap();
        if i == 1 {
            doc.set_attribute(child, "class", "pick").unwrap();
        }
        doc.append_child(host, child).unwrap();
        *slot = child;
    }
    Fixture {
        doc,
        host,
        root,
        content,
        children,
    }
}

fn composed_children(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let mut walker = ComposedShadowTreeWalker::new(doc, node, Policy::CrossUpperBoundary);
    let mut out = Vec::new();
    let mut current = walker.first_child();
    while let Some(child) = current {
        out.push(child);
        current = walker.next_sibling();
    }
    out
}

fn composed_order(doc: &Document) -> Vec<NodeId> {
    let mut walker = ComposedShadowTreeWalker::new(doc, NodeId::ROOT, Policy::CrossUpperBoundary);
    let mut out = vec![NodeId::ROOT];
    while let Some(node) = walker.next() {
        out.push(node);
    }
    out
}

type Log = Rc<RefCell<Vec<(NodeId, EventPhase, Option<EventTarget>)>>>;

fn listen(doc: &mut Document, node: NodeId, capture: bool, log: &Log) {
    let log = Rc::clone(log);
    doc.add_event_listener(
        node,
        EventType::Click,
        capture,
        Rc::new(move |_: &mut Document, event: &mut Event| {
            log.borrow_mut().push((node, event.phase(), event.target()));
        }),
    );
}

// ============================================================================
// DISTRIBUTION
// ============================================================================

#[test]
fn test_unfiltered_insertion_point_takes_every_child() {
    let f = fixture(None);
    assert_eq!(f.doc.distributed_nodes(f.content), f.children.to_vec());
    for child in f.children {
        assert_eq!(f.doc.insertion_point_for(child), Some(f.content));
    }

    let mut walker = ComposedShadowTreeWalker::new(&f.doc, f.host, Policy::CrossUpperBoundary);
    assert_eq!(walker.first_child(), Some(f.children[0]));
    assert_eq!(walker.next_sibling(), Some(f.children[1]));
    assert_eq!(walker.next_sibling(), Some(f.children[2]));
    assert_eq!(walker.next_sibling(), None);
}

#[test]
fn test_selector_distributes_matching_child_only() {
    let f = fixture(Some(".pick"));
    let [c1, c2, c3] = f.children;
    assert_eq!(f.doc.distributed_nodes(f.content), vec![c2]);
    assert_eq!(f.doc.insertion_point_for(c1), None);
    assert_eq!(f.doc.insertion_point_for(c2), Some(f.content));
    assert_eq!(f.doc.insertion_point_for(c3), None);
    assert_eq!(composed_children(&f.doc, f.host), vec![c2]);
}

#[test]
fn test_removing_distributed_child_invalidates() {
    let mut f = fixture(Some(".pick"));
    let c2 = f.children[1];
    assert_eq!(composed_children(&f.doc, f.host), vec![c2]);
    assert_eq!(f.doc.distribution_validity(f.host), Some(Validity::Valid));

    f.doc.remove_child(f.host, c2).unwrap();
    assert_eq!(f.doc.distribution_validity(f.host), Some(Validity::Invalidated));

    f.doc.ensure_distribution(f.root);
    assert_eq!(f.doc.distribution_validity(f.host), Some(Validity::Valid));
    assert!(f.doc.distributed_nodes(f.content).is_empty());
    assert!(!f.doc.has_distribution(f.content));
    assert!(composed_children(&f.doc, f.host).is_empty());
}

#[test]
fn test_first_insertion_point_wins() {
    let mut f = fixture(Some("span"));
    let second = f.doc.create_content_element(None);
    f.doc.append_child(f.root, second).unwrap();

    assert_eq!(f.doc.distributed_nodes(f.content), f.children.to_vec());
    assert!(f.doc.distributed_nodes(second).is_empty());

    let text = f.doc.create_text_node("tail");
    f.doc.append_child(f.host, text).unwrap();
    assert_eq!(f.doc.distributed_nodes(second), vec![text]);
}

#[test]
fn test_distribution_is_stable_across_invalidation() {
    let mut f = fixture(Some(".pick"));
    let catch_all = f.doc.create_content_element(None);
    f.doc.append_child(f.root, catch_all).unwrap();

    let snapshot = |doc: &Document, children: &[NodeId]| -> Vec<Option<NodeId>> {
        children.iter().map(|&c| doc.insertion_point_for(c)).collect()
    };
    let before = snapshot(&f.doc, &f.children);
    for _ in 0..3 {
        f.doc.invalidate_distribution(f.host);
        assert_eq!(snapshot(&f.doc, &f.children), before);
    }
    assert_eq!(
        before,
        vec![Some(catch_all), Some(f.content), Some(catch_all)]
    );
}

#[test]
fn test_fallback_content_shows_without_distribution() {
    let mut doc = Document::new();
    let host = doc.create_element("div").unwrap();
    let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
    let content = doc.create_content_element(Some("#nothing"));
    let fallback = doc.create_text_node("fallback");
    doc.append_child(root, content).unwrap();
    doc.append_child(content, fallback).unwrap();
    let light = doc.create_element("p").unwrap();
    doc.append_child(host, light).unwrap();

    assert_eq!(composed_children(&doc, host), vec![fallback]);

    doc.set_attribute(light, "id", "nothing").unwrap();
    assert_eq!(composed_children(&doc, host), vec![light]);
}

#[test]
fn test_reprojection_through_nested_hosts() {
    let mut doc = Document::new();
    let outer = doc.create_element("div").unwrap();
    let outer_root = doc.add_shadow_root(outer, ShadowRootType::Author).unwrap();
    let inner = doc.create_element("div").unwrap();
    doc.append_child(outer_root, inner).unwrap();
    let outer_content = doc.create_content_element(None);
    doc.append_child(inner, outer_content).unwrap();
    let inner_root = doc.add_shadow_root(inner, ShadowRootType::Author).unwrap();
    let inner_content = doc.create_content_element(None);
    doc.append_child(inner_root, inner_content).unwrap();

    let light = doc.create_element("b").unwrap();
    doc.append_child(outer, light).unwrap();

    assert_eq!(doc.distributed_nodes(outer_content), vec![light]);
    assert_eq!(doc.distributed_nodes(inner_content), vec![light]);
    assert_eq!(composed_children(&doc, inner), vec![light]);

    let mut walker = ComposedShadowTreeWalker::new(&doc, light, Policy::CrossUpperBoundary);
    assert_eq!(walker.parent(), Some(inner));
    assert_eq!(walker.parent(), Some(outer));
}

// ============================================================================
// COMPOSED TRAVERSAL
// ============================================================================

#[test]
fn test_next_and_previous_are_inverse() {
    let mut f = fixture(Some(".pick"));
    let header = f.doc.create_element("header").unwrap();
    f.doc.insert_before(f.root, header, Some(f.content)).unwrap();
    let footer = f.doc.create_element("footer").unwrap();
    f.doc.append_child(f.root, footer).unwrap();
    let footer_text = f.doc.create_text_node("end");
    f.doc.append_child(footer, footer_text).unwrap();

    let order = composed_order(&f.doc);
    assert!(order.contains(&f.children[1]));
    assert!(!order.contains(&f.children[0]));
    assert!(!order.contains(&f.content));

    for pair in order.windows(2) {
        let mut walker = ComposedShadowTreeWalker::new(&f.doc, pair[1], Policy::CrossUpperBoundary);
        assert_eq!(walker.previous(), Some(pair[0]), "previous of {}", pair[1]);
    }
}

#[test]
fn test_do_not_cross_upper_boundary_stops_at_root() {
    let mut f = fixture(None);
    let inner = f.doc.create_element("em").unwrap();
    f.doc.append_child(f.root, inner).unwrap();

    let mut walker = ComposedShadowTreeWalker::new(&f.doc, inner, Policy::DoNotCrossUpperBoundary);
    assert_eq!(walker.parent(), Some(f.root));

    let mut walker = ComposedShadowTreeWalker::new(&f.doc, inner, Policy::CrossUpperBoundary);
    assert_eq!(walker.parent(), Some(f.host));
}

// ============================================================================
// EVENT DISPATCH
// ============================================================================

#[test]
fn test_fallback_target_is_retargeted_outside_shadow() {
    let mut doc = Document::new();
    let p = doc.create_element("body").unwrap();
    doc.append_child(NodeId::ROOT, p).unwrap();
    let host = doc.create_element("div").unwrap();
    doc.append_child(p, host).unwrap();
    let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
    let content = doc.create_content_element(None);
    doc.append_child(root, content).unwrap();
    let c2 = doc.create_element("span").unwrap();
    doc.append_child(content, c2).unwrap();

    let log: Log = Rc::default();
    for node in [c2, content, host, p] {
        listen(&mut doc, node, false, &log);
    }

    let mut event = Event::new(EventType::Click, true, false);
    doc.dispatch_event(c2, &mut event);

    let log = log.borrow();
    let order: Vec<NodeId> = log.iter().map(|(n, _, _)| *n).collect();
    assert_eq!(order, vec![c2, content, host, p]);
    assert_eq!(log[0].1, EventPhase::AtTarget);
    assert_eq!(log[0].2, Some(EventTarget::Node(c2)));
    assert_eq!(log[1].2, Some(EventTarget::Node(c2)));
    assert_eq!(log[2].1, EventPhase::AtTarget);
    assert_eq!(log[3].2, Some(EventTarget::Node(host)));
    assert_eq!(event.target(), Some(EventTarget::Node(host)));
}

#[test]
fn test_capture_runs_outside_in_and_bubble_inside_out() {
    let mut doc = Document::new();
    let body = doc.create_element("body").unwrap();
    doc.append_child(NodeId::ROOT, body).unwrap();
    let host = doc.create_element("div").unwrap();
    doc.append_child(body, host).unwrap();
    let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
    let inner = doc.create_element("button").unwrap();
    doc.append_child(root, inner).unwrap();

    let log: Log = Rc::default();
    for node in [NodeId::ROOT, body, host, root, inner] {
        listen(&mut doc, node, true, &log);
        listen(&mut doc, node, false, &log);
    }
    let mut event = Event::new(EventType::Click, true, false);
    doc.dispatch_event(inner, &mut event);

    let log = log.borrow();
    let capture: Vec<NodeId> = log
        .iter()
        .filter(|(_, phase, _)| *phase == EventPhase::Capturing)
        .map(|(n, _, _)| *n)
        .collect();
    let bubble: Vec<NodeId> = log
        .iter()
        .filter(|(_, phase, _)| *phase == EventPhase::Bubbling)
        .map(|(n, _, _)| *n)
        .collect();
    assert_eq!(capture, vec![NodeId::ROOT, body, root]);
    assert_eq!(bubble, vec![root, body, NodeId::ROOT]);

    // the target runs exactly once per listener; the host sees itself as target
    let at_target: Vec<NodeId> = log
        .iter()
        .filter(|(_, phase, _)| *phase == EventPhase::AtTarget)
        .map(|(n, _, _)| *n)
        .collect();
    assert_eq!(at_target.iter().filter(|&&n| n == inner).count(), 2);
    assert_eq!(at_target.iter().filter(|&&n| n == host).count(), 2);
}

#[test]
fn test_outside_listeners_never_see_shadow_nodes() {
    let mut doc = Document::new();
    let body = doc.create_element("body").unwrap();
    doc.append_child(NodeId::ROOT, body).unwrap();
    let host = doc.create_element("div").unwrap();
    doc.append_child(body, host).unwrap();
    let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
    let a = doc.create_element("div").unwrap();
    let b = doc.create_element("span").unwrap();
    doc.append_child(root, a).unwrap();
    doc.append_child(a, b).unwrap();

    let log: Log = Rc::default();
    for node in [NodeId::ROOT, body, host] {
        listen(&mut doc, node, true, &log);
        listen(&mut doc, node, false, &log);
    }
    for target in [a, b] {
        let mut event = Event::new(EventType::Click, true, false);
        doc.dispatch_event(target, &mut event);
    }
    assert!(!log.borrow().is_empty());
    for (_, _, target) in log.borrow().iter() {
        assert_eq!(*target, Some(EventTarget::Node(host)));
    }
}

// ============================================================================
// MUTATION
// ============================================================================

#[test]
fn test_fragment_insertion_stops_when_listener_steals_next_child() {
    let mut doc = Document::new();
    let container = doc.create_element("div").unwrap();
    doc.append_child(NodeId::ROOT, container).unwrap();
    let fragment = doc.create_document_fragment();
    let x = doc.create_element("x").unwrap();
    let y = doc.create_element("y").unwrap();
    let z = doc.create_element("z").unwrap();
    for n in [x, y, z] {
        doc.append_child(fragment, n).unwrap();
    }

    doc.add_event_listener(
        container,
        EventType::DomNodeInserted,
        false,
        Rc::new(move |doc: &mut Document, event: &mut Event| {
            if event.target() == Some(EventTarget::Node(x)) {
                doc.remove_child(fragment, y).unwrap();
            }
        }),
    );

    assert_eq!(doc.insert_before(container, fragment, None), Ok(fragment));
    assert_eq!(doc.child_nodes(container), vec![x]);
    assert_eq!(doc.child_nodes(fragment), vec![z]);
    assert_eq!(doc.parent_node(y), None);
    assert!(doc.tree().check_child_list(container));
    assert!(doc.tree().check_child_list(fragment));
}

#[test]
fn test_random_mutations_keep_child_lists_consistent() {
    let mut doc = Document::new();
    let mut nodes = vec![NodeId::ROOT];
    let html = doc.create_element("html").unwrap();
    doc.append_child(NodeId::ROOT, html).unwrap();
    nodes.push(html);
    for i in 0..24 {
        let node = if i % 5 == 4 {
            doc.create_text_node("t")
        } else {
            doc.create_element("div").unwrap()
        };
        nodes.push(node);
    }

    // small deterministic generator
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: usize| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % bound as u64) as usize
    };

    for _ in 0..500 {
        let parent = nodes[next(nodes.len())];
        let child = nodes[next(nodes.len())];
        let _ = match next(4) {
            0 => doc.append_child(parent, child),
            1 => {
                let reference = doc.first_child(parent);
                doc.insert_before(parent, child, reference)
            }
            2 => match doc.parent_node(child) {
                Some(p) => doc.remove_child(p, child),
                None => Ok(child),
            },
            _ => match doc.last_child(parent) {
                Some(old) => doc.replace_child(parent, child, old),
                None => Ok(child),
            },
        };
        for &n in &nodes {
            assert!(doc.tree().check_child_list(n), "broken child list at {}", n);
        }
    }

    // every node is the child of its parent exactly once
    for &n in &nodes {
        if let Some(parent) = doc.parent_node(n) {
            assert_eq!(doc.child_nodes(parent).iter().filter(|&&c| c == n).count(), 1);
        }
    }
    assert!(doc.child_nodes(NodeId::ROOT).len() <= 1);
}

#[test]
fn test_listener_mutation_does_not_disturb_dispatch() {
    let mut doc = Document::new();
    let body = doc.create_element("body").unwrap();
    doc.append_child(NodeId::ROOT, body).unwrap();
    let section = doc.create_element("section").unwrap();
    doc.append_child(body, section).unwrap();
    let button = doc.create_element("button").unwrap();
    doc.append_child(section, button).unwrap();

    doc.add_event_listener(
        button,
        EventType::Click,
        false,
        Rc::new(move |doc: &mut Document, _: &mut Event| {
            doc.remove_child(body, section).unwrap();
        }),
    );
    let log: Log = Rc::default();
    listen(&mut doc, section, false, &log);
    listen(&mut doc, body, false, &log);

    let mut event = Event::new(EventType::Click, true, false);
    doc.dispatch_event(button, &mut event);

    let order: Vec<NodeId> = log.borrow().iter().map(|(n, _, _)| *n).collect();
    assert_eq!(order, vec![section, body]);
    assert_eq!(doc.parent_node(section), None);
    assert!(!doc.in_document(button));
}
