//! Content distribution
//!
//! Assigns the light children of a shadow host to the active insertion
//! points of its shadow tree. The result is a cache: invalidated eagerly on
//! structural change, recomputed on the next read.

use std::collections::HashMap;

use crate::tree::DomTree;
use crate::{Document, NodeId};

/// Distribution cache state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    /// Never distributed
    #[default]
    Undetermined,
    /// Cleared; the host may be detached before the state settles
    Invalidating,
    Invalidated,
    Valid,
}

/// Ordered nodes distributed to one insertion point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDistribution {
    nodes: Vec<NodeId>,
    indices: HashMap<NodeId, usize>,
}

impl ContentDistribution {
    fn push(&mut self, node: NodeId) {
        self.indices.insert(node, self.nodes.len());
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.indices.contains_key(&node)
    }

    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    pub fn next_to(&self, node: NodeId) -> Option<NodeId> {
        let index = *self.indices.get(&node)?;
        self.nodes.get(index + 1).copied()
    }

    pub fn previous_to(&self, node: NodeId) -> Option<NodeId> {
        let index = *self.indices.get(&node)?;
        index.checked_sub(1).map(|i| self.nodes[i])
    }
}

/// Per-host distribution state
#[derive(Debug, Default)]
pub struct ContentDistributor {
    node_to_insertion_point: HashMap<NodeId, NodeId>,
    distributions: HashMap<NodeId, ContentDistribution>,
    /// Active insertion points in tree order; `None` until rebuilt
    insertion_points: Option<Vec<NodeId>>,
    validity: Validity,
}

impl ContentDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn needs_distribution(&self) -> bool {
        self.validity != Validity::Valid
    }

    pub fn needs_invalidation(&self) -> bool {
        self.validity != Validity::Invalidated
    }

    /// Insertion point `node` was assigned to by the last pass
    pub fn insertion_point_for(&self, node: NodeId) -> Option<NodeId> {
        self.node_to_insertion_point.get(&node).copied()
    }

    pub fn distribution(&self, insertion_point: NodeId) -> Option<&ContentDistribution> {
        self.distributions.get(&insertion_point)
    }

    /// Number of nodes assigned by the last pass
    pub fn distributed_count(&self) -> usize {
        self.node_to_insertion_point.len()
    }

    /// Whether dropping the current distribution changes the composed
    /// tree: it was non-empty, or there never was one
    pub(crate) fn needs_reattach(&self) -> bool {
        self.validity == Validity::Undetermined || !self.node_to_insertion_point.is_empty()
    }

    /// Clear the node map and every insertion point's distribution flag.
    /// Returns [`ContentDistributor::needs_reattach`] as it was before.
    pub(crate) fn invalidate(&mut self, tree: &DomTree) -> bool {
        let needs_reattach = self.needs_reattach();

        for insertion_point in self.distributions.keys() {
            if let Some(data) = tree.get(*insertion_point)
                .and_then(|n| n.as_element())
                .and_then(|e| e.insertion_point())
            {
                data.set_has_distribution(false);
            }
        }
        self.node_to_insertion_point.clear();
        self.distributions.clear();
        self.validity = Validity::Invalidating;
        needs_reattach
    }

    pub(crate) fn finish_invalidation(&mut self) {
        self.validity = Validity::Invalidated;
    }

    pub(crate) fn invalidate_insertion_point_list(&mut self) {
        self.insertion_points = None;
    }

    fn store(&mut self, result: Vec<(NodeId, ContentDistribution)>) {
        self.node_to_insertion_point.clear();
        self.distributions.clear();
        for (insertion_point, distribution) in result {
            for &node in distribution.nodes() {
                self.node_to_insertion_point.insert(node, insertion_point);
            }
            if !distribution.is_empty() {
                self.distributions.insert(insertion_point, distribution);
            }
        }
        self.validity = Validity::Valid;
    }
}

impl Document {
    /// Distribute the light children of `host`. No-op when already valid.
    pub(crate) fn distribute(&self, host: NodeId) {
        let Some(shadow) = self.shadows.get(&host) else {
            return;
        };
        if !shadow.distributor.borrow().needs_distribution() {
            return;
        }

        let cached = shadow.distributor.borrow().insertion_points.clone();
        let insertion_points = match cached {
            Some(points) => points,
            None => {
                let points = self.collect_insertion_points(shadow.shadow_root());
                shadow.distributor.borrow_mut().insertion_points = Some(points.clone());
                points
            }
        };

        let mut pool = Vec::new();
        for child in self.tree.children(host) {
            self.populate(child, &mut pool);
        }

        let mut claimed = vec![false; pool.len()];
        let mut result = Vec::with_capacity(insertion_points.len());
        for &insertion_point in &insertion_points {
            let mut distribution = ContentDistribution::default();
            for (index, &node) in pool.iter().enumerate() {
                if !claimed[index] && self.insertion_point_matches(insertion_point, node) {
                    claimed[index] = true;
                    distribution.push(node);
                }
            }
            if let Some(data) = self.insertion_point_data(insertion_point) {
                data.set_has_distribution(!distribution.is_empty());
            }
            result.push((insertion_point, distribution));
        }

        let distributed = claimed.iter().filter(|&&c| c).count();
        tracing::debug!(
            "Distributed host {}: {} insertion points, {} of {} nodes",
            host,
            insertion_points.len(),
            distributed,
            pool.len()
        );
        shadow.distributor.borrow_mut().store(result);
    }

    /// Add `node` to a distribution pool, expanding an active insertion
    /// point into what it shows: its distributed nodes or its fallback
    fn populate(&self, node: NodeId, pool: &mut Vec<NodeId>) {
        if !self.is_active_insertion_point(node) {
            pool.push(node);
            return;
        }
        if self.has_distribution(node) {
            pool.extend(self.distributed_nodes(node));
        } else {
            pool.extend(self.tree.children(node));
        }
    }

    /// Distribute every shadow from the outermost one containing
    /// `shadow_root` down to `shadow_root` itself
    pub fn ensure_distribution(&self, shadow_root: NodeId) {
        let mut hosts = Vec::new();
        let mut root = Some(shadow_root);
        while let Some(r) = root {
            let Ok(host) = self.shadow_root_host(r) else {
                break;
            };
            hosts.push(host);
            root = self.containing_shadow_root(host);
        }
        for host in hosts.into_iter().rev() {
            self.distribute(host);
        }
    }

    pub fn ensure_host_distribution(&self, host: NodeId) {
        if let Some(root) = self.shadow_root(host) {
            self.ensure_distribution(root);
        }
    }

    /// Run `f` on the up-to-date distribution of `insertion_point`
    pub(crate) fn with_distribution<R>(
        &self,
        insertion_point: NodeId,
        f: impl FnOnce(&ContentDistribution) -> R,
    ) -> Option<R> {
        let host = self.insertion_point_host(insertion_point)?;
        self.ensure_host_distribution(host);
        let distributor = self.shadows.get(&host)?.distributor.borrow();
        distributor.distribution(insertion_point).map(f)
    }

    /// Insertion point of `host`'s shadow that `node` is assigned to
    pub fn assigned_insertion_point(&self, host: NodeId, node: NodeId) -> Option<NodeId> {
        self.ensure_host_distribution(host);
        self.shadows
            .get(&host)?
            .distributor
            .borrow()
            .insertion_point_for(node)
    }

    /// Insertion point a light child of a shadow host is assigned to
    pub fn insertion_point_for(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_node(node)?;
        self.assigned_insertion_point(parent, node)
    }

    /// Current cache state of `host`'s distribution (not recomputed)
    pub fn distribution_validity(&self, host: NodeId) -> Option<Validity> {
        Some(self.shadows.get(&host)?.distributor.borrow().validity())
    }

    /// Distributed nodes of `insertion_point` if its host's distribution is
    /// valid; never distributes
    pub(crate) fn cached_distributed_nodes(&self, insertion_point: NodeId) -> Vec<NodeId> {
        let Some(shadow) = self
            .insertion_point_host(insertion_point)
            .and_then(|host| self.shadows.get(&host))
        else {
            return Vec::new();
        };
        let distributor = shadow.distributor.borrow();
        if distributor.validity() != Validity::Valid {
            return Vec::new();
        }
        distributor
            .distribution(insertion_point)
            .map(|d| d.nodes().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeOperations, ShadowRootType};

    fn host_with_points(doc: &mut Document, selects: &[Option<&str>]) -> (NodeId, Vec<NodeId>) {
        let host = doc.create_element("div").unwrap();
        let root = doc.add_shadow_root(host, ShadowRootType::Author).unwrap();
        let points = selects
            .iter()
            .map(|select| {
                let ip = doc.create_content_element(*select);
                doc.append_child(root, ip).unwrap();
                ip
            })
            .collect();
        (host, points)
    }

    #[test]
    fn test_distribution_list_navigation() {
        let mut d = ContentDistribution::default();
        d.push(NodeId(4));
        d.push(NodeId(7));
        d.push(NodeId(9));
        assert_eq!(d.first(), Some(NodeId(4)));
        assert_eq!(d.last(), Some(NodeId(9)));
        assert_eq!(d.next_to(NodeId(4)), Some(NodeId(7)));
        assert_eq!(d.next_to(NodeId(9)), None);
        assert_eq!(d.previous_to(NodeId(4)), None);
        assert_eq!(d.previous_to(NodeId(9)), Some(NodeId(7)));
        assert_eq!(d.next_to(NodeId(5)), None);
    }

    #[test]
    fn test_first_match_wins() {
        let mut doc = Document::new();
        let (host, points) = host_with_points(&mut doc, &[Some(".a"), None]);
        let a = doc.create_element("p").unwrap();
        doc.set_attribute(a, "class", "a").unwrap();
        let b = doc.create_element("p").unwrap();
        doc.append_child(host, a).unwrap();
        doc.append_child(host, b).unwrap();

        assert_eq!(doc.distributed_nodes(points[0]), vec![a]);
        assert_eq!(doc.distributed_nodes(points[1]), vec![b]);
        assert_eq!(doc.assigned_insertion_point(host, a), Some(points[0]));
        assert_eq!(doc.insertion_point_for(b), Some(points[1]));
        assert_eq!(doc.distribution_validity(host), Some(Validity::Valid));
    }

    #[test]
    fn test_invalidate_reports_reattach() {
        let mut doc = Document::new();
        let (host, _) = host_with_points(&mut doc, &[None]);
        let shadow = doc.element_shadow(host).unwrap();

        // an empty distribution does not force a reattach
        doc.ensure_host_distribution(host);
        assert!(!shadow.distributor.borrow_mut().invalidate(&doc.tree));
        shadow.distributor.borrow_mut().finish_invalidation();

        let mut fresh = ContentDistributor::new();
        assert!(fresh.invalidate(&doc.tree));
        assert_eq!(fresh.validity(), Validity::Invalidating);
    }

    #[test]
    fn test_unmatched_child_is_not_distributed() {
        let mut doc = Document::new();
        let (host, points) = host_with_points(&mut doc, &[Some("span")]);
        let p = doc.create_element("p").unwrap();
        doc.append_child(host, p).unwrap();

        assert!(doc.distributed_nodes(points[0]).is_empty());
        assert!(!doc.has_distribution(points[0]));
        assert_eq!(doc.insertion_point_for(p), None);
        assert_eq!(
            doc.element_shadow(host).unwrap().distributor().distributed_count(),
            0
        );
    }

    #[test]
    fn test_select_change_redistributes() {
        let mut doc = Document::new();
        let (host, points) = host_with_points(&mut doc, &[Some("span")]);
        let p = doc.create_element("p").unwrap();
        doc.append_child(host, p).unwrap();
        assert!(doc.distributed_nodes(points[0]).is_empty());

        doc.set_attribute(points[0], "select", "p").unwrap();
        assert_eq!(doc.distributed_nodes(points[0]), vec![p]);
    }

    #[test]
    fn test_reprojection_pools_outer_distribution() {
        let mut doc = Document::new();
        // outer host whose shadow contains an inner host
        let (outer, _) = host_with_points(&mut doc, &[]);
        let outer_root = doc.shadow_root(outer).unwrap();
        let inner = doc.create_element("div").unwrap();
        doc.append_child(outer_root, inner).unwrap();
        let outer_ip = doc.create_content_element(None);
        doc.append_child(inner, outer_ip).unwrap();
        let inner_root = doc.add_shadow_root(inner, ShadowRootType::Author).unwrap();
        let inner_ip = doc.create_content_element(None);
        doc.append_child(inner_root, inner_ip).unwrap();

        let light = doc.create_element("span").unwrap();
        doc.append_child(outer, light).unwrap();

        assert_eq!(doc.distributed_nodes(outer_ip), vec![light]);
        assert_eq!(doc.distributed_nodes(inner_ip), vec![light]);
        assert_eq!(doc.assigned_insertion_point(inner, light), Some(inner_ip));

        // removing the light child reaches the inner distribution too
        doc.remove_child(outer, light).unwrap();
        assert!(doc.distributed_nodes(inner_ip).is_empty());
    }

    #[test]
    fn test_fallback_class_change_redistributes_inner_host() {
        let mut doc = Document::new();
        let (outer, _) = host_with_points(&mut doc, &[]);
        let outer_root = doc.shadow_root(outer).unwrap();
        let inner = doc.create_element("div").unwrap();
        doc.append_child(outer_root, inner).unwrap();
        let outer_ip = doc.create_content_element(Some("nomatch"));
        doc.append_child(inner, outer_ip).unwrap();
        let fallback = doc.create_element("em").unwrap();
        doc.append_child(outer_ip, fallback).unwrap();
        let inner_root = doc.add_shadow_root(inner, ShadowRootType::Author).unwrap();
        let inner_ip = doc.create_content_element(Some(".a"));
        doc.append_child(inner_root, inner_ip).unwrap();

        assert!(doc.distributed_nodes(inner_ip).is_empty());
        assert_eq!(doc.distribution_validity(inner), Some(Validity::Valid));

        doc.set_attribute(fallback, "class", "a").unwrap();
        assert_eq!(doc.distributed_nodes(inner_ip), vec![fallback]);
    }
}
