//! Insertion points (`<content>`)
//!
//! An insertion point inside a shadow tree is replaced, in the composed
//! tree, by the light children of the host that it selects. Its own
//! children are fallback content, shown only when nothing is distributed.

use std::cell::Cell;

use crate::node::{ElementData, Node};
use crate::{Document, NodeId};

/// How an insertion point decides whether a node belongs to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// No `select`: every node matches
    AlwaysMatches,
    /// Unparseable `select`: nothing matches
    NeverMatches,
    /// Element nodes matching the selector
    HasToMatchSelector,
}

/// One compound selector: optional type, optional id, classes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl CompoundSelector {
    fn parse(input: &str) -> Option<Self> {
        let mut selector = CompoundSelector::default();
        let mut rest = input;

        if let Some(after) = rest.strip_prefix('*') {
            rest = after;
        } else {
            let (ident, after) = take_ident(rest);
            if !ident.is_empty() {
                selector.tag = Some(ident.to_ascii_lowercase());
                rest = after;
            }
        }

        while let Some(first) = rest.chars().next() {
            let (ident, after) = take_ident(&rest[first.len_utf8()..]);
            if ident.is_empty() {
                return None;
            }
            match first {
                '#' if selector.id.is_none() => selector.id = Some(ident.to_string()),
                '.' => selector.classes.push(ident.to_string()),
                _ => return None,
            }
            rest = after;
        }
        Some(selector)
    }

    fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if !element.name.local.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| element.has_class(c))
    }
}

/// Split a leading CSS identifier off `input`
fn take_ident(input: &str) -> (&str, &str) {
    let end = input
        .char_indices()
        .find(|&(i, c)| {
            let ok = c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
            !ok || (i == 0 && c.is_ascii_digit())
        })
        .map_or(input.len(), |(i, _)| i);
    input.split_at(end)
}

/// Parsed `select` attribute.
///
/// Only simple selectors are allowed: `*`, type, `#id`, `.class`, compounds of
/// those, and comma separated lists. Anything else is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSelector {
    Any,
    Invalid,
    List(Vec<CompoundSelector>),
}

impl ContentSelector {
    pub fn parse(select: Option<&str>) -> Self {
        let Some(select) = select.map(str::trim).filter(|s| !s.is_empty()) else {
            return ContentSelector::Any;
        };
        let mut parts = Vec::new();
        for part in select.split(',') {
            match CompoundSelector::parse(part.trim()) {
                Some(compound) if !part.trim().is_empty() => parts.push(compound),
                _ => return ContentSelector::Invalid,
            }
        }
        ContentSelector::List(parts)
    }

    pub fn match_type(&self) -> MatchType {
        match self {
            ContentSelector::Any => MatchType::AlwaysMatches,
            ContentSelector::Invalid => MatchType::NeverMatches,
            ContentSelector::List(_) => MatchType::HasToMatchSelector,
        }
    }

    /// Whether an element matches one of the compound selectors
    pub fn matches(&self, element: &ElementData) -> bool {
        match self {
            ContentSelector::Any => true,
            ContentSelector::Invalid => false,
            ContentSelector::List(parts) => parts.iter().any(|s| s.matches(element)),
        }
    }
}

/// Insertion-point state carried by the element
#[derive(Debug)]
pub struct InsertionPointData {
    selector: ContentSelector,
    has_distribution: Cell<bool>,
}

impl InsertionPointData {
    pub(crate) fn new(select: Option<&str>) -> Self {
        Self {
            selector: ContentSelector::parse(select),
            has_distribution: Cell::new(false),
        }
    }

    pub(crate) fn set_select(&mut self, select: Option<&str>) {
        self.selector = ContentSelector::parse(select);
    }

    pub fn selector(&self) -> &ContentSelector {
        &self.selector
    }

    pub fn match_type(&self) -> MatchType {
        self.selector.match_type()
    }

    /// Set by the last distribution pass
    pub fn has_distribution(&self) -> bool {
        self.has_distribution.get()
    }

    pub(crate) fn set_has_distribution(&self, value: bool) {
        self.has_distribution.set(value);
    }
}

impl Document {
    pub fn is_insertion_point(&self, node: NodeId) -> bool {
        self.tree.get(node).is_some_and(|n| n.is_insertion_point())
    }

    /// An insertion point is active when it lives in a shadow tree and no
    /// ancestor in that tree is itself an insertion point
    pub fn is_active_insertion_point(&self, node: NodeId) -> bool {
        if !self.is_insertion_point(node) {
            return false;
        }
        let mut current = self.tree[node].parent_node();
        while let Some(ancestor) = current {
            let n = &self.tree[ancestor];
            if n.is_shadow_root() {
                return true;
            }
            if n.is_insertion_point() {
                return false;
            }
            current = n.parent_node();
        }
        false
    }

    pub(crate) fn insertion_point_data(&self, node: NodeId) -> Option<&InsertionPointData> {
        self.tree.get(node)?.as_element()?.insertion_point()
    }

    /// Match policy of an insertion point for `node`
    pub fn match_type_for(&self, insertion_point: NodeId, node: NodeId) -> MatchType {
        let (Some(data), Some(n)) = (self.insertion_point_data(insertion_point), self.tree.get(node)) else {
            return MatchType::NeverMatches;
        };
        match data.match_type() {
            MatchType::HasToMatchSelector if !n.is_element() => MatchType::NeverMatches,
            other => other,
        }
    }

    /// Whether `node` would be claimed by `insertion_point`
    pub(crate) fn insertion_point_matches(&self, insertion_point: NodeId, node: NodeId) -> bool {
        match self.match_type_for(insertion_point, node) {
            MatchType::AlwaysMatches => true,
            MatchType::NeverMatches => false,
            MatchType::HasToMatchSelector => {
                match (self.insertion_point_data(insertion_point), self.tree.get(node).and_then(Node::as_element)) {
                    (Some(data), Some(element)) => data.selector().matches(element),
                    _ => false,
                }
            }
        }
    }

    /// Whether the last distribution assigned anything to `insertion_point`
    pub fn has_distribution(&self, insertion_point: NodeId) -> bool {
        if let Some(host) = self.insertion_point_host(insertion_point) {
            self.ensure_host_distribution(host);
        }
        self.insertion_point_data(insertion_point)
            .is_some_and(InsertionPointData::has_distribution)
    }

    /// Nodes distributed to `insertion_point`, in order
    pub fn distributed_nodes(&self, insertion_point: NodeId) -> Vec<NodeId> {
        self.with_distribution(insertion_point, |d| d.nodes().to_vec())
            .unwrap_or_default()
    }

    pub fn first_distributed(&self, insertion_point: NodeId) -> Option<NodeId> {
        self.with_distribution(insertion_point, |d| d.first()).flatten()
    }

    pub fn last_distributed(&self, insertion_point: NodeId) -> Option<NodeId> {
        self.with_distribution(insertion_point, |d| d.last()).flatten()
    }

    /// Distributed node following `node` in `insertion_point`
    pub fn next_distributed_to(&self, insertion_point: NodeId, node: NodeId) -> Option<NodeId> {
        self.with_distribution(insertion_point, |d| d.next_to(node)).flatten()
    }

    /// Distributed node preceding `node` in `insertion_point`
    pub fn previous_distributed_to(&self, insertion_point: NodeId, node: NodeId) -> Option<NodeId> {
        self.with_distribution(insertion_point, |d| d.previous_to(node)).flatten()
    }

    /// Host whose distributor serves `insertion_point`
    pub(crate) fn insertion_point_host(&self, insertion_point: NodeId) -> Option<NodeId> {
        if !self.is_active_insertion_point(insertion_point) {
            return None;
        }
        self.shadow_host(insertion_point)
    }
}
