//! The group tree, kept as an arena owned by the router builder.
//!
//! Groups refer to their parent by index. Effective prefixes and middleware chains are
//! computed by walking up the tree when a route is registered; nothing is written back
//! into a parent.

use crate::middleware::{Link, Middleware, Phase};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GroupId(usize);

impl GroupId {
    pub(crate) const ROOT: GroupId = GroupId(0);
}

struct GroupNode {
    prefix: String,
    parent: Option<GroupId>,
    depth: usize,
    before: Vec<Arc<dyn Middleware>>,
    after: Vec<Arc<dyn Middleware>>,
}

pub(crate) struct GroupArena {
    nodes: Vec<GroupNode>,
}

impl GroupArena {
    pub(crate) fn new() -> Self {
        let root = GroupNode { prefix: String::new(), parent: None, depth: 0, before: vec![], after: vec![] };
        Self { nodes: vec![root] }
    }

    pub(crate) fn add_child(&mut self, parent: GroupId, prefix: &str) -> GroupId {
        let depth = self.node(parent).depth + 1;
        let id = GroupId(self.nodes.len());
        self.nodes.push(GroupNode {
            prefix: prefix.to_owned(),
            parent: Some(parent),
            depth,
            before: vec![],
            after: vec![],
        });
        id
    }

    pub(crate) fn add_middleware(&mut self, id: GroupId, phase: Phase, middleware: Arc<dyn Middleware>) {
        let node = &mut self.nodes[id.0];
        match phase {
            Phase::Before => node.before.push(middleware),
            Phase::After => node.after.push(middleware),
        }
    }

    pub(crate) fn depth(&self, id: GroupId) -> usize {
        self.node(id).depth
    }

    /// The prefixes of every ancestor, root first, followed by `path`.
    ///
    /// A trailing slash on `path` is kept, a bare `/` adds nothing to the prefix.
    pub(crate) fn full_path(&self, id: GroupId, path: &str) -> String {
        let mut full = String::new();
        for node in self.lineage(id) {
            push_segment(&mut full, &node.prefix);
        }
        push_segment(&mut full, path);
        if path.ends_with('/') && !path.trim_matches('/').is_empty() {
            full.push('/');
        }

        if full.is_empty() { "/".to_owned() } else { full }
    }

    /// Before-middleware of every ancestor, root first, then the group's own.
    pub(crate) fn effective_before(&self, id: GroupId) -> Vec<Link> {
        self.collect_links(id, |node| &node.before)
    }

    /// After-middleware in the same root-first order as [`effective_before`](Self::effective_before).
    pub(crate) fn effective_after(&self, id: GroupId) -> Vec<Link> {
        self.collect_links(id, |node| &node.after)
    }

    fn collect_links(&self, id: GroupId, select: impl Fn(&GroupNode) -> &Vec<Arc<dyn Middleware>>) -> Vec<Link> {
        self.lineage(id)
            .into_iter()
            .flat_map(|node| select(node).iter().map(move |middleware| Link::new(node.depth, Arc::clone(middleware))))
            .collect()
    }

    fn node(&self, id: GroupId) -> &GroupNode {
        &self.nodes[id.0]
    }

    fn lineage(&self, id: GroupId) -> Vec<&GroupNode> {
        let mut lineage = vec![];
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node(id);
            lineage.push(node);
            current = node.parent;
        }
        lineage.reverse();
        lineage
    }
}

/// Appends `segment` to `path`, keeping exactly one `/` between the two.
fn push_segment(path: &mut String, segment: &str) {
    let segment = segment.trim_matches('/');
    if segment.is_empty() {
        return;
    }
    path.push('/');
    path.push_str(segment);
}
