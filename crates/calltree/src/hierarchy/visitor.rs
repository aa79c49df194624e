//! Depth-first traversal hooks.

use super::{HierarchySession, NodeId};

/// Callbacks for [`HierarchySession::accept`].
///
/// `pre_visit` runs before a node's children are requested and decides
/// whether they are; `post_visit` runs after the node's subtree is done,
/// whether or not it was entered.
pub trait CallHierarchyVisitor {
    /// Called on entering `node`. Return `true` to expand and visit its children.
    fn pre_visit(&mut self, session: &HierarchySession<'_>, node: NodeId) -> bool;

    /// Called on leaving `node`.
    fn post_visit(&mut self, _session: &HierarchySession<'_>, _node: NodeId) {}
}

/// Visits everything down to a maximum depth, collecting nodes in pre-order.
#[derive(Debug, Clone)]
pub struct DepthLimitedCollector {
    max_depth: u32,
    visited: Vec<NodeId>,
}

impl DepthLimitedCollector {
    /// Collect nodes up to `max_depth` (roots are depth 1).
    #[must_use]
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            visited: Vec::new(),
        }
    }

    /// Nodes in the order they were entered.
    #[must_use]
    pub fn visited(&self) -> &[NodeId] {
        &self.visited
    }

    /// Take the collected nodes.
    #[must_use]
    pub fn into_visited(self) -> Vec<NodeId> {
        self.visited
    }
}

impl CallHierarchyVisitor for DepthLimitedCollector {
    fn pre_visit(&mut self, session: &HierarchySession<'_>, node: NodeId) -> bool {
        self.visited.push(node);
        session
            .node(node)
            .is_some_and(|n| n.depth() < self.max_depth)
    }
}
