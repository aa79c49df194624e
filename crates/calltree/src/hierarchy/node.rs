//! Tree node storage.

use std::fmt;
use std::sync::Arc;

use crate::types::{CallEdge, Direction, FieldAccessMode, Symbol, SymbolId};

/// Index of a node in its session's arena.
///
/// Only meaningful for the session that handed it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeKind {
    /// Ordinary caller or callee node
    #[default]
    Regular,
    /// Stands for the project-wide callers of its parent's symbol; never recursive
    RealCallers,
}

/// Outcome of the last attempt to materialize a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expansion {
    /// Children were never requested, or were invalidated
    #[default]
    Pending,
    /// Children are materialized
    Complete,
    /// Discovery failed; the node shows no children and is retried on next access
    Failed,
}

/// One position in an expanded hierarchy.
///
/// A node owns its edge (shared with the session cache) and a parent index;
/// children are listed by index once materialized.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) edge: Arc<CallEdge>,
    pub(crate) direction: Direction,
    pub(crate) depth: u32,
    pub(crate) field_mode: Option<FieldAccessMode>,
    pub(crate) kind: NodeKind,
    pub(crate) children: Option<Vec<NodeId>>,
    pub(crate) expansion: Expansion,
}

impl TreeNode {
    pub(crate) fn root(edge: Arc<CallEdge>, direction: Direction, mode: FieldAccessMode) -> Self {
        Self {
            parent: None,
            edge,
            direction,
            depth: 1,
            field_mode: Some(mode),
            kind: NodeKind::Regular,
            children: None,
            expansion: Expansion::Pending,
        }
    }

    pub(crate) fn child(parent: NodeId, parent_depth: u32, edge: Arc<CallEdge>, direction: Direction) -> Self {
        Self {
            parent: Some(parent),
            edge,
            direction,
            depth: parent_depth + 1,
            field_mode: None,
            kind: NodeKind::Regular,
            children: None,
            expansion: Expansion::Pending,
        }
    }

    /// Parent node, `None` for roots.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The edge leading to this node from its parent.
    #[must_use]
    pub fn edge(&self) -> &Arc<CallEdge> {
        &self.edge
    }

    /// Declaration this node stands for.
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        self.edge.member()
    }

    /// Handle of the declaration this node stands for.
    #[must_use]
    pub fn symbol_id(&self) -> &SymbolId {
        self.edge.key()
    }

    /// Traversal direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Depth in the tree, roots are 1.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Explicitly set field access mode; `None` inherits from the parent.
    #[must_use]
    pub fn field_mode(&self) -> Option<FieldAccessMode> {
        self.field_mode
    }

    /// Node variant.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Materialized children, `None` until first expansion.
    #[must_use]
    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    /// Outcome of the last expansion.
    #[must_use]
    pub fn expansion(&self) -> Expansion {
        self.expansion
    }

    /// Returns `true` for roots.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn reset_children(&mut self) {
        self.children = None;
        self.expansion = Expansion::Pending;
    }
}

/// Structural identity of a node: its direction, variant, and the chain of
/// symbols from the root down to it.
///
/// Two nodes reached through different expansions compare equal when they
/// sit at the same logical position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    /// Traversal direction
    pub direction: Direction,
    /// Node variant
    pub kind: NodeKind,
    /// Symbol handles from the root to the node, inclusive
    pub chain: Vec<SymbolId>,
}

impl NodePath {
    /// Handle of the node's own symbol.
    #[must_use]
    pub fn symbol(&self) -> Option<&SymbolId> {
        self.chain.last()
    }

    /// Depth of the node, roots are 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.chain.len()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, id) in self.chain.iter().enumerate() {
            if index > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}
