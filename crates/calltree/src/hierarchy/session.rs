//! The hierarchy session: roots, expansion, traversal and invalidation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::HierarchyConfig;
use crate::discovery::{DiscoveryContext, discover_callees, discover_callers};
use crate::error::{Error, Result};
use crate::filter::IgnoreFilter;
use crate::oracle::{Backend, SearchScope};
use crate::types::{CallEdge, CallEdgeMap, Direction, FieldAccessMode, Symbol, SymbolId, SymbolKind};

use super::cache::SharedCache;
use super::node::{Expansion, NodeId, NodeKind, NodePath, TreeNode};
use super::visitor::CallHierarchyVisitor;

/// One exploration of caller and callee trees over a backend.
///
/// Roots built in the same direction share that direction's cache, so a
/// symbol reached from two roots is discovered once. A session is driven by
/// one thread at a time; give concurrent explorations their own sessions.
pub struct HierarchySession<'a> {
    backend: Backend<'a>,
    config: HierarchyConfig,
    filter: IgnoreFilter,
    callers: SharedCache,
    callees: SharedCache,
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl<'a> HierarchySession<'a> {
    /// Create a session over `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if an ignore filter does not compile.
    pub fn new(backend: Backend<'a>, config: HierarchyConfig) -> Result<Self> {
        let filter = config.ignore_filter()?;
        Ok(Self {
            backend,
            config,
            filter,
            callers: SharedCache::new(Direction::Callers),
            callees: SharedCache::new(Direction::Callees),
            nodes: Vec::new(),
            roots: Vec::new(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Collaborators this session queries.
    #[must_use]
    pub fn backend(&self) -> Backend<'a> {
        self.backend
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Compiled ignore filter.
    #[must_use]
    pub fn filter(&self) -> &IgnoreFilter {
        &self.filter
    }

    /// Cache for one direction.
    #[must_use]
    pub fn cache(&self, direction: Direction) -> &SharedCache {
        match direction {
            Direction::Callers => &self.callers,
            Direction::Callees => &self.callees,
        }
    }

    fn cache_mut(&mut self, direction: Direction) -> &mut SharedCache {
        match direction {
            Direction::Callers => &mut self.callers,
            Direction::Callees => &mut self.callees,
        }
    }

    /// Roots built so far and not pruned.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    fn get(&self, id: NodeId) -> Result<&TreeNode> {
        self.node(id)
            .ok_or_else(|| Error::NotFound(format!("tree node {id}")))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut TreeNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| Error::NotFound(format!("tree node {id}")))
    }

    /// Number of nodes ever created in this session.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Roots
    // ========================================================================

    /// Returns `true` if a hierarchy can start from `symbol`.
    ///
    /// Members of any kind qualify; of the types, only classes and enums.
    #[must_use]
    pub fn is_possible_input(symbol: &Symbol) -> bool {
        !matches!(symbol.kind, SymbolKind::Interface)
    }

    /// Create root nodes for `symbols`.
    ///
    /// A non-anonymous type expands to one root per explicit constructor, or
    /// to a single root for the type when it declares none. Everything else
    /// becomes one root as given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a handle is unknown to the project model.
    pub fn build_roots(&mut self, symbols: &[SymbolId], direction: Direction) -> Result<Vec<NodeId>> {
        let model = self.backend.model;
        let mut created = Vec::new();
        for id in symbols {
            let symbol = model
                .symbol(id)
                .ok_or_else(|| Error::NotFound(format!("symbol {id}")))?;
            for root in self.root_symbols(symbol) {
                created.push(self.push_root(root, direction));
            }
        }
        debug!(requested = symbols.len(), roots = created.len(), ?direction, "Built roots");
        Ok(created)
    }

    fn root_symbols(&self, symbol: Symbol) -> Vec<Symbol> {
        if !symbol.is_type() || symbol.is_anonymous {
            return vec![symbol];
        }
        let model = self.backend.model;
        let constructors: Vec<Symbol> = model
            .constructors(&symbol.id)
            .iter()
            .filter_map(|id| model.symbol(id))
            .collect();
        if constructors.is_empty() {
            vec![symbol]
        } else {
            constructors
        }
    }

    fn push_root(&mut self, symbol: Symbol, direction: Direction) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        let edge = Arc::new(CallEdge::new(symbol));
        self.nodes
            .push(TreeNode::root(edge, direction, self.config.default_field_mode));
        self.roots.push(id);
        id
    }

    // ========================================================================
    // Expansion
    // ========================================================================

    /// Children of `node`, discovering them on first request.
    ///
    /// Recursive nodes are never expanded; they only list real-callers
    /// nodes added through [`add_real_callers`](Self::add_real_callers).
    /// Otherwise the direction's cache is consulted before discovery runs,
    /// and discovery results are cached. Field callers are cached per access
    /// mode. A failed discovery is logged, returns no children, marks the node
    /// [`Expansion::Failed`] and is retried on the next call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires during discovery, or
    /// [`Error::NotFound`] for an unknown node.
    pub fn children_of(&mut self, node: NodeId, cancel: &CancellationToken) -> Result<Vec<NodeId>> {
        let current = self.get(node)?;
        if self.is_recursive(node) {
            trace!(node = %node, symbol = %current.symbol_id(), "Recursive node, not expanded");
            return Ok(current.children.clone().unwrap_or_default());
        }
        if let Some(children) = &current.children {
            return Ok(children.clone());
        }

        let symbol = current.symbol().clone();
        let direction = current.direction;
        let field_mode = self.effective_field_mode(node);
        let mode_key = (direction == Direction::Callers && symbol.kind == SymbolKind::Field)
            .then_some(field_mode);
        let edges = match self.cache(direction).get(&symbol.id, mode_key) {
            Some(edges) => {
                trace!(symbol = %symbol.id, ?direction, "Cache hit");
                edges
            }
            None => match self.discover(&symbol, direction, field_mode, cancel) {
                Ok(edges) => {
                    let edges = Arc::new(edges);
                    self.cache_mut(direction)
                        .insert(symbol.id.clone(), mode_key, Arc::clone(&edges));
                    edges
                }
                Err(Error::Cancelled) => {
                    debug!(symbol = %symbol.id, "Discovery cancelled");
                    return Err(Error::Cancelled);
                }
                Err(error) => {
                    warn!(symbol = %symbol.id, ?direction, %error, "Discovery failed, showing no children");
                    self.get_mut(node)?.expansion = Expansion::Failed;
                    return Ok(Vec::new());
                }
            },
        };
        self.materialize(node, &edges)
    }

    fn discover(
        &self,
        symbol: &Symbol,
        direction: Direction,
        field_mode: FieldAccessMode,
        cancel: &CancellationToken,
    ) -> Result<CallEdgeMap> {
        debug!(symbol = %symbol.id, ?direction, "Cache miss, running discovery");
        let ctx = DiscoveryContext {
            backend: self.backend,
            filter: &self.filter,
            scope: &self.config.search_scope,
            use_implementors: self.config.use_implementors,
            cancel,
        };
        match direction {
            Direction::Callers => discover_callers(&ctx, symbol, field_mode),
            Direction::Callees => discover_callees(&ctx, symbol),
        }
    }

    /// Wrap each edge as a child node. Callee siblings follow source order.
    fn materialize(&mut self, node: NodeId, edges: &CallEdgeMap) -> Result<Vec<NodeId>> {
        let (depth, direction) = {
            let parent = self.get(node)?;
            (parent.depth, parent.direction)
        };
        let mut ordered: Vec<&Arc<CallEdge>> = edges.iter().collect();
        if direction == Direction::Callees {
            ordered.sort_by_key(|edge| edge.representative().map(|site| (site.start(), site.end())));
        }

        let mut children = Vec::with_capacity(ordered.len());
        for edge in ordered {
            let id = NodeId::new(self.nodes.len());
            self.nodes
                .push(TreeNode::child(node, depth, Arc::clone(edge), direction));
            children.push(id);
        }

        let parent = self.get_mut(node)?;
        parent.children = Some(children.clone());
        parent.expansion = Expansion::Complete;
        Ok(children)
    }

    /// Returns `true` if a strict ancestor of `node` stands for the same symbol.
    ///
    /// Real-callers nodes are never recursive.
    #[must_use]
    pub fn is_recursive(&self, node: NodeId) -> bool {
        let Some(current) = self.node(node) else {
            return false;
        };
        if current.kind == NodeKind::RealCallers {
            return false;
        }
        let symbol = current.symbol_id();
        let mut next = current.parent;
        while let Some(ancestor) = next.and_then(|id| self.node(id)) {
            if ancestor.symbol_id() == symbol {
                return true;
            }
            next = ancestor.parent;
        }
        false
    }

    /// Whether expanding `node` can produce children at all.
    ///
    /// Caller direction: fields at depth 1 always can; deeper fields only
    /// under `References` or `Read` mode. Callee direction: fields never can.
    #[must_use]
    pub fn can_have_children(&self, node: NodeId) -> bool {
        let Some(current) = self.node(node) else {
            return false;
        };
        let is_field = current.symbol().kind == SymbolKind::Field;
        match current.direction {
            Direction::Callers if is_field => {
                current.depth == 1
                    || matches!(
                        self.effective_field_mode(node),
                        FieldAccessMode::References | FieldAccessMode::Read
                    )
            }
            Direction::Callers => true,
            Direction::Callees => !is_field,
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Depth-first pre-order walk from `node`.
    ///
    /// The visitor's `pre_visit` decides whether children are expanded.
    /// Children of a recursive node are never visited, so discovery is not
    /// run for them; real-callers nodes are the exception.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when `cancel` fires; it is checked once
    /// per node.
    pub fn accept<V>(&mut self, node: NodeId, visitor: &mut V, cancel: &CancellationToken) -> Result<()>
    where
        V: CallHierarchyVisitor + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let current = self.get(node)?;
        if current.kind != NodeKind::RealCallers
            && current
                .parent
                .is_some_and(|parent| self.is_recursive(parent))
        {
            return Ok(());
        }
        if visitor.pre_visit(self, node) {
            for child in self.children_of(node, cancel)? {
                self.accept(child, visitor, cancel)?;
            }
        }
        visitor.post_visit(self, node);
        Ok(())
    }

    // ========================================================================
    // Structural identity
    // ========================================================================

    /// The logical position of `node`.
    #[must_use]
    pub fn node_path(&self, node: NodeId) -> Option<NodePath> {
        let current = self.node(node)?;
        let mut chain = vec![current.symbol_id().clone()];
        let mut next = current.parent;
        while let Some(ancestor) = next.and_then(|id| self.node(id)) {
            chain.push(ancestor.symbol_id().clone());
            next = ancestor.parent;
        }
        chain.reverse();
        Some(NodePath {
            direction: current.direction,
            kind: current.kind,
            chain,
        })
    }

    // ========================================================================
    // Mutation and invalidation
    // ========================================================================

    /// Evict `node`'s symbol from its direction's cache and forget its
    /// children, so the next expansion runs discovery again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown node.
    pub fn remove_from_cache(&mut self, node: NodeId) -> Result<()> {
        let current = self.get(node)?;
        let symbol = current.symbol_id().clone();
        let direction = current.direction;
        let evicted = self.cache_mut(direction).remove(&symbol);
        self.get_mut(node)?.reset_children();
        debug!(symbol = %symbol, ?direction, evicted, "Removed from cache");
        Ok(())
    }

    /// Detach `node` from its parent's children, or from the roots.
    ///
    /// The cache is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown node.
    pub fn prune(&mut self, node: NodeId) -> Result<()> {
        let parent = self.get(node)?.parent;
        match parent {
            Some(parent) => {
                if let Some(children) = &mut self.get_mut(parent)?.children {
                    children.retain(|&child| child != node);
                }
            }
            None => self.roots.retain(|&root| root != node),
        }
        Ok(())
    }

    /// Append a node standing for the project-wide callers of `node`'s symbol.
    ///
    /// Used to follow a recursive node past the cycle. The new node is never
    /// recursive and expands through caller discovery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown node.
    pub fn add_real_callers(&mut self, node: NodeId) -> Result<NodeId> {
        let current = self.get(node)?;
        let edge = Arc::new(CallEdge::new(current.symbol().clone()));
        let mut real = TreeNode::child(node, current.depth, edge, Direction::Callers);
        real.kind = NodeKind::RealCallers;

        let id = NodeId::new(self.nodes.len());
        self.nodes.push(real);
        let parent = self.get_mut(node)?;
        parent.children.get_or_insert_with(Vec::new).push(id);
        if parent.expansion == Expansion::Pending {
            parent.expansion = Expansion::Complete;
        }
        Ok(id)
    }

    /// Set an explicit field access mode on `node` and re-expand it under
    /// that mode on next access.
    ///
    /// Entries cached under other modes are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown node.
    pub fn set_field_mode(&mut self, node: NodeId, mode: FieldAccessMode) -> Result<()> {
        let current = self.get_mut(node)?;
        current.field_mode = Some(mode);
        current.reset_children();
        Ok(())
    }

    /// Field access mode in effect for `node`: its own, else the nearest
    /// ancestor's, else `References`.
    #[must_use]
    pub fn effective_field_mode(&self, node: NodeId) -> FieldAccessMode {
        let mut next = Some(node);
        while let Some(current) = next.and_then(|id| self.node(id)) {
            if let Some(mode) = current.field_mode {
                return mode;
            }
            next = current.parent;
        }
        FieldAccessMode::References
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Replace the ignore patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern does not compile; the
    /// session is unchanged in that case.
    pub fn set_ignore_filters(&mut self, patterns: Vec<String>) -> Result<()> {
        let previous = std::mem::replace(&mut self.config.ignore_filters, patterns);
        match self.config.ignore_filter() {
            Ok(filter) => {
                self.filter = filter;
                self.invalidate();
                Ok(())
            }
            Err(error) => {
                self.config.ignore_filters = previous;
                Err(error)
            }
        }
    }

    /// Field access mode given to roots built from now on.
    pub fn set_default_field_mode(&mut self, mode: FieldAccessMode) {
        self.config.default_field_mode = mode;
    }

    /// Replace the search scope.
    pub fn set_search_scope(&mut self, scope: SearchScope) {
        self.config.search_scope = scope;
        self.invalidate();
    }

    /// Toggle narrowing of interface call targets.
    pub fn set_use_implementors(&mut self, use_implementors: bool) {
        self.config.use_implementors = use_implementors;
        self.invalidate();
    }

    /// Drop both caches and every materialized child list.
    ///
    /// Recursive nodes keep their links to real-callers nodes, whose own
    /// children are reset.
    pub fn invalidate(&mut self) {
        self.callers.clear();
        self.callees.clear();
        let recursive: Vec<bool> = (0..self.nodes.len())
            .map(|index| self.is_recursive(NodeId::new(index)))
            .collect();
        for (node, recursive) in self.nodes.iter_mut().zip(recursive) {
            if !recursive {
                node.reset_children();
            }
        }
        debug!("Invalidated session caches");
    }
}

impl std::fmt::Debug for HierarchySession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchySession")
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("cached_callers", &self.callers.len())
            .field("cached_callees", &self.callees.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Container, UnitId, Visibility};
    use rstest::rstest;

    fn make_test_symbol(kind: SymbolKind) -> Symbol {
        Symbol {
            id: SymbolId::new("com.example.Thing"),
            name: "Thing".to_string(),
            kind,
            type_name: "com.example.Thing".to_string(),
            declaring_type: None,
            parent: None,
            visibility: Visibility::Public,
            is_static: false,
            is_anonymous: false,
            deprecated: false,
            parameter_types: Vec::new(),
            container: Container {
                unit: UnitId::new("file:///Thing.java"),
                package: "com.example".to_string(),
                binary: false,
            },
            source_range: None,
            name_range: None,
        }
    }

    #[rstest]
    #[case::method(SymbolKind::Method, true)]
    #[case::constructor(SymbolKind::Constructor, true)]
    #[case::field(SymbolKind::Field, true)]
    #[case::initializer(SymbolKind::Initializer, true)]
    #[case::class(SymbolKind::Class, true)]
    #[case::enumeration(SymbolKind::Enum, true)]
    #[case::interface(SymbolKind::Interface, false)]
    fn possible_inputs(#[case] kind: SymbolKind, #[case] expected: bool) {
        assert_eq!(
            HierarchySession::is_possible_input(&make_test_symbol(kind)),
            expected
        );
    }
}
