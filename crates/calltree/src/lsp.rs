//! LSP call hierarchy surface.
//!
//! [`CallHierarchyService`] answers the three call hierarchy requests
//! (`prepareCallHierarchy`, `callHierarchy/incomingCalls`,
//! `callHierarchy/outgoingCalls`) with `lsp-types` values. Message framing
//! and transport belong to the server hosting it.
//!
//! Items carry their symbol handle in `data`, so follow-up requests resolve
//! without a position lookup. Nodes returned by earlier requests are kept
//! per direction so that expanding a child continues the same tree (and its
//! recursion detection) instead of starting a new root.

use std::collections::HashMap;

use lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall, Position, Range,
    SymbolKind as LspSymbolKind, SymbolTag, Uri,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::hierarchy::{HierarchySession, NodeId};
use crate::oracle::ProjectModel;
use crate::source::TextRange;
use crate::syntax::{SyntaxNodeId, SyntaxTree};
use crate::types::{CallSite, Direction, Symbol, SymbolId, SymbolKind, UnitId};

/// Call hierarchy requests over one session.
#[derive(Debug)]
pub struct CallHierarchyService<'a> {
    session: HierarchySession<'a>,
    incoming: HashMap<SymbolId, NodeId>,
    outgoing: HashMap<SymbolId, NodeId>,
}

impl<'a> CallHierarchyService<'a> {
    /// Serve requests from `session`.
    #[must_use]
    pub fn new(session: HierarchySession<'a>) -> Self {
        Self {
            session,
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
        }
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &HierarchySession<'a> {
        &self.session
    }

    /// Mutable access to the underlying session, e.g. to change configuration.
    pub fn session_mut(&mut self) -> &mut HierarchySession<'a> {
        &mut self.session
    }

    /// Start a new hierarchy at `symbol`.
    ///
    /// Forgets the nodes remembered from earlier requests. Returns `None` if
    /// the symbol is unknown or cannot start a hierarchy.
    pub fn prepare(&mut self, symbol: &SymbolId) -> Option<Vec<CallHierarchyItem>> {
        self.incoming.clear();
        self.outgoing.clear();
        let symbol = self.session.backend().model.symbol(symbol)?;
        if !HierarchySession::is_possible_input(&symbol) {
            debug!(symbol = %symbol.id, "Not a call hierarchy input");
            return None;
        }
        Some(vec![self.to_item(&symbol)?])
    }

    /// Start a new hierarchy at the declaration or invocation under `position`.
    pub fn prepare_at(&mut self, unit: &UnitId, position: Position) -> Option<Vec<CallHierarchyItem>> {
        let symbol = self.element_at(unit, position)?;
        self.prepare(&symbol)
    }

    /// Callers of `item`, one entry per calling declaration.
    ///
    /// Returns `None` on cancellation or when `item` cannot be resolved.
    pub fn incoming_calls(
        &mut self,
        item: &CallHierarchyItem,
        cancel: &CancellationToken,
    ) -> Option<Vec<CallHierarchyIncomingCall>> {
        let calls = self.expand(item, Direction::Callers, cancel)?;
        Some(
            calls
                .into_iter()
                .map(|(from, from_ranges)| CallHierarchyIncomingCall { from, from_ranges })
                .collect(),
        )
    }

    /// Callees of `item`, one entry per called declaration, in source order.
    ///
    /// Returns `None` on cancellation or when `item` cannot be resolved.
    pub fn outgoing_calls(
        &mut self,
        item: &CallHierarchyItem,
        cancel: &CancellationToken,
    ) -> Option<Vec<CallHierarchyOutgoingCall>> {
        let calls = self.expand(item, Direction::Callees, cancel)?;
        Some(
            calls
                .into_iter()
                .map(|(to, from_ranges)| CallHierarchyOutgoingCall { to, from_ranges })
                .collect(),
        )
    }

    fn expand(
        &mut self,
        item: &CallHierarchyItem,
        direction: Direction,
        cancel: &CancellationToken,
    ) -> Option<Vec<(CallHierarchyItem, Vec<Range>)>> {
        let symbol = self.symbol_of(item)?;
        let remembered = self.remembered(direction).get(&symbol).copied();
        let node = match remembered {
            Some(node) => node,
            None => {
                let roots = self
                    .session
                    .build_roots(std::slice::from_ref(&symbol), direction)
                    .map_err(|error| warn!(symbol = %symbol, %error, "Cannot build call hierarchy root"))
                    .ok()?;
                *roots.first()?
            }
        };

        if direction == Direction::Callers && !self.session.can_have_children(node) {
            debug!(symbol = %symbol, "Node cannot have callers");
            return None;
        }

        let children = match self.session.children_of(node, cancel) {
            Ok(children) => children,
            Err(Error::Cancelled) => {
                debug!(symbol = %symbol, "Call hierarchy request cancelled");
                return None;
            }
            Err(error) => {
                warn!(symbol = %symbol, %error, "Call hierarchy expansion failed");
                return None;
            }
        };

        let mut calls = Vec::with_capacity(children.len());
        for child in children {
            let Some(edge) = self.session.node(child).map(|n| n.edge().clone()) else {
                continue;
            };
            let Some(item) = self.to_item(edge.member()) else {
                continue;
            };
            let ranges = edge
                .sites()
                .iter()
                .filter_map(|site| self.site_range(site))
                .collect();
            self.remembered_mut(direction)
                .insert(edge.key().clone(), child);
            calls.push((item, ranges));
        }
        Some(calls)
    }

    fn remembered(&self, direction: Direction) -> &HashMap<SymbolId, NodeId> {
        match direction {
            Direction::Callers => &self.incoming,
            Direction::Callees => &self.outgoing,
        }
    }

    fn remembered_mut(&mut self, direction: Direction) -> &mut HashMap<SymbolId, NodeId> {
        match direction {
            Direction::Callers => &mut self.incoming,
            Direction::Callees => &mut self.outgoing,
        }
    }

    /// Symbol handle of an item: from `data`, else from its position.
    fn symbol_of(&self, item: &CallHierarchyItem) -> Option<SymbolId> {
        if let Some(handle) = item.data.as_ref().and_then(|data| data.as_str()) {
            return Some(SymbolId::new(handle));
        }
        let unit = UnitId::new(item.uri.as_str());
        self.element_at(&unit, item.selection_range.start)
    }

    /// The declaration at `position`, or the target of the invocation there.
    fn element_at(&self, unit: &UnitId, position: Position) -> Option<SymbolId> {
        let model = self.session.backend().model;
        let offset = model.buffer(unit)?.offset(position)?;
        let tree = model.syntax_tree(unit).ok()??;

        let mut declaration = None;
        let mut current = tree.root();
        loop {
            let node = tree.node(current)?;
            if let Some(id) = &node.declares {
                declaration = Some(id.clone());
            }
            if node.kind.is_invocation()
                && let Some(target) = resolve_invocation(model, &tree, current)
            {
                return Some(target);
            }
            let next = node.children.iter().copied().find(|&child| {
                tree.node(child).is_some_and(|c| {
                    c.range.start <= offset && offset < c.range.end()
                })
            });
            match next {
                Some(child) => current = child,
                None => return declaration,
            }
        }
    }

    fn to_item(&self, symbol: &Symbol) -> Option<CallHierarchyItem> {
        let model = self.session.backend().model;
        let uri: Uri = symbol.unit().as_str().parse().ok()?;
        let buffer = model.buffer(symbol.unit());
        let to_range = |range: TextRange| {
            buffer
                .as_ref()
                .and_then(|b| b.lsp_range(range))
                .unwrap_or_default()
        };
        let range = symbol.source_range.map(to_range).unwrap_or_default();
        let selection_range = symbol.name_range.map_or(range, to_range);

        let detail = if symbol.is_type() {
            symbol
                .declaring_type
                .as_ref()
                .and_then(|id| model.symbol(id))
                .map(|declaring| declaring.type_name)
        } else {
            Some(symbol.type_name.clone())
        };

        Some(CallHierarchyItem {
            name: symbol.name.clone(),
            kind: lsp_kind(symbol.kind),
            tags: symbol.deprecated.then(|| vec![SymbolTag::DEPRECATED]),
            detail,
            uri,
            range,
            selection_range,
            data: Some(serde_json::Value::String(symbol.id.to_string())),
        })
    }

    /// Range of a call site, if its buffer has not changed since discovery.
    fn site_range(&self, site: &CallSite) -> Option<Range> {
        let buffer = self.session.backend().model.buffer(&site.unit)?;
        if buffer.version() != site.buffer_version {
            return None;
        }
        buffer.lsp_range(site.range)
    }
}

fn resolve_invocation(
    model: &dyn ProjectModel,
    tree: &SyntaxTree,
    node: SyntaxNodeId,
) -> Option<SymbolId> {
    let binding = model.resolve_reference(tree, node)?;
    let type_id = binding.declaring_type.ty.symbol.as_ref()?;
    model.find_method(type_id, &binding.signature())
}

fn lsp_kind(kind: SymbolKind) -> LspSymbolKind {
    match kind {
        SymbolKind::Method | SymbolKind::Initializer => LspSymbolKind::METHOD,
        SymbolKind::Constructor => LspSymbolKind::CONSTRUCTOR,
        SymbolKind::Field => LspSymbolKind::FIELD,
        SymbolKind::Class => LspSymbolKind::CLASS,
        SymbolKind::Interface => LspSymbolKind::INTERFACE,
        SymbolKind::Enum => LspSymbolKind::ENUM,
    }
}
