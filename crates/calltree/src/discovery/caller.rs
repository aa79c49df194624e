//! Caller discovery: reference search through the project index.

use tracing::{debug, trace};

use crate::error::Result;
use crate::oracle::{MatchAccuracy, SearchMatch, SearchPattern, SearchScope};
use crate::types::{CallEdgeMap, CallSite, FieldAccessMode, Symbol, SymbolKind};

use super::DiscoveryContext;

/// Everything that references `symbol`, one edge per calling declaration.
///
/// `field_mode` narrows the search when `symbol` is a field and is ignored
/// otherwise.
///
/// # Errors
///
/// Returns [`Error::Cancelled`](crate::Error::Cancelled) if the token fires
/// before or after the query, or the reference index's own error.
pub fn discover_callers(
    ctx: &DiscoveryContext<'_>,
    symbol: &Symbol,
    field_mode: FieldAccessMode,
) -> Result<CallEdgeMap> {
    ctx.check_cancelled()?;
    let mut edges = CallEdgeMap::new();

    if symbol.is_type() && symbol.is_anonymous {
        record_anonymous_parent(ctx, symbol, &mut edges);
        return Ok(edges);
    }

    let Some(pattern) = search_pattern(ctx, symbol, field_mode) else {
        trace!(symbol = %symbol.id, "No searchable pattern");
        return Ok(edges);
    };
    let scope = search_scope(ctx.scope, symbol);
    debug!(symbol = %symbol.id, ?pattern, ?scope, "Searching references");

    let matches = ctx.backend.index.search(&pattern, &scope, ctx.cancel)?;
    ctx.check_cancelled()?;

    let model = ctx.backend.model;
    for found in matches.into_iter().filter(is_usable) {
        let Some(caller) = found.enclosing.as_ref().and_then(|id| model.symbol(id)) else {
            continue;
        };
        if ctx.is_ignored(&caller) {
            trace!(caller = %caller.id, "Ignored caller");
            continue;
        }
        let site = CallSite::new(
            caller.id.clone(),
            Some(symbol.id.clone()),
            found.unit,
            found.range,
            found.buffer_version,
        );
        trace!(symbol = %symbol.id, caller = %caller.id, offset = found.range.start, "Recorded caller site");
        edges.add(&caller, site);
    }

    debug!(
        symbol = %symbol.id,
        edges = edges.len(),
        sites = edges.site_count(),
        "Discovered callers"
    );
    Ok(edges)
}

/// Only exact matches outside comments count.
fn is_usable(found: &SearchMatch) -> bool {
    found.accuracy == MatchAccuracy::Accurate && !found.inside_comment
}

/// Anonymous types cannot be searched for; their only caller is the
/// declaration they are written in.
fn record_anonymous_parent(ctx: &DiscoveryContext<'_>, symbol: &Symbol, edges: &mut CallEdgeMap) {
    let Some(parent) = symbol
        .parent
        .as_ref()
        .and_then(|id| ctx.backend.model.symbol(id))
    else {
        trace!(symbol = %symbol.id, "Anonymous type without parent");
        return;
    };
    if ctx.is_ignored(&parent) {
        return;
    }
    let Some(range) = symbol.name_range.or(symbol.source_range) else {
        return;
    };
    let version = ctx
        .backend
        .model
        .buffer(symbol.unit())
        .map_or(0, |b| b.version());
    let site = CallSite::new(
        parent.id.clone(),
        Some(symbol.id.clone()),
        symbol.unit().clone(),
        range,
        version,
    );
    edges.add(&parent, site);
}

/// The query that finds callers of `symbol`, if it has one.
fn search_pattern(
    ctx: &DiscoveryContext<'_>,
    symbol: &Symbol,
    field_mode: FieldAccessMode,
) -> Option<SearchPattern> {
    match symbol.kind {
        SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum => {
            Some(construction_pattern(ctx, symbol))
        }
        SymbolKind::Initializer if symbol.is_static => None,
        SymbolKind::Initializer => {
            let declaring = symbol
                .declaring_type
                .as_ref()
                .and_then(|id| ctx.backend.model.symbol(id))?;
            Some(construction_pattern(ctx, &declaring))
        }
        SymbolKind::Field => Some(SearchPattern::References {
            target: symbol.id.clone(),
            access: field_mode,
        }),
        SymbolKind::Method | SymbolKind::Constructor => Some(SearchPattern::References {
            target: symbol.id.clone(),
            access: FieldAccessMode::References,
        }),
    }
}

/// Calling a type means constructing it. Local types are found through
/// their instance creations, others by qualified name.
fn construction_pattern(ctx: &DiscoveryContext<'_>, ty: &Symbol) -> SearchPattern {
    let is_local = ty
        .parent
        .as_ref()
        .and_then(|id| ctx.backend.model.symbol(id))
        .is_some_and(|parent| !parent.is_type());
    if is_local {
        SearchPattern::InstanceCreations {
            type_id: ty.id.clone(),
        }
    } else {
        SearchPattern::ConstructorReferences {
            type_name: ty.type_name.clone(),
        }
    }
}

/// Private members are only searched where they can be referenced.
fn search_scope(session_scope: &SearchScope, symbol: &Symbol) -> SearchScope {
    if !session_scope.is_workspace() || !symbol.is_private() {
        return session_scope.clone();
    }
    if symbol.container.binary {
        SearchScope::Packages(vec![symbol.container.package.clone()])
    } else {
        SearchScope::Units(vec![symbol.unit().clone()])
    }
}
