//! Overriding and overridden methods through the type hierarchy.

use std::collections::HashSet;

use tracing::trace;

use crate::error::Result;
use crate::oracle::{ProjectModel, TypeHierarchy};
use crate::types::{Symbol, SymbolId, SymbolKind};

/// Read-only queries from a method to its implementations and back.
///
/// Hierarchy results are deduplicated before use; an oracle may report the
/// same type more than once.
#[derive(Clone, Copy)]
pub struct ImplementorResolver<'a> {
    model: &'a dyn ProjectModel,
    hierarchy: &'a dyn TypeHierarchy,
}

impl<'a> ImplementorResolver<'a> {
    /// Create a resolver over the given collaborators.
    #[must_use]
    pub fn new(model: &'a dyn ProjectModel, hierarchy: &'a dyn TypeHierarchy) -> Self {
        Self { model, hierarchy }
    }

    /// Concrete methods implementing `method`, when it is declared on an interface.
    ///
    /// Returns an empty list for methods of classes.
    ///
    /// # Errors
    ///
    /// Propagates type hierarchy failures.
    pub fn implementing_methods(&self, method: &Symbol) -> Result<Vec<SymbolId>> {
        let Some(declaring) = self.declaring_type_of(method) else {
            return Ok(Vec::new());
        };
        if declaring.kind != SymbolKind::Interface {
            return Ok(Vec::new());
        }
        let subtypes = dedupe(self.hierarchy.subtypes(&declaring.id)?);
        let signature = method.signature();
        let found: Vec<SymbolId> = subtypes
            .iter()
            .filter_map(|ty| self.model.find_method(ty, &signature))
            .collect();
        trace!(method = %method.id, implementors = found.len(), "Resolved implementing methods");
        Ok(dedupe(found))
    }

    /// Interface methods that `method` implements.
    ///
    /// # Errors
    ///
    /// Propagates type hierarchy failures.
    pub fn interface_methods(&self, method: &Symbol) -> Result<Vec<SymbolId>> {
        let Some(declaring) = self.declaring_type_of(method) else {
            return Ok(Vec::new());
        };
        let supertypes = dedupe(self.hierarchy.supertypes(&declaring.id)?);
        let signature = method.signature();
        let found: Vec<SymbolId> = supertypes
            .iter()
            .filter(|ty| {
                self.model
                    .symbol(ty)
                    .is_some_and(|s| s.kind == SymbolKind::Interface)
            })
            .filter_map(|ty| self.model.find_method(ty, &signature))
            .collect();
        Ok(dedupe(found))
    }

    /// Every type implementing or extending `type_id`, without duplicates.
    ///
    /// # Errors
    ///
    /// Propagates type hierarchy failures.
    pub fn implementing_types(&self, type_id: &SymbolId) -> Result<Vec<SymbolId>> {
        Ok(dedupe(self.hierarchy.subtypes(type_id)?))
    }

    /// Every supertype of `type_id`, without duplicates, nearest first.
    ///
    /// # Errors
    ///
    /// Propagates type hierarchy failures.
    pub fn supertypes(&self, type_id: &SymbolId) -> Result<Vec<SymbolId>> {
        Ok(dedupe(self.hierarchy.supertypes(type_id)?))
    }

    fn declaring_type_of(&self, method: &Symbol) -> Option<Symbol> {
        if !method.kind.is_method() {
            return None;
        }
        method
            .declaring_type
            .as_ref()
            .and_then(|id| self.model.symbol(id))
    }
}

impl std::fmt::Debug for ImplementorResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplementorResolver").finish_non_exhaustive()
    }
}

/// Remove duplicates, keeping first occurrences in order.
fn dedupe(ids: Vec<SymbolId>) -> Vec<SymbolId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
