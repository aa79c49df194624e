//! Per-direction memoization of discovery results.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{CallEdgeMap, Direction, FieldAccessMode, SymbolId};

/// Symbol handle to discovered edges, for one direction of one session.
///
/// Once an entry is present, discovery is not run again for that symbol
/// until the entry is evicted. Field callers are discovered per access mode,
/// so their entries also carry the mode they were searched with; other
/// symbols use `None`. Not synchronized; a session is expanded by one thread
/// at a time.
#[derive(Debug)]
pub struct SharedCache {
    direction: Direction,
    entries: HashMap<(SymbolId, Option<FieldAccessMode>), Arc<CallEdgeMap>>,
}

impl SharedCache {
    /// Create an empty cache for `direction`.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            entries: HashMap::new(),
        }
    }

    /// Direction this cache serves.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Cached edges for `symbol` discovered under `mode`.
    #[must_use]
    pub fn get(&self, symbol: &SymbolId, mode: Option<FieldAccessMode>) -> Option<Arc<CallEdgeMap>> {
        self.entries.get(&(symbol.clone(), mode)).cloned()
    }

    /// Returns `true` if `symbol` has an entry under any mode.
    #[must_use]
    pub fn contains(&self, symbol: &SymbolId) -> bool {
        self.entries.keys().any(|(id, _)| id == symbol)
    }

    /// Returns `true` if `symbol` has an entry for exactly `mode`.
    #[must_use]
    pub fn contains_mode(&self, symbol: &SymbolId, mode: Option<FieldAccessMode>) -> bool {
        self.entries.contains_key(&(symbol.clone(), mode))
    }

    /// Store the edges discovered for `symbol` under `mode`.
    pub fn insert(&mut self, symbol: SymbolId, mode: Option<FieldAccessMode>, edges: Arc<CallEdgeMap>) {
        self.entries.insert((symbol, mode), edges);
    }

    /// Evict every entry of `symbol`, returning `true` if it had one.
    pub fn remove(&mut self, symbol: &SymbolId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(id, _), _| id != symbol);
        self.entries.len() != before
    }

    /// Evict everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
