//! In-memory project backend.
//!
//! [`MemoryProject`] implements [`ProjectModel`], [`ReferenceIndex`] and
//! [`TypeHierarchy`] over a [`ProjectSnapshot`]: plain declarations, unit
//! texts with their syntax trees, inheritance edges and precomputed reference
//! records. Snapshots are serde types, so a whole project can be loaded from
//! JSON.
//!
//! The backend counts the expensive calls (`syntax_tree`, `search`) so a
//! caller can observe how often discovery actually ran.
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Type graph | `petgraph::DiGraph`, edges subtype → supertype | BFS in either direction |
//! | Unit state | `RwLock` | Buffers can be edited while sessions hold `&self` |
//! | References | Linear scan | Snapshots are small; no index to keep in sync |

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use petgraph::Direction as EdgeDirection;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::oracle::{
    MatchAccuracy, MethodSignature, ProjectModel, ReferenceIndex, SearchMatch, SearchPattern,
    SearchScope, TypeHierarchy,
};
use crate::source::{BufferSnapshot, TextRange};
use crate::syntax::SyntaxTree;
use crate::types::{FieldAccessMode, Symbol, SymbolId, SymbolKind, UnitId};

// ============================================================================
// Snapshot format
// ============================================================================

/// Serializable description of a whole project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Every declaration, in declaration order
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    /// Source units
    #[serde(default)]
    pub units: Vec<UnitSnapshot>,
    /// Direct subtype relations
    #[serde(default)]
    pub inheritance: Vec<Inheritance>,
    /// Every reference the index knows about
    #[serde(default)]
    pub references: Vec<ReferenceRecord>,
}

/// One source unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit handle (document URI)
    pub id: UnitId,
    /// Package the unit belongs to
    #[serde(default)]
    pub package: String,
    /// Current source text
    pub text: String,
    /// Buffer version of `text`
    #[serde(default = "first_version")]
    pub version: u64,
    /// Parsed tree, `None` if the unit does not parse
    #[serde(default)]
    pub tree: Option<SyntaxTree>,
}

fn first_version() -> u64 {
    1
}

/// `subtype` directly extends or implements `supertype`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inheritance {
    /// Extending or implementing type
    pub subtype: SymbolId,
    /// Extended class or implemented interface
    pub supertype: SymbolId,
}

/// How a reference touches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceAccess {
    /// Method call or plain mention
    #[default]
    Call,
    /// Field read
    Read,
    /// Field write
    Write,
    /// Instance creation (`new T(...)`, `this(...)`, `super(...)`)
    Construction,
}

/// One reference known to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Referenced declaration (a constructor, or a type for implicit construction)
    pub target: SymbolId,
    /// Declaration the reference occurs in
    #[serde(default)]
    pub enclosing: Option<SymbolId>,
    /// Unit containing the reference
    pub unit: UnitId,
    /// Byte range of the reference
    pub range: TextRange,
    /// Kind of access
    #[serde(default)]
    pub access: ReferenceAccess,
    /// Match certainty reported back
    #[serde(default)]
    pub accuracy: MatchAccuracy,
    /// The reference sits in a comment
    #[serde(default)]
    pub inside_comment: bool,
}

// ============================================================================
// MemoryProject
// ============================================================================

struct UnitState {
    package: String,
    buffer: BufferSnapshot,
    tree: Option<Arc<SyntaxTree>>,
}

/// A complete in-memory backend.
pub struct MemoryProject {
    symbols: HashMap<SymbolId, Symbol>,
    members: HashMap<SymbolId, Vec<SymbolId>>,
    units: RwLock<HashMap<UnitId, UnitState>>,
    types: DiGraph<SymbolId, ()>,
    type_nodes: HashMap<SymbolId, NodeIndex>,
    references: Vec<ReferenceRecord>,
    syntax_tree_calls: AtomicUsize,
    search_log: Mutex<Vec<SearchPattern>>,
    fail_searches: AtomicBool,
}

impl MemoryProject {
    /// Build a project from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if two symbols or two units share a handle.
    pub fn from_snapshot(snapshot: ProjectSnapshot) -> Result<Self> {
        let mut symbols = HashMap::with_capacity(snapshot.symbols.len());
        let mut members: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
        for symbol in snapshot.symbols {
            if let Some(owner) = &symbol.declaring_type {
                members
                    .entry(owner.clone())
                    .or_default()
                    .push(symbol.id.clone());
            }
            let id = symbol.id.clone();
            if symbols.insert(id.clone(), symbol).is_some() {
                return Err(Error::Config(format!("duplicate symbol {id}")));
            }
        }

        let mut units = HashMap::with_capacity(snapshot.units.len());
        for unit in snapshot.units {
            let tree = unit.tree.map(|mut tree| {
                tree.attach_text(&unit.text);
                Arc::new(tree)
            });
            let state = UnitState {
                package: unit.package,
                buffer: BufferSnapshot::new(unit.version, unit.text),
                tree,
            };
            if units.insert(unit.id.clone(), state).is_some() {
                return Err(Error::Config(format!("duplicate unit {}", unit.id)));
            }
        }

        let mut types = DiGraph::new();
        let mut type_nodes = HashMap::new();
        for edge in &snapshot.inheritance {
            let sub = type_node(&mut types, &mut type_nodes, &edge.subtype);
            let sup = type_node(&mut types, &mut type_nodes, &edge.supertype);
            types.update_edge(sub, sup, ());
        }

        debug!(
            symbols = symbols.len(),
            units = units.len(),
            references = snapshot.references.len(),
            "Loaded in-memory project"
        );
        Ok(Self {
            symbols,
            members,
            units: RwLock::new(units),
            types,
            type_nodes,
            references: snapshot.references,
            syntax_tree_calls: AtomicUsize::new(0),
            search_log: Mutex::new(Vec::new()),
            fail_searches: AtomicBool::new(false),
        })
    }

    /// Parse a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed input, or the errors of
    /// [`from_snapshot`](Self::from_snapshot).
    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::from_snapshot(serde_json::from_str(content)?)
    }

    /// Load a JSON snapshot from disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, or the errors of [`from_json_str`](Self::from_json_str).
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Replace a unit's text and bump its version, returning the new version.
    ///
    /// The unit's syntax tree is kept, so sites found through it become stale
    /// until [`replace_syntax_tree`](Self::replace_syntax_tree) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown unit.
    pub fn update_source(&self, unit: &UnitId, text: &str) -> Result<u64> {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        let state = units
            .get_mut(unit)
            .ok_or_else(|| Error::NotFound(format!("unit {unit}")))?;
        let version = state.buffer.version() + 1;
        state.buffer = BufferSnapshot::new(version, text);
        debug!(unit = %unit, version, "Updated source");
        Ok(version)
    }

    /// Install a freshly parsed tree for its unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown unit.
    pub fn replace_syntax_tree(&self, mut tree: SyntaxTree) -> Result<()> {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        let state = units
            .get_mut(tree.unit())
            .ok_or_else(|| Error::NotFound(format!("unit {}", tree.unit())))?;
        tree.attach_text(state.buffer.text());
        state.tree = Some(Arc::new(tree));
        Ok(())
    }

    /// Make every subsequent search fail with a backend error.
    pub fn set_fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    /// Number of `syntax_tree` requests served.
    #[must_use]
    pub fn syntax_tree_calls(&self) -> usize {
        self.syntax_tree_calls.load(Ordering::SeqCst)
    }

    /// Number of searches run.
    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.lock_log().len()
    }

    /// Every search pattern received, in order.
    #[must_use]
    pub fn searches(&self) -> Vec<SearchPattern> {
        self.lock_log().clone()
    }

    /// Number of searches that looked for references to `target`.
    #[must_use]
    pub fn searches_for(&self, target: &SymbolId) -> usize {
        self.lock_log()
            .iter()
            .filter(|pattern| matches!(pattern, SearchPattern::References { target: t, .. } if t == target))
            .count()
    }

    /// Reset the call counters.
    pub fn reset_counters(&self) {
        self.syntax_tree_calls.store(0, Ordering::SeqCst);
        self.lock_log().clear();
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<SearchPattern>> {
        self.search_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_units(&self) -> RwLockReadGuard<'_, HashMap<UnitId, UnitState>> {
        self.units.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn matches_pattern(&self, record: &ReferenceRecord, pattern: &SearchPattern) -> bool {
        match pattern {
            SearchPattern::References { target, access } => {
                record.target == *target
                    && match access {
                        FieldAccessMode::References => true,
                        FieldAccessMode::Read => record.access == ReferenceAccess::Read,
                        FieldAccessMode::Write => record.access == ReferenceAccess::Write,
                    }
            }
            SearchPattern::ConstructorReferences { type_name } => {
                record.access == ReferenceAccess::Construction
                    && self.symbols.get(&record.target).is_some_and(|target| {
                        &target.type_name == type_name
                            && (target.is_type() || target.kind == SymbolKind::Constructor)
                    })
            }
            SearchPattern::InstanceCreations { type_id } => {
                record.access == ReferenceAccess::Construction
                    && (record.target == *type_id
                        || self.symbols.get(&record.target).is_some_and(|target| {
                            target.kind == SymbolKind::Constructor
                                && target.declaring_type.as_ref() == Some(type_id)
                        }))
            }
        }
    }

    /// Breadth-first closure over the type graph, nearest first.
    fn reachable_types(&self, start: &SymbolId, direction: EdgeDirection) -> Vec<SymbolId> {
        let Some(&origin) = self.type_nodes.get(start) else {
            return Vec::new();
        };
        let mut seen = HashSet::from([origin]);
        let mut queue = VecDeque::from([origin]);
        let mut found = Vec::new();
        while let Some(current) = queue.pop_front() {
            for next in self.types.neighbors_directed(current, direction) {
                if seen.insert(next) {
                    found.push(self.types[next].clone());
                    queue.push_back(next);
                }
            }
        }
        found
    }
}

fn type_node(
    graph: &mut DiGraph<SymbolId, ()>,
    nodes: &mut HashMap<SymbolId, NodeIndex>,
    id: &SymbolId,
) -> NodeIndex {
    *nodes
        .entry(id.clone())
        .or_insert_with(|| graph.add_node(id.clone()))
}

fn signature_matches(symbol: &Symbol, signature: &MethodSignature<'_>) -> bool {
    let same_params = symbol.parameter_types.as_slice() == signature.parameter_types;
    if signature.is_constructor {
        symbol.kind == SymbolKind::Constructor && same_params
    } else {
        symbol.kind == SymbolKind::Method && symbol.name == signature.name && same_params
    }
}

impl std::fmt::Debug for MemoryProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProject")
            .field("symbols", &self.symbols.len())
            .field("references", &self.references.len())
            .field("types", &self.types.node_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Oracle implementations
// ============================================================================

impl ProjectModel for MemoryProject {
    fn symbol(&self, id: &SymbolId) -> Option<Symbol> {
        self.symbols.get(id).cloned()
    }

    fn constructors(&self, type_id: &SymbolId) -> Vec<SymbolId> {
        self.members
            .get(type_id)
            .into_iter()
            .flatten()
            .filter(|id| {
                self.symbols
                    .get(*id)
                    .is_some_and(|s| s.kind == SymbolKind::Constructor)
            })
            .cloned()
            .collect()
    }

    fn find_method(
        &self,
        type_id: &SymbolId,
        signature: &MethodSignature<'_>,
    ) -> Option<SymbolId> {
        self.members
            .get(type_id)?
            .iter()
            .find(|id| {
                self.symbols
                    .get(*id)
                    .is_some_and(|s| signature_matches(s, signature))
            })
            .cloned()
    }

    fn syntax_tree(&self, unit: &UnitId) -> Result<Option<Arc<SyntaxTree>>> {
        self.syntax_tree_calls.fetch_add(1, Ordering::SeqCst);
        trace!(unit = %unit, "Serving syntax tree");
        Ok(self
            .read_units()
            .get(unit)
            .and_then(|state| state.tree.clone()))
    }

    fn buffer(&self, unit: &UnitId) -> Option<BufferSnapshot> {
        self.read_units()
            .get(unit)
            .map(|state| state.buffer.clone())
    }
}

impl ReferenceIndex for MemoryProject {
    fn search(
        &self,
        pattern: &SearchPattern,
        scope: &SearchScope,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchMatch>> {
        self.lock_log().push(pattern.clone());
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(Error::backend("reference index unavailable"));
        }

        let units = self.read_units();
        let matches: Vec<SearchMatch> = self
            .references
            .iter()
            .filter(|record| self.matches_pattern(record, pattern))
            .filter_map(|record| {
                let state = units.get(&record.unit);
                let package = state.map_or("", |s| s.package.as_str());
                if !scope.encloses_location(&record.unit, package) {
                    return None;
                }
                Some(SearchMatch {
                    enclosing: record.enclosing.clone(),
                    unit: record.unit.clone(),
                    range: record.range,
                    accuracy: record.accuracy,
                    inside_comment: record.inside_comment,
                    buffer_version: state.map_or(0, |s| s.buffer.version()),
                })
            })
            .collect();
        trace!(?pattern, matches = matches.len(), "Search complete");
        Ok(matches)
    }
}

impl TypeHierarchy for MemoryProject {
    fn supertypes(&self, type_id: &SymbolId) -> Result<Vec<SymbolId>> {
        Ok(self.reachable_types(type_id, EdgeDirection::Outgoing))
    }

    fn subtypes(&self, type_id: &SymbolId) -> Result<Vec<SymbolId>> {
        Ok(self.reachable_types(type_id, EdgeDirection::Incoming))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inheritance(pairs: &[(&str, &str)]) -> ProjectSnapshot {
        ProjectSnapshot {
            inheritance: pairs
                .iter()
                .map(|(sub, sup)| Inheritance {
                    subtype: SymbolId::new(*sub),
                    supertype: SymbolId::new(*sup),
                })
                .collect(),
            ..ProjectSnapshot::default()
        }
    }

    #[test]
    fn supertypes_are_transitive_nearest_first() {
        let project =
            MemoryProject::from_snapshot(inheritance(&[("C", "B"), ("B", "A"), ("C", "I")]))
                .unwrap();
        let supertypes = project.supertypes(&SymbolId::new("C")).unwrap();
        assert_eq!(supertypes.len(), 3);
        assert_eq!(supertypes.last(), Some(&SymbolId::new("A")));
    }

    #[test]
    fn subtypes_follow_edges_backwards() {
        let project =
            MemoryProject::from_snapshot(inheritance(&[("Impl", "Api"), ("Sub", "Impl")])).unwrap();
        let subtypes = project.subtypes(&SymbolId::new("Api")).unwrap();
        assert_eq!(subtypes, [SymbolId::new("Impl"), SymbolId::new("Sub")]);
    }

    #[test]
    fn unknown_type_has_no_relatives() {
        let project = MemoryProject::from_snapshot(ProjectSnapshot::default()).unwrap();
        assert!(project.supertypes(&SymbolId::new("X")).unwrap().is_empty());
    }

    #[test]
    fn update_source_bumps_version() {
        let snapshot = ProjectSnapshot {
            units: vec![UnitSnapshot {
                id: UnitId::new("file:///A.java"),
                package: "a".to_string(),
                text: "class A {}".to_string(),
                version: 1,
                tree: None,
            }],
            ..ProjectSnapshot::default()
        };
        let project = MemoryProject::from_snapshot(snapshot).unwrap();
        let unit = UnitId::new("file:///A.java");

        assert_eq!(project.update_source(&unit, "class A { }").unwrap(), 2);
        assert_eq!(project.buffer(&unit).map(|b| b.version()), Some(2));
        assert!(matches!(
            project.update_source(&UnitId::new("file:///B.java"), ""),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn failing_search_is_a_backend_error() {
        let project = MemoryProject::from_snapshot(ProjectSnapshot::default()).unwrap();
        project.set_fail_searches(true);
        let result = project.search(
            &SearchPattern::ConstructorReferences {
                type_name: "A".to_string(),
            },
            &SearchScope::Workspace,
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(Error::Backend(_))));
        assert_eq!(project.search_calls(), 1);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let json = r#"{
            "units": [{"id": "file:///A.java", "text": "class A {}"}],
            "inheritance": [{"subtype": "A", "supertype": "java.lang.Object"}]
        }"#;
        let project = MemoryProject::from_json_str(json).unwrap();
        let buffer = project.buffer(&UnitId::new("file:///A.java")).unwrap();
        assert_eq!(buffer.version(), 1);
        assert_eq!(
            project.supertypes(&SymbolId::new("A")).unwrap(),
            [SymbolId::new("java.lang.Object")]
        );
    }
}
