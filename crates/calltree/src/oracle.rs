//! Ports to the external compiler and indexing platform.
//!
//! The hierarchy engine consumes three collaborators and never implements
//! them itself:
//!
//! - [`ProjectModel`]: declarations, syntax trees and source buffers
//! - [`ReferenceIndex`]: project-wide reference search
//! - [`TypeHierarchy`]: supertype and subtype queries
//!
//! [`Backend`] bundles one of each for a session. The in-memory
//! [`MemoryProject`](crate::memory::MemoryProject) implements all three.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::source::{BufferSnapshot, TextRange};
use crate::syntax::{MethodBinding, SyntaxNodeId, SyntaxTree};
use crate::types::{FieldAccessMode, Symbol, SymbolId, UnitId};

/// Name and parameter list identifying a method within a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature<'a> {
    /// Method name (simple type name for constructors)
    pub name: &'a str,
    /// Parameter type names
    pub parameter_types: &'a [String],
    /// Whether a constructor is wanted
    pub is_constructor: bool,
}

impl MethodBinding {
    /// Signature of the bound method.
    #[must_use]
    pub fn signature(&self) -> MethodSignature<'_> {
        MethodSignature {
            name: &self.name,
            parameter_types: &self.parameter_types,
            is_constructor: self.is_constructor,
        }
    }
}

impl Symbol {
    /// Signature of a method or constructor symbol.
    #[must_use]
    pub fn signature(&self) -> MethodSignature<'_> {
        MethodSignature {
            name: &self.name,
            parameter_types: &self.parameter_types,
            is_constructor: self.kind == crate::types::SymbolKind::Constructor,
        }
    }
}

/// Declarations, syntax trees and buffers of the project.
pub trait ProjectModel: Send + Sync {
    /// Look up a declaration by handle.
    fn symbol(&self, id: &SymbolId) -> Option<Symbol>;

    /// Explicit constructors declared by a type, in declaration order.
    fn constructors(&self, type_id: &SymbolId) -> Vec<SymbolId>;

    /// The method declared directly in `type_id` with the given signature.
    fn find_method(&self, type_id: &SymbolId, signature: &MethodSignature<'_>)
    -> Option<SymbolId>;

    /// Parsed and bound syntax tree for a unit.
    ///
    /// `Ok(None)` means the unit has no source (e.g. a binary container).
    fn syntax_tree(&self, unit: &UnitId) -> Result<Option<Arc<SyntaxTree>>>;

    /// Current buffer contents of a unit.
    fn buffer(&self, unit: &UnitId) -> Option<BufferSnapshot>;

    /// Resolve the invocation at `node` to its target binding.
    fn resolve_reference(&self, tree: &SyntaxTree, node: SyntaxNodeId) -> Option<MethodBinding> {
        tree.node(node).and_then(|n| n.binding.clone())
    }
}

/// Supertype and subtype queries.
///
/// Results may contain duplicates; callers deduplicate.
pub trait TypeHierarchy: Send + Sync {
    /// All supertypes (classes and interfaces) of a type, nearest first.
    fn supertypes(&self, type_id: &SymbolId) -> Result<Vec<SymbolId>>;

    /// All types implementing or extending a type, transitively.
    fn subtypes(&self, type_id: &SymbolId) -> Result<Vec<SymbolId>>;
}

/// What a reference search looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchPattern {
    /// References to a declaration, narrowed by access mode for fields
    References {
        /// Declaration being referenced
        target: SymbolId,
        /// Access mode (only meaningful for fields)
        access: FieldAccessMode,
    },
    /// Constructor invocations of a type, by fully qualified name
    ConstructorReferences {
        /// Fully qualified type name
        type_name: String,
    },
    /// Instance creations of a local type
    InstanceCreations {
        /// Local type declaration
        type_id: SymbolId,
    },
}

/// Where a reference search looks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum SearchScope {
    /// The whole workspace
    #[default]
    Workspace,
    /// Only the listed units
    Units(Vec<UnitId>),
    /// Only the listed packages
    Packages(Vec<String>),
}

impl SearchScope {
    /// Returns `true` if a declaration in `unit`/`package` is inside this scope.
    #[must_use]
    pub fn encloses_location(&self, unit: &UnitId, package: &str) -> bool {
        match self {
            Self::Workspace => true,
            Self::Units(units) => units.contains(unit),
            Self::Packages(packages) => packages.iter().any(|p| p == package),
        }
    }

    /// Returns `true` if `symbol` is declared inside this scope.
    #[must_use]
    pub fn encloses(&self, symbol: &Symbol) -> bool {
        self.encloses_location(symbol.unit(), &symbol.container.package)
    }

    /// Returns `true` for the workspace scope.
    #[must_use]
    pub fn is_workspace(&self) -> bool {
        matches!(self, Self::Workspace)
    }
}

/// How certain the index is about a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAccuracy {
    /// Resolved exactly
    #[default]
    Accurate,
    /// Textual or partially resolved match
    Inaccurate,
}

/// One hit returned by [`ReferenceIndex::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Declaration enclosing the match; `None` outside any member (imports, package clauses)
    pub enclosing: Option<SymbolId>,
    /// Unit containing the match
    pub unit: UnitId,
    /// Byte range of the match
    pub range: TextRange,
    /// Match certainty
    #[serde(default)]
    pub accuracy: MatchAccuracy,
    /// The match sits in a comment
    #[serde(default)]
    pub inside_comment: bool,
    /// Buffer version the match was computed against
    #[serde(default)]
    pub buffer_version: u64,
}

/// Project-wide reference search.
pub trait ReferenceIndex: Send + Sync {
    /// Run a search. Implementations should poll `cancel` and return
    /// [`Error::Cancelled`](crate::Error::Cancelled) when it fires.
    fn search(
        &self,
        pattern: &SearchPattern,
        scope: &SearchScope,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchMatch>>;
}

/// The collaborators one session talks to.
#[derive(Clone, Copy)]
pub struct Backend<'a> {
    /// Declarations, trees and buffers
    pub model: &'a dyn ProjectModel,
    /// Reference search
    pub index: &'a dyn ReferenceIndex,
    /// Type hierarchy queries
    pub hierarchy: &'a dyn TypeHierarchy,
}

impl<'a> Backend<'a> {
    /// Bundle three separate collaborators.
    #[must_use]
    pub fn new(
        model: &'a dyn ProjectModel,
        index: &'a dyn ReferenceIndex,
        hierarchy: &'a dyn TypeHierarchy,
    ) -> Self {
        Self {
            model,
            index,
            hierarchy,
        }
    }

    /// Use one value that implements every collaborator.
    #[must_use]
    pub fn from_project<P>(project: &'a P) -> Self
    where
        P: ProjectModel + ReferenceIndex + TypeHierarchy,
    {
        Self::new(project, project, project)
    }
}

impl std::fmt::Debug for Backend<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
