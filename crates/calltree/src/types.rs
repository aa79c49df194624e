//! Domain types for call hierarchies.
//!
//! These types represent the symbol and location model:
//! - **Identity**: `SymbolId`, `UnitId` (opaque handles owned by the project model)
//! - **Entities**: `Symbol` (a declaration, read-only here)
//! - **Discovery results**: `CallSite`, `CallEdge`, `CallEdgeMap`
//! - **Traversal tags**: `Direction`, `FieldAccessMode`
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Symbol identity | String handle newtype | Handles come from the project model and compare by value |
//! | Edge storage | `Arc<CallEdge>` | Tree nodes share edges with the session cache |
//! | Edge map order | Discovery order | Caller siblings have no other mandated order |
//! | Line numbers | Lazy, version-checked | Buffers can change after discovery |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::source::{BufferSnapshot, TextRange};

// ============================================================================
// Strongly-typed handles
// ============================================================================

/// Opaque, globally stable handle identifying a declaration.
///
/// Two symbols are the same declaration iff their handles compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    /// Create a handle from its string form.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The raw handle string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(handle: &str) -> Self {
        Self::new(handle)
    }
}

/// Handle identifying a source unit (a compilation unit or a binary container).
///
/// For source units this is the document URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Create a unit handle from its string form.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The raw handle string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(handle: &str) -> Self {
        Self::new(handle)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Kinds of declarations a hierarchy can start from or pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Method declared on a type
    Method,
    /// Explicit constructor
    Constructor,
    /// Field or enum constant
    Field,
    /// Initializer block
    Initializer,
    /// Class (including anonymous and local classes)
    Class,
    /// Interface
    Interface,
    /// Enum type
    Enum,
}

impl SymbolKind {
    /// Returns `true` for type declarations.
    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Class | Self::Interface | Self::Enum)
    }

    /// Returns `true` for methods and constructors.
    #[must_use]
    pub fn is_method(&self) -> bool {
        matches!(self, Self::Method | Self::Constructor)
    }

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::Field => "field",
            Self::Initializer => "initializer",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
        }
    }
}

/// Declared visibility of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible everywhere
    #[default]
    Public,
    /// Visible to subtypes and the package
    Protected,
    /// Visible within the package
    Package,
    /// Visible only within the declaring unit
    Private,
}

/// Which way a hierarchy is explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Who references this declaration
    Callers,
    /// What this declaration references
    Callees,
}

/// Narrows caller discovery for field symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAccessMode {
    /// Every reference (reads and writes)
    #[default]
    References,
    /// Read accesses only
    Read,
    /// Write accesses only
    Write,
}

// ============================================================================
// Symbols
// ============================================================================

/// Where a declaration lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Source unit or binary container holding the declaration
    pub unit: UnitId,
    /// Package (namespace) name, e.g. `com.example.util`
    pub package: String,
    /// `true` when the container has no editable source (a class file in a jar)
    #[serde(default)]
    pub binary: bool,
}

/// A declared program element, produced by the project model and only read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Stable handle
    pub id: SymbolId,
    /// Simple name (e.g. `save`)
    pub name: String,
    /// What kind of declaration this is
    pub kind: SymbolKind,
    /// Fully qualified name of the type this symbol is (for types) or is declared in
    pub type_name: String,
    /// Declaring type, `None` for top-level types
    #[serde(default)]
    pub declaring_type: Option<SymbolId>,
    /// Syntactic parent element (for local and anonymous types, the enclosing member)
    #[serde(default)]
    pub parent: Option<SymbolId>,
    /// Declared visibility
    #[serde(default)]
    pub visibility: Visibility,
    /// `static` modifier
    #[serde(default)]
    pub is_static: bool,
    /// Anonymous class declaration
    #[serde(default)]
    pub is_anonymous: bool,
    /// Marked deprecated
    #[serde(default)]
    pub deprecated: bool,
    /// Parameter type names, for methods and constructors
    #[serde(default)]
    pub parameter_types: Vec<String>,
    /// Containing unit and package
    pub container: Container,
    /// Full extent of the declaration
    #[serde(default)]
    pub source_range: Option<TextRange>,
    /// Extent of the declaration's name
    #[serde(default)]
    pub name_range: Option<TextRange>,
}

impl Symbol {
    /// Returns `true` for type declarations.
    #[must_use]
    pub fn is_type(&self) -> bool {
        self.kind.is_type()
    }

    /// Returns `true` for private members.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    /// Unit holding this declaration.
    #[must_use]
    pub fn unit(&self) -> &UnitId {
        &self.container.unit
    }
}

// ============================================================================
// Call sites and edges
// ============================================================================

/// Line number and snippet of a call site, or `Unknown` when the buffer no
/// longer matches what was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInfo {
    /// Resolved position
    Known {
        /// 1-indexed line number
        line: u32,
        /// Trimmed text of that line
        snippet: String,
    },
    /// The backing buffer is missing, stale or out of range
    Unknown,
}

impl LineInfo {
    /// The line number, if known.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Known { line, .. } => Some(*line),
            Self::Unknown => None,
        }
    }
}

/// One concrete occurrence of a reference.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Declaration the reference occurs in
    pub context: SymbolId,
    /// Referenced declaration, `None` if it could not be resolved to a declared member
    pub target: Option<SymbolId>,
    /// Unit containing the reference
    pub unit: UnitId,
    /// Byte range of the reference
    pub range: TextRange,
    /// Buffer version the range was discovered against
    pub buffer_version: u64,
    line_info: OnceLock<LineInfo>,
}

impl CallSite {
    /// Create a call site whose line information is computed on first access.
    #[must_use]
    pub fn new(
        context: SymbolId,
        target: Option<SymbolId>,
        unit: UnitId,
        range: TextRange,
        buffer_version: u64,
    ) -> Self {
        Self {
            context,
            target,
            unit,
            range,
            buffer_version,
            line_info: OnceLock::new(),
        }
    }

    /// Create a call site with a line number already known from the syntax tree.
    #[must_use]
    pub fn with_line(mut self, line: u32, snippet: impl Into<String>) -> Self {
        self.line_info = OnceLock::from(LineInfo::Known {
            line,
            snippet: snippet.into(),
        });
        self
    }

    /// Start offset of the reference.
    #[must_use]
    pub fn start(&self) -> u32 {
        self.range.start
    }

    /// End offset of the reference.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.range.end()
    }

    /// Line number and snippet against the current buffer.
    ///
    /// Computed on first access and cached. Returns [`LineInfo::Unknown`]
    /// whenever `buffer` is absent or its version differs from the one the
    /// site was discovered against.
    #[must_use]
    pub fn line_info(&self, buffer: Option<&BufferSnapshot>) -> LineInfo {
        let Some(buffer) = buffer.filter(|b| b.version() == self.buffer_version) else {
            return LineInfo::Unknown;
        };
        self.line_info
            .get_or_init(|| {
                match (buffer.line_of(self.start()), buffer.line_text(self.start())) {
                    (Some(line), Some(snippet)) => LineInfo::Known {
                        line,
                        snippet: snippet.to_string(),
                    },
                    _ => LineInfo::Unknown,
                }
            })
            .clone()
    }
}

/// All call sites sharing the same (context, member) pair.
///
/// `member` is the declaration the edge leads to from the requesting node's
/// point of view: the callee in callee direction, the caller in caller direction.
#[derive(Debug, Clone)]
pub struct CallEdge {
    member: Symbol,
    sites: Vec<CallSite>,
}

impl CallEdge {
    /// Create an edge with no sites yet.
    #[must_use]
    pub fn new(member: Symbol) -> Self {
        Self {
            member,
            sites: Vec::new(),
        }
    }

    /// The declaration this edge leads to.
    #[must_use]
    pub fn member(&self) -> &Symbol {
        &self.member
    }

    /// Handle of the declaration this edge leads to.
    #[must_use]
    pub fn key(&self) -> &SymbolId {
        &self.member.id
    }

    /// Sites in discovery order.
    #[must_use]
    pub fn sites(&self) -> &[CallSite] {
        &self.sites
    }

    /// The first discovered site, used for default ordering.
    #[must_use]
    pub fn representative(&self) -> Option<&CallSite> {
        self.sites.first()
    }

    fn push(&mut self, site: CallSite) {
        self.sites.push(site);
    }
}

/// Every edge discovered for one symbol in one direction, keyed by member handle.
///
/// Filled once by a discovery engine, then only read.
#[derive(Debug, Default)]
pub struct CallEdgeMap {
    edges: Vec<Arc<CallEdge>>,
    by_key: HashMap<SymbolId, usize>,
}

impl CallEdgeMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site to the edge for `member`, creating the edge if needed.
    pub fn add(&mut self, member: &Symbol, site: CallSite) {
        let index = match self.by_key.get(&member.id) {
            Some(&index) => index,
            None => {
                self.edges.push(Arc::new(CallEdge::new(member.clone())));
                self.by_key.insert(member.id.clone(), self.edges.len() - 1);
                self.edges.len() - 1
            }
        };
        Arc::make_mut(&mut self.edges[index]).push(site);
    }

    /// Look up the edge for a member handle.
    #[must_use]
    pub fn get(&self, key: &SymbolId) -> Option<&Arc<CallEdge>> {
        self.by_key.get(key).map(|&index| &self.edges[index])
    }

    /// Edges in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CallEdge>> {
        self.edges.iter()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if no edges were discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Total number of call sites across all edges.
    #[must_use]
    pub fn site_count(&self) -> usize {
        self.edges.iter().map(|edge| edge.sites().len()).sum()
    }
}
