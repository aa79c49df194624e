//! # Calltree: Lazy Caller and Callee Hierarchies
//!
//! Calltree builds "who calls this" and "what does this call" trees for Java
//! declarations on top of an external compiler platform. The platform
//! supplies syntax trees, symbol resolution, a reference index and type
//! hierarchy queries through the traits in [`oracle`]; calltree turns them
//! into trees that expand on demand.
//!
//! ## Design Philosophy
//!
//! - **Lazy** - nothing is discovered until a node's children are requested
//! - **Memoized** - each symbol is discovered at most once per session and direction
//! - **Cycle-aware** - a node whose symbol already appears above it has no children
//! - **Merged edges** - repeated calls to the same declaration form one edge with many sites
//! - **Oracle-agnostic** - the engine never parses or binds source itself
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use calltree::{
//!     Backend, CancellationToken, Direction, HierarchyConfig, HierarchySession, MemoryProject,
//!     SymbolId,
//! };
//!
//! let project = MemoryProject::load(Path::new("project.json"))?;
//! let mut session =
//!     HierarchySession::new(Backend::from_project(&project), HierarchyConfig::default())?;
//!
//! let roots = session.build_roots(&[SymbolId::new("com.example.Store#save()")], Direction::Callers)?;
//! let cancel = CancellationToken::new();
//! for child in session.children_of(roots[0], &cancel)? {
//!     if let Some(node) = session.node(child) {
//!         println!("{} ({} call sites)", node.symbol().name, node.edge().sites().len());
//!     }
//! }
//! # Ok::<(), calltree::Error>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod implementors;
pub mod lsp;
pub mod memory;
pub mod oracle;
pub mod source;
pub mod syntax;
pub mod types;

pub use config::{HierarchyConfig, parse_filter_list};
pub use error::{Error, Result};
pub use filter::{DEFAULT_IGNORE_FILTERS, IgnoreFilter};
pub use hierarchy::{
    CallHierarchyVisitor, DepthLimitedCollector, Expansion, HierarchySession, NodeId, NodeKind,
    NodePath, SharedCache, TreeNode,
};
pub use implementors::ImplementorResolver;
pub use lsp::CallHierarchyService;
pub use memory::{MemoryProject, ProjectSnapshot};
pub use oracle::{
    Backend, MatchAccuracy, MethodSignature, ProjectModel, ReferenceIndex, SearchMatch,
    SearchPattern, SearchScope, TypeHierarchy,
};
pub use source::{BufferSnapshot, LineIndex, TextRange};
pub use types::{
    CallEdge, CallEdgeMap, CallSite, Container, Direction, FieldAccessMode, LineInfo, Symbol,
    SymbolId, SymbolKind, UnitId, Visibility,
};

pub use tokio_util::sync::CancellationToken;
