//! Syntax trees handed over by the external parser.
//!
//! The engine never parses source itself. A project model produces a
//! [`SyntaxTree`] per unit: an arena of nodes carrying their byte range, their
//! kind, and whatever the binder resolved for them (a [`MethodBinding`] for
//! invocations, the declared [`SymbolId`] for declarations).

use serde::{Deserialize, Serialize};

use crate::source::{LineIndex, TextRange};
use crate::types::{SymbolId, UnitId};

/// Index of a node inside its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyntaxNodeId(pub usize);

/// Node kinds the callee walk distinguishes. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxKind {
    /// Compilation unit root
    CompilationUnit,
    /// Class, interface or enum declaration (top-level, member or local)
    TypeDeclaration,
    /// Method declaration
    MethodDeclaration,
    /// Constructor declaration
    ConstructorDeclaration,
    /// Field declaration
    FieldDeclaration,
    /// Initializer block
    Initializer,
    /// `receiver.m(...)` or `m(...)`
    MethodInvocation,
    /// `super.m(...)`
    SuperMethodInvocation,
    /// `this(...)` inside a constructor
    ConstructorInvocation,
    /// `super(...)` inside a constructor
    SuperConstructorInvocation,
    /// `new T(...)`, with or without an anonymous body
    InstanceCreation,
    /// The `{ ... }` body of an anonymous class
    AnonymousClassBody,
    /// Any other statement or expression
    Other,
}

impl SyntaxKind {
    /// Returns `true` for the kinds that invoke a method or constructor.
    #[must_use]
    pub fn is_invocation(&self) -> bool {
        matches!(
            self,
            Self::MethodInvocation
                | Self::SuperMethodInvocation
                | Self::ConstructorInvocation
                | Self::SuperConstructorInvocation
                | Self::InstanceCreation
        )
    }
}

/// Reference to a type as seen by the binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Fully qualified name, e.g. `java.lang.Object`
    pub qualified_name: String,
    /// Declaration handle, when the type has one in the project model
    #[serde(default)]
    pub symbol: Option<SymbolId>,
    /// The type is an interface
    #[serde(default)]
    pub is_interface: bool,
}

/// Declaring type of a bound method, with the supertypes needed to resolve
/// anonymous-class instantiations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaringType {
    /// The type itself
    #[serde(flatten)]
    pub ty: TypeRef,
    /// Anonymous class declaration
    #[serde(default)]
    pub is_anonymous: bool,
    /// Direct superclass
    #[serde(default)]
    pub superclass: Option<TypeRef>,
    /// Directly implemented interfaces, in declaration order
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
}

/// What the binder resolved an invocation to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBinding {
    /// Method name (the type's simple name for constructors)
    pub name: String,
    /// Parameter type names
    #[serde(default)]
    pub parameter_types: Vec<String>,
    /// The binding is a constructor
    #[serde(default)]
    pub is_constructor: bool,
    /// Type declaring the bound method
    pub declaring_type: DeclaringType,
}

/// One node of a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    /// What kind of node this is
    pub kind: SyntaxKind,
    /// Full extent of the node
    pub range: TextRange,
    /// Extent of the declared name, for declarations
    #[serde(default)]
    pub name_range: Option<TextRange>,
    /// Declaration handle, for declarations
    #[serde(default)]
    pub declares: Option<SymbolId>,
    /// Resolved target, for invocations; `None` when binding failed
    #[serde(default)]
    pub binding: Option<MethodBinding>,
    /// Child nodes in source order
    #[serde(default)]
    pub children: Vec<SyntaxNodeId>,
}

impl SyntaxNode {
    /// Create a childless node of `kind` spanning `range`.
    #[must_use]
    pub fn new(kind: SyntaxKind, range: TextRange) -> Self {
        Self {
            kind,
            range,
            name_range: None,
            declares: None,
            binding: None,
            children: Vec::new(),
        }
    }

    /// Attach the declared symbol and its name range.
    #[must_use]
    pub fn declaring(mut self, symbol: SymbolId, name_range: Option<TextRange>) -> Self {
        self.declares = Some(symbol);
        self.name_range = name_range;
        self
    }

    /// Attach a resolved binding.
    #[must_use]
    pub fn bound_to(mut self, binding: MethodBinding) -> Self {
        self.binding = Some(binding);
        self
    }
}

/// A parsed, bound syntax tree for one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxTree {
    unit: UnitId,
    version: u64,
    nodes: Vec<SyntaxNode>,
    #[serde(skip)]
    lines: LineIndex,
}

impl SyntaxTree {
    /// Create a tree for `unit` parsed from `text` at buffer `version`.
    ///
    /// Starts with a single `CompilationUnit` root spanning the whole text.
    #[must_use]
    pub fn new(unit: UnitId, version: u64, text: &str) -> Self {
        let length = u32::try_from(text.len()).unwrap_or(u32::MAX);
        Self {
            unit,
            version,
            nodes: vec![SyntaxNode::new(
                SyntaxKind::CompilationUnit,
                TextRange::new(0, length),
            )],
            lines: LineIndex::new(text),
        }
    }

    /// Rebuild the line table after deserialization.
    pub fn attach_text(&mut self, text: &str) {
        self.lines = LineIndex::new(text);
    }

    /// Add `node` as the last child of `parent`, returning its id.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not a node of this tree.
    pub fn push(&mut self, parent: SyntaxNodeId, node: SyntaxNode) -> SyntaxNodeId {
        let id = SyntaxNodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// The root node id.
    #[must_use]
    pub fn root(&self) -> SyntaxNodeId {
        SyntaxNodeId(0)
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: SyntaxNodeId) -> Option<&SyntaxNode> {
        self.nodes.get(id.0)
    }

    /// Unit this tree was parsed from.
    #[must_use]
    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    /// Buffer version this tree was parsed from.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 1-indexed line of `offset`, clamped to at least 1.
    #[must_use]
    pub fn line_of(&self, offset: u32) -> u32 {
        self.lines.line_of(offset).unwrap_or(1).max(1)
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds only its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}
