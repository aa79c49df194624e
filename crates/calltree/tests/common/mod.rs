//! Shared fixtures for integration tests.
//!
//! [`ProjectBuilder`] assembles a [`MemoryProject`] from Java source text.
//! Declarations and calls are located by searching that text, so symbol
//! ranges, syntax nodes, reference records and line numbers all agree.

#![allow(dead_code)]

use std::collections::HashMap;

use calltree::memory::{Inheritance, ReferenceAccess, ReferenceRecord, UnitSnapshot};
use calltree::syntax::{
    DeclaringType, MethodBinding, SyntaxKind, SyntaxNode, SyntaxNodeId, SyntaxTree, TypeRef,
};
use calltree::{
    Backend, CancellationToken, Container, Direction, HierarchyConfig, HierarchySession,
    MemoryProject, NodeId, ProjectSnapshot, Symbol, SymbolId, SymbolKind, TextRange, UnitId,
    Visibility,
};
use tracing_subscriber::EnvFilter;

/// Container used for declarations without source.
pub const BINARY_UNIT: &str = "jar:///rt.jar";

const OBJECT_TYPE: &str = "java.lang.Object";

struct UnitDraft {
    id: UnitId,
    package: String,
    text: String,
    tree: SyntaxTree,
}

#[derive(Clone, Copy)]
struct Declared {
    unit: usize,
    node: SyntaxNodeId,
    range: TextRange,
}

/// Builds a project from unit texts plus declarations located inside them.
#[derive(Default)]
pub struct ProjectBuilder {
    units: Vec<UnitDraft>,
    symbols: Vec<Symbol>,
    positions: HashMap<SymbolId, usize>,
    declared: HashMap<SymbolId, Declared>,
    inheritance: Vec<Inheritance>,
    references: Vec<ReferenceRecord>,
    cursors: HashMap<(SymbolId, String), usize>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source unit.
    pub fn unit(&mut self, uri: &str, package: &str, text: &str) {
        self.units.push(UnitDraft {
            id: UnitId::new(uri),
            package: package.to_string(),
            text: text.to_string(),
            tree: SyntaxTree::new(UnitId::new(uri), 1, text),
        });
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Top-level class whose declaration starts with `header`.
    pub fn class(&mut self, uri: &str, fqn: &str, header: &str) -> SymbolId {
        self.top_level(uri, fqn, header, SymbolKind::Class)
    }

    /// Top-level interface whose declaration starts with `header`.
    pub fn interface(&mut self, uri: &str, fqn: &str, header: &str) -> SymbolId {
        self.top_level(uri, fqn, header, SymbolKind::Interface)
    }

    /// Member type declared inside `owner`.
    pub fn nested_class(&mut self, owner: &SymbolId, fqn: &str, header: &str) -> SymbolId {
        let outer = self.declaration(owner);
        self.declare_type(
            outer,
            fqn,
            header,
            SymbolKind::Class,
            Some(owner.clone()),
            Some(owner.clone()),
        )
    }

    /// Local type declared in the body of `method`.
    pub fn local_class(&mut self, method: &SymbolId, fqn: &str, header: &str) -> SymbolId {
        let body = self.declaration(method);
        self.declare_type(body, fqn, header, SymbolKind::Class, None, Some(method.clone()))
    }

    /// Method of `owner`; `header` is its signature as written, e.g. `void save(String key)`.
    pub fn method(&mut self, owner: &SymbolId, header: &str) -> SymbolId {
        self.callable(owner, header, SymbolKind::Method)
    }

    /// Constructor of `owner`, e.g. `Store(int size)`.
    pub fn constructor(&mut self, owner: &SymbolId, header: &str) -> SymbolId {
        self.callable(owner, header, SymbolKind::Constructor)
    }

    /// Field of `owner`; `header` is the whole declaration, e.g. `int count = 0;`.
    pub fn field(&mut self, owner: &SymbolId, header: &str) -> SymbolId {
        let outer = self.declaration(owner);
        let start = self.find(outer.unit, outer.range, header, outer.range.start as usize);
        let declarator = header.split(['=', ';']).next().unwrap_or(header).trim_end();
        let name_offset = identifier_start(declarator);
        let name = &declarator[name_offset..];

        let id = SymbolId::new(format!("{owner}#{name}"));
        let range = span(start, start + header.len());
        let name_range = span(start + name_offset, start + declarator.len());
        let type_name = self.symbol(owner).type_name.clone();
        let mut symbol = self.make_symbol(outer.unit, &id, name, SymbolKind::Field, &type_name);
        symbol.declaring_type = Some(owner.clone());
        symbol.source_range = Some(range);
        symbol.name_range = Some(name_range);
        let node = SyntaxNode::new(SyntaxKind::FieldDeclaration, range)
            .declaring(id.clone(), Some(name_range));
        self.add(symbol, outer.unit, outer.node, node)
    }

    /// Initializer block of `owner` starting at `header` (`static {` or `{`).
    pub fn initializer(&mut self, owner: &SymbolId, header: &str, is_static: bool) -> SymbolId {
        let outer = self.declaration(owner);
        let start = self.find(outer.unit, outer.range, header, outer.range.start as usize);
        let end = self.block_end(outer.unit, start);
        let range = span(start, end);

        let suffix = if is_static { "<clinit>" } else { "<init-block>" };
        let id = SymbolId::new(format!("{owner}#{suffix}"));
        let type_name = self.symbol(owner).type_name.clone();
        let mut symbol = self.make_symbol(outer.unit, &id, "{...}", SymbolKind::Initializer, &type_name);
        symbol.declaring_type = Some(owner.clone());
        symbol.is_static = is_static;
        symbol.source_range = Some(range);
        let node = SyntaxNode::new(SyntaxKind::Initializer, range).declaring(id.clone(), None);
        self.add(symbol, outer.unit, outer.node, node)
    }

    /// Anonymous subclass of `supertype` created by `creation` (e.g.
    /// `new Listener() {`) inside `method`.
    pub fn anonymous_class(
        &mut self,
        method: &SymbolId,
        id: &str,
        creation: &str,
        supertype: &SymbolId,
    ) -> SymbolId {
        let body = self.declaration(method);
        let start = self.find(body.unit, body.range, creation, body.range.start as usize);
        let end = self.block_end(body.unit, start);
        let brace = start + creation.rfind('{').expect("creation text should end with `{`");
        let type_start = start + creation.find("new ").expect("creation text should use `new`") + 4;
        let type_end = start + creation.find('(').expect("creation text should have `(`");

        let creation_range = span(start, end);
        let body_range = span(brace, end);
        let name_range = span(type_start, type_end);

        let super_symbol = self.symbol(supertype).clone();
        let object = TypeRef {
            qualified_name: OBJECT_TYPE.to_string(),
            symbol: None,
            is_interface: false,
        };
        let (superclass, interfaces) = if super_symbol.kind == SymbolKind::Interface {
            (Some(object), vec![type_ref(&super_symbol)])
        } else {
            (Some(type_ref(&super_symbol)), Vec::new())
        };
        let anonymous_id = SymbolId::new(id);
        let binding = MethodBinding {
            name: String::new(),
            parameter_types: Vec::new(),
            is_constructor: true,
            declaring_type: DeclaringType {
                ty: TypeRef {
                    qualified_name: id.to_string(),
                    symbol: Some(anonymous_id.clone()),
                    is_interface: false,
                },
                is_anonymous: true,
                superclass,
                interfaces,
            },
        };

        let method_symbol = self.symbol(method).clone();
        let mut symbol = self.make_symbol(body.unit, &anonymous_id, "", SymbolKind::Class, id);
        symbol.is_anonymous = true;
        symbol.parent = Some(method.clone());
        symbol.declaring_type = method_symbol.declaring_type;
        symbol.source_range = Some(body_range);
        symbol.name_range = Some(name_range);

        let creation_node = self.units[body.unit].tree.push(
            body.node,
            SyntaxNode::new(SyntaxKind::InstanceCreation, creation_range).bound_to(binding),
        );
        let node = SyntaxNode::new(SyntaxKind::AnonymousClassBody, body_range)
            .declaring(anonymous_id.clone(), Some(name_range));
        self.extends(&anonymous_id, supertype);
        self.add(symbol, body.unit, creation_node, node)
    }

    /// Class available only as a binary, e.g. `java.lang.String`.
    pub fn external_class(&mut self, fqn: &str) -> SymbolId {
        let id = SymbolId::new(fqn);
        let package = fqn.rsplit_once('.').map_or("", |(package, _)| package);
        let symbol = Symbol {
            id: id.clone(),
            name: simple_name(fqn).to_string(),
            kind: SymbolKind::Class,
            type_name: fqn.to_string(),
            declaring_type: None,
            parent: None,
            visibility: Visibility::Public,
            is_static: false,
            is_anonymous: false,
            deprecated: false,
            parameter_types: Vec::new(),
            container: Container {
                unit: UnitId::new(BINARY_UNIT),
                package: package.to_string(),
                binary: true,
            },
            source_range: None,
            name_range: None,
        };
        self.push_symbol(symbol);
        id
    }

    /// Method of a binary class.
    pub fn external_method(&mut self, owner: &SymbolId, name: &str) -> SymbolId {
        let owner_symbol = self.symbol(owner).clone();
        let id = SymbolId::new(format!("{owner}#{name}()"));
        let symbol = Symbol {
            id: id.clone(),
            name: name.to_string(),
            kind: SymbolKind::Method,
            declaring_type: Some(owner.clone()),
            ..owner_symbol
        };
        self.push_symbol(symbol);
        id
    }

    /// Record that `subtype` extends or implements `supertype`.
    pub fn extends(&mut self, subtype: &SymbolId, supertype: &SymbolId) {
        self.inheritance.push(Inheritance {
            subtype: subtype.clone(),
            supertype: supertype.clone(),
        });
    }

    /// Adjust a declared symbol (visibility, modifiers).
    pub fn symbol_mut(&mut self, id: &SymbolId) -> &mut Symbol {
        let position = self.positions[id];
        &mut self.symbols[position]
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    /// A call in `from` to `target`, written as the next occurrence of `text`.
    ///
    /// The invocation is bound through `target`'s declaring type. Calls to a
    /// constructor or a type become instance creations.
    pub fn call(&mut self, from: &SymbolId, target: &SymbolId, text: &str) -> TextRange {
        let target_symbol = self.symbol(target);
        let receiver = if target_symbol.is_type() {
            target.clone()
        } else {
            target_symbol
                .declaring_type
                .clone()
                .expect("call target should have a declaring type")
        };
        self.call_via(from, target, &receiver, text)
    }

    /// Like [`call`](Self::call), but bound through `receiver` (the static
    /// type the method is invoked on).
    pub fn call_via(
        &mut self,
        from: &SymbolId,
        target: &SymbolId,
        receiver: &SymbolId,
        text: &str,
    ) -> TextRange {
        let target_symbol = self.symbol(target).clone();
        let receiver_symbol = self.symbol(receiver).clone();
        let is_construction =
            target_symbol.is_type() || target_symbol.kind == SymbolKind::Constructor;
        let binding = MethodBinding {
            name: if is_construction {
                receiver_symbol.name.clone()
            } else {
                target_symbol.name.clone()
            },
            parameter_types: target_symbol.parameter_types.clone(),
            is_constructor: is_construction,
            declaring_type: DeclaringType {
                ty: type_ref(&receiver_symbol),
                is_anonymous: false,
                superclass: None,
                interfaces: Vec::new(),
            },
        };
        let kind = if is_construction {
            SyntaxKind::InstanceCreation
        } else {
            SyntaxKind::MethodInvocation
        };
        let access = if is_construction {
            ReferenceAccess::Construction
        } else {
            ReferenceAccess::Call
        };

        let (body, range) = self.locate(from, text);
        self.units[body.unit]
            .tree
            .push(body.node, SyntaxNode::new(kind, range).bound_to(binding));
        self.push_reference(from, target, body.unit, range, access);
        range
    }

    /// An invocation the binder could not resolve.
    pub fn unresolved_call(&mut self, from: &SymbolId, text: &str) -> TextRange {
        let (body, range) = self.locate(from, text);
        self.units[body.unit]
            .tree
            .push(body.node, SyntaxNode::new(SyntaxKind::MethodInvocation, range));
        range
    }

    /// A field access in `from`, known only to the reference index.
    pub fn access(
        &mut self,
        from: &SymbolId,
        field: &SymbolId,
        text: &str,
        access: ReferenceAccess,
    ) -> TextRange {
        let (body, range) = self.locate(from, text);
        self.push_reference(from, field, body.unit, range, access);
        range
    }

    /// The most recently added reference record.
    pub fn last_reference_mut(&mut self) -> &mut ReferenceRecord {
        self.references
            .last_mut()
            .expect("a reference should have been added")
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    pub fn snapshot(self) -> ProjectSnapshot {
        ProjectSnapshot {
            symbols: self.symbols,
            units: self
                .units
                .into_iter()
                .map(|unit| UnitSnapshot {
                    id: unit.id,
                    package: unit.package,
                    text: unit.text,
                    version: 1,
                    tree: Some(unit.tree),
                })
                .collect(),
            inheritance: self.inheritance,
            references: self.references,
        }
    }

    pub fn build(self) -> MemoryProject {
        MemoryProject::from_snapshot(self.snapshot()).expect("fixture project should be valid")
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn top_level(&mut self, uri: &str, fqn: &str, header: &str, kind: SymbolKind) -> SymbolId {
        let unit = self
            .units
            .iter()
            .position(|u| u.id.as_str() == uri)
            .unwrap_or_else(|| panic!("unit {uri} should be added first"));
        let root = Declared {
            unit,
            node: self.units[unit].tree.root(),
            range: span(0, self.units[unit].text.len()),
        };
        self.declare_type(root, fqn, header, kind, None, None)
    }

    fn declare_type(
        &mut self,
        outer: Declared,
        fqn: &str,
        header: &str,
        kind: SymbolKind,
        declaring_type: Option<SymbolId>,
        parent: Option<SymbolId>,
    ) -> SymbolId {
        let start = self.find(outer.unit, outer.range, header, outer.range.start as usize);
        let end = self.block_end(outer.unit, start);
        let simple = simple_name(fqn);
        let name_start = start + header.find(simple).expect("header should contain the type name");

        let id = SymbolId::new(fqn);
        let range = span(start, end);
        let name_range = span(name_start, name_start + simple.len());
        let mut symbol = self.make_symbol(outer.unit, &id, simple, kind, fqn);
        symbol.declaring_type = declaring_type;
        symbol.parent = parent;
        symbol.source_range = Some(range);
        symbol.name_range = Some(name_range);
        let node = SyntaxNode::new(SyntaxKind::TypeDeclaration, range)
            .declaring(id.clone(), Some(name_range));
        self.add(symbol, outer.unit, outer.node, node)
    }

    fn callable(&mut self, owner: &SymbolId, header: &str, kind: SymbolKind) -> SymbolId {
        let outer = self.declaration(owner);
        let start = self.find(outer.unit, outer.range, header, outer.range.start as usize);
        let end = if header.trim_end().ends_with(';') {
            start + header.len()
        } else {
            self.block_end(outer.unit, start)
        };

        let open = header.find('(').expect("signature should have `(`");
        let close = header.rfind(')').expect("signature should have `)`");
        let before = header[..open].trim_end();
        let name_offset = identifier_start(before);
        let name = &before[name_offset..];
        let parameter_types: Vec<String> = header[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| p.rsplit_once(' ').map_or(p, |(ty, _)| ty).trim().to_string())
            .collect();

        let member = if kind == SymbolKind::Constructor { "<init>" } else { name };
        let id = SymbolId::new(format!("{owner}#{member}({})", parameter_types.join(",")));
        let range = span(start, end);
        let name_range = span(start + name_offset, start + before.len());
        let type_name = self.symbol(owner).type_name.clone();
        let mut symbol = self.make_symbol(outer.unit, &id, name, kind, &type_name);
        symbol.declaring_type = Some(owner.clone());
        symbol.parameter_types = parameter_types;
        symbol.source_range = Some(range);
        symbol.name_range = Some(name_range);

        let syntax = if kind == SymbolKind::Constructor {
            SyntaxKind::ConstructorDeclaration
        } else {
            SyntaxKind::MethodDeclaration
        };
        let node = SyntaxNode::new(syntax, range).declaring(id.clone(), Some(name_range));
        self.add(symbol, outer.unit, outer.node, node)
    }

    fn make_symbol(
        &self,
        unit: usize,
        id: &SymbolId,
        name: &str,
        kind: SymbolKind,
        type_name: &str,
    ) -> Symbol {
        Symbol {
            id: id.clone(),
            name: name.to_string(),
            kind,
            type_name: type_name.to_string(),
            declaring_type: None,
            parent: None,
            visibility: Visibility::Public,
            is_static: false,
            is_anonymous: false,
            deprecated: false,
            parameter_types: Vec::new(),
            container: Container {
                unit: self.units[unit].id.clone(),
                package: self.units[unit].package.clone(),
                binary: false,
            },
            source_range: None,
            name_range: None,
        }
    }

    fn add(
        &mut self,
        symbol: Symbol,
        unit: usize,
        parent: SyntaxNodeId,
        node: SyntaxNode,
    ) -> SymbolId {
        let id = symbol.id.clone();
        let range = node.range;
        let node = self.units[unit].tree.push(parent, node);
        self.declared.insert(id.clone(), Declared { unit, node, range });
        self.push_symbol(symbol);
        id
    }

    fn push_symbol(&mut self, symbol: Symbol) {
        assert!(
            !self.positions.contains_key(&symbol.id),
            "symbol {} declared twice",
            symbol.id
        );
        self.positions.insert(symbol.id.clone(), self.symbols.len());
        self.symbols.push(symbol);
    }

    fn push_reference(
        &mut self,
        from: &SymbolId,
        target: &SymbolId,
        unit: usize,
        range: TextRange,
        access: ReferenceAccess,
    ) {
        self.references.push(ReferenceRecord {
            target: target.clone(),
            enclosing: Some(from.clone()),
            unit: self.units[unit].id.clone(),
            range,
            access,
            accuracy: calltree::MatchAccuracy::Accurate,
            inside_comment: false,
        });
    }

    fn symbol(&self, id: &SymbolId) -> &Symbol {
        let position = self
            .positions
            .get(id)
            .unwrap_or_else(|| panic!("symbol {id} should be declared first"));
        &self.symbols[*position]
    }

    fn declaration(&self, id: &SymbolId) -> Declared {
        *self
            .declared
            .get(id)
            .unwrap_or_else(|| panic!("symbol {id} has no source declaration"))
    }

    /// Next occurrence of `text` inside `from`, after any earlier occurrence
    /// already handed out.
    fn locate(&mut self, from: &SymbolId, text: &str) -> (Declared, TextRange) {
        let body = self.declaration(from);
        let key = (from.clone(), text.to_string());
        let search_from = self
            .cursors
            .get(&key)
            .copied()
            .unwrap_or(body.range.start as usize);
        let start = self.find(body.unit, body.range, text, search_from);
        self.cursors.insert(key, start + text.len());
        (body, span(start, start + text.len()))
    }

    fn find(&self, unit: usize, within: TextRange, needle: &str, from: usize) -> usize {
        let text = &self.units[unit].text[..within.end() as usize];
        text[from..]
            .find(needle)
            .map(|offset| from + offset)
            .unwrap_or_else(|| panic!("`{needle}` not found in {}", self.units[unit].id))
    }

    /// Offset just past the `}` matching the first `{` at or after `start`.
    fn block_end(&self, unit: usize, start: usize) -> usize {
        let text = &self.units[unit].text;
        let open = start + text[start..].find('{').expect("declaration should have a body");
        let mut depth = 0usize;
        for (offset, byte) in text.bytes().enumerate().skip(open) {
            match byte {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return offset + 1;
                    }
                }
                _ => {}
            }
        }
        panic!("unbalanced braces in {}", self.units[unit].id)
    }
}

fn type_ref(symbol: &Symbol) -> TypeRef {
    TypeRef {
        qualified_name: symbol.type_name.clone(),
        symbol: Some(symbol.id.clone()),
        is_interface: symbol.kind == SymbolKind::Interface,
    }
}

fn simple_name(fqn: &str) -> &str {
    fqn.rsplit(['.', '$']).next().unwrap_or(fqn)
}

fn identifier_start(text: &str) -> usize {
    text.rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map_or(0, |index| index + 1)
}

fn span(start: usize, end: usize) -> TextRange {
    let start = u32::try_from(start).expect("offset fits in u32");
    let end = u32::try_from(end).expect("offset fits in u32");
    TextRange::from_bounds(start, end).expect("range should not be reversed")
}

// ============================================================================
// Session helpers
// ============================================================================

pub fn session(project: &MemoryProject) -> HierarchySession<'_> {
    session_with(project, HierarchyConfig::default())
}

/// Route engine logs to the test output. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn session_with(project: &MemoryProject, config: HierarchyConfig) -> HierarchySession<'_> {
    init_tracing();
    HierarchySession::new(Backend::from_project(project), config)
        .expect("session config should be valid")
}

/// The single root built for `symbol`.
pub fn root(session: &mut HierarchySession<'_>, symbol: &SymbolId, direction: Direction) -> NodeId {
    let roots = session
        .build_roots(std::slice::from_ref(symbol), direction)
        .expect("root symbol should exist");
    assert_eq!(roots.len(), 1, "expected exactly one root for {symbol}");
    roots[0]
}

/// Children of `node`, expanding with a token that never fires.
pub fn expand(session: &mut HierarchySession<'_>, node: NodeId) -> Vec<NodeId> {
    session
        .children_of(node, &CancellationToken::new())
        .expect("expansion should succeed")
}

/// The child of `node` standing for `symbol`.
pub fn child(session: &mut HierarchySession<'_>, node: NodeId, symbol: &SymbolId) -> NodeId {
    let children = expand(session, node);
    children
        .into_iter()
        .find(|&c| session.node(c).is_some_and(|n| n.symbol_id() == symbol))
        .unwrap_or_else(|| panic!("{symbol} should be a child of {node}"))
}

pub fn symbols(session: &HierarchySession<'_>, nodes: &[NodeId]) -> Vec<SymbolId> {
    nodes
        .iter()
        .map(|&n| session.node(n).expect("node should exist").symbol_id().clone())
        .collect()
}
