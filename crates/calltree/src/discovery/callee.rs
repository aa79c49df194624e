//! Callee discovery: a bounded walk over one declaration's syntax subtree.

use tracing::{debug, trace};

use crate::error::Result;
use crate::source::{BufferSnapshot, TextRange};
use crate::syntax::{MethodBinding, SyntaxKind, SyntaxNode, SyntaxNodeId, SyntaxTree, TypeRef};
use crate::types::{CallEdgeMap, CallSite, Symbol, SymbolKind};

use super::DiscoveryContext;

/// Universal base class; anonymous classes extending it resolve through
/// their interface instead.
const OBJECT_TYPE: &str = "java.lang.Object";

/// Everything `symbol` invokes, one edge per resolved target.
///
/// Only nodes inside the declaration's own span are examined. Nested type
/// declarations contribute their constructors and are not entered; anonymous
/// class bodies are opaque.
///
/// # Errors
///
/// Returns [`Error::Cancelled`](crate::Error::Cancelled) if the token fires
/// mid-walk, or a backend error if the tree or type hierarchy cannot be read.
pub fn discover_callees(ctx: &DiscoveryContext<'_>, symbol: &Symbol) -> Result<CallEdgeMap> {
    let mut edges = CallEdgeMap::new();
    let Some(bound) = symbol.source_range else {
        trace!(symbol = %symbol.id, "No source range, no callees");
        return Ok(edges);
    };
    let model = ctx.backend.model;
    let Some(tree) = model.syntax_tree(symbol.unit())? else {
        debug!(symbol = %symbol.id, unit = %symbol.unit(), "No syntax tree, no callees");
        return Ok(edges);
    };
    let buffer = model
        .buffer(tree.unit())
        .filter(|b| b.version() == tree.version());

    let walk = CalleeWalk {
        ctx,
        symbol,
        tree: &tree,
        buffer: buffer.as_ref(),
    };

    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        ctx.check_cancelled()?;
        let Some(node) = tree.node(id) else {
            continue;
        };
        if !admits(bound, node.range) {
            continue;
        }
        let within = bound.contains_range(node.range);
        let descend = match node.kind {
            kind if kind.is_invocation() && within => {
                walk.record_invocation(&mut edges, id, node)?;
                true
            }
            // Includes the declaration of a type root itself.
            SyntaxKind::TypeDeclaration if within => {
                walk.record_nested_constructors(&mut edges, node);
                false
            }
            SyntaxKind::AnonymousClassBody => node.range.strictly_encloses(bound),
            _ => true,
        };
        if descend {
            stack.extend(node.children.iter().rev().copied());
        }
    }

    debug!(
        symbol = %symbol.id,
        edges = edges.len(),
        sites = edges.site_count(),
        "Discovered callees"
    );
    Ok(edges)
}

/// A node takes part in the walk if it lies inside the bound or encloses it.
fn admits(bound: TextRange, node: TextRange) -> bool {
    bound.contains_range(node) || node.contains_range(bound)
}

struct CalleeWalk<'w, 'a> {
    ctx: &'w DiscoveryContext<'a>,
    symbol: &'w Symbol,
    tree: &'w SyntaxTree,
    buffer: Option<&'w BufferSnapshot>,
}

impl CalleeWalk<'_, '_> {
    fn record_invocation(
        &self,
        edges: &mut CallEdgeMap,
        id: SyntaxNodeId,
        node: &SyntaxNode,
    ) -> Result<()> {
        let Some(binding) = self.ctx.backend.model.resolve_reference(self.tree, id) else {
            trace!(symbol = %self.symbol.id, offset = node.range.start, "Unresolved invocation skipped");
            return Ok(());
        };
        let Some(target) = self.resolve_target(&binding)? else {
            trace!(symbol = %self.symbol.id, name = %binding.name, "No declaration for invocation");
            return Ok(());
        };
        if self.ctx.is_ignored(&target) {
            trace!(target = %target.id, "Ignored callee");
            return Ok(());
        }
        self.record(edges, &target, node.range);
        Ok(())
    }

    /// A nested type declared inside the bound is reported as calls to each of
    /// its constructors.
    fn record_nested_constructors(&self, edges: &mut CallEdgeMap, node: &SyntaxNode) {
        let model = self.ctx.backend.model;
        for child in node.children.iter().filter_map(|&c| self.tree.node(c)) {
            if child.kind != SyntaxKind::ConstructorDeclaration {
                continue;
            }
            let Some(constructor) = child.declares.as_ref().and_then(|id| model.symbol(id)) else {
                continue;
            };
            if self.ctx.is_ignored(&constructor) {
                continue;
            }
            let range = child.name_range.unwrap_or(child.range);
            self.record(edges, &constructor, range);
        }
    }

    fn record(&self, edges: &mut CallEdgeMap, target: &Symbol, range: TextRange) {
        let line = self.tree.line_of(range.start);
        let mut site = CallSite::new(
            self.symbol.id.clone(),
            Some(target.id.clone()),
            self.tree.unit().clone(),
            range,
            self.tree.version(),
        );
        if let Some(snippet) = self.buffer.and_then(|b| b.line_text(range.start)) {
            site = site.with_line(line, snippet);
        }
        trace!(
            symbol = %self.symbol.id,
            target = %target.id,
            line,
            "Recorded callee site"
        );
        edges.add(target, site);
    }

    /// Map a binding to the declaration a hierarchy node should show.
    fn resolve_target(&self, binding: &MethodBinding) -> Result<Option<Symbol>> {
        let model = self.ctx.backend.model;
        let Some(type_ref) = target_type(binding) else {
            return Ok(None);
        };
        let Some(type_id) = type_ref.symbol.as_ref() else {
            return Ok(None);
        };

        let signature = binding.signature();
        let mut found = model.find_method(type_id, &signature);
        if found.is_none() && !binding.is_constructor {
            for supertype in self.ctx.implementors().supertypes(type_id)? {
                found = model.find_method(&supertype, &signature);
                if found.is_some() {
                    break;
                }
            }
        }

        let Some(id) = found else {
            // Implicit default constructor: attribute the call to the type.
            if binding.is_constructor && binding.parameter_types.is_empty() {
                return Ok(model.symbol(type_id));
            }
            return Ok(None);
        };
        let Some(mut target) = model.symbol(&id) else {
            return Ok(None);
        };

        if self.ctx.use_implementors && target.kind == SymbolKind::Method {
            let implementations = self.ctx.implementors().implementing_methods(&target)?;
            if let [sole] = implementations.as_slice()
                && let Some(implementation) = model.symbol(sole)
            {
                trace!(interface = %target.id, implementation = %implementation.id, "Narrowed to sole implementor");
                target = implementation;
            }
        }
        if !self.ctx.scope.encloses(&target) {
            trace!(target = %target.id, "Callee outside search scope");
            return Ok(None);
        }
        Ok(Some(target))
    }
}

/// The type whose member a binding refers to.
///
/// Anonymous class instantiations resolve to the superclass constructor,
/// or to the first interface when the superclass is `Object`.
fn target_type(binding: &MethodBinding) -> Option<&TypeRef> {
    let declaring = &binding.declaring_type;
    if !(declaring.is_anonymous && binding.is_constructor) {
        return Some(&declaring.ty);
    }
    match declaring.superclass.as_ref() {
        Some(superclass) if superclass.qualified_name != OBJECT_TYPE => Some(superclass),
        superclass => declaring.interfaces.first().or(superclass),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::DeclaringType;
    use rstest::rstest;

    fn type_ref(name: &str) -> TypeRef {
        TypeRef {
            qualified_name: name.to_string(),
            symbol: Some(crate::types::SymbolId::new(name)),
            is_interface: false,
        }
    }

    fn anonymous_constructor(superclass: &str, interfaces: &[&str]) -> MethodBinding {
        MethodBinding {
            name: String::new(),
            parameter_types: Vec::new(),
            is_constructor: true,
            declaring_type: DeclaringType {
                ty: type_ref("com.example.Outer$1"),
                is_anonymous: true,
                superclass: Some(type_ref(superclass)),
                interfaces: interfaces.iter().map(|name| type_ref(name)).collect(),
            },
        }
    }

    #[rstest]
    #[case::inside(TextRange::new(10, 50), TextRange::new(20, 5), true)]
    #[case::same_span(TextRange::new(10, 50), TextRange::new(10, 50), true)]
    #[case::enclosing(TextRange::new(10, 50), TextRange::new(0, 100), true)]
    #[case::before(TextRange::new(10, 50), TextRange::new(0, 5), false)]
    #[case::straddling_start(TextRange::new(10, 50), TextRange::new(5, 10), false)]
    fn admission(#[case] bound: TextRange, #[case] node: TextRange, #[case] expected: bool) {
        assert_eq!(admits(bound, node), expected);
    }

    #[test]
    fn anonymous_subclass_resolves_to_superclass() {
        let binding = anonymous_constructor("com.example.Base", &["java.lang.Runnable"]);
        let ty = target_type(&binding).expect("target type");
        assert_eq!(ty.qualified_name, "com.example.Base");
    }

    #[test]
    fn anonymous_object_subclass_resolves_to_interface() {
        let binding = anonymous_constructor(OBJECT_TYPE, &["com.example.Listener"]);
        let ty = target_type(&binding).expect("target type");
        assert_eq!(ty.qualified_name, "com.example.Listener");
    }

    #[test]
    fn anonymous_object_without_interface_falls_back_to_object() {
        let binding = anonymous_constructor(OBJECT_TYPE, &[]);
        let ty = target_type(&binding).expect("target type");
        assert_eq!(ty.qualified_name, OBJECT_TYPE);
    }
}
