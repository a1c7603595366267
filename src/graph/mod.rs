//! Type Graph
//!
//! Arena holding every node produced while transforming a schema document
//! (and the documents it references). Nodes address each other through
//! [`TypeRef`] edges; edges created for `$ref`s that could not be looked up
//! yet point at a pending [`LazyRef`] until [`TypeGraph::resolve_refs`]
//! rewrites them in place.
//!
//! This module is shared between:
//! - The transformer (builds the graph)
//! - Consumers (summary export, recursion analysis, code generation)

pub mod analysis;
pub mod issues;
pub mod node;
pub mod resolve;
pub mod scope;

// Re-export key types from submodules
pub use analysis::{
    analyze_recursion, labeled_edges, EdgeKind, IndirectEdge, RecursionAnalysis, RecursionGroup,
};
pub use issues::{Issue, IssueKind};
pub use node::{
    BasicKind, EnumConstant, EnumType, LazyId, ListType, Member, RefTarget, ResolveState,
    StructureType, TypeId, TypeKind, TypeNode, TypeRef, UnionType,
};
pub use resolve::{LazyRef, LazyState};
pub use scope::{Scope, ScopeId};

use std::collections::HashSet;

use crate::attributes::TypeAttributes;
use crate::loader::DocumentId;
use crate::naming::disambiguate;

// =============================================================================
// Type Graph
// =============================================================================

/// Arena of type nodes, pending references and transformer scopes
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    nodes: Vec<TypeNode>,
    pub(crate) lazies: Vec<LazyRef>,
    scopes: Vec<Scope>,
    /// Current top-level call; ids never resolve across calls
    call: usize,
    root: Option<TypeRef>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root type of the top-level document, once a transform has finished
    pub fn root(&self) -> Option<&TypeRef> {
        self.root.as_ref()
    }

    pub fn root_id(&self) -> Option<TypeId> {
        self.root.as_ref().and_then(TypeRef::id)
    }

    pub(crate) fn set_root(&mut self, root: TypeRef) {
        self.root = Some(root);
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    pub fn add_node(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: TypeId) -> &mut TypeNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (TypeId(i), n))
    }

    /// New errant node. Errant nodes are never attached to a parent; their
    /// issues stay with them until copied onto an owner.
    pub fn add_errant(&mut self, name: &str, document: Option<DocumentId>) -> TypeId {
        self.add_node(
            TypeNode::new(name, "", None, TypeAttributes::default(), TypeKind::Errant)
                .with_document(document),
        )
    }

    /// Attributes in effect at an edge: the target's own with the edge's
    /// overrides layered on top
    pub fn effective_attributes(&self, ty: &TypeRef) -> TypeAttributes {
        match ty.target {
            RefTarget::Resolved(id) => self.node(id).attributes.override_with(&ty.attributes),
            RefTarget::Unresolved(_) => ty.attributes.clone(),
        }
    }

    /// Display name of an edge's target. A pending reference is named after
    /// the last segment of its fragment, or its document.
    pub fn type_name(&self, ty: &TypeRef) -> String {
        match ty.target {
            RefTarget::Resolved(id) => self.node(id).name.clone(),
            RefTarget::Unresolved(lazy) => self.lazy(lazy).display_name(self),
        }
    }

    pub fn is_errant(&self, ty: &TypeRef) -> bool {
        ty.id().map(|id| self.node(id).is_errant()).unwrap_or(false)
    }

    /// Structural equality: scalars compare by kind, formats by tag; other
    /// nodes by identity. Effective attributes must match as well.
    pub fn same_type(&self, a: &TypeRef, b: &TypeRef) -> bool {
        let same_shape = match (a.target, b.target) {
            (x, y) if x == y => true,
            (RefTarget::Resolved(x), RefTarget::Resolved(y)) => {
                match (&self.node(x).kind, &self.node(y).kind) {
                    (TypeKind::Basic(k1), TypeKind::Basic(k2)) => k1 == k2,
                    (TypeKind::Format(f1), TypeKind::Format(f2)) => f1 == f2,
                    _ => false,
                }
            }
            _ => false,
        };
        same_shape && self.effective_attributes(a) == self.effective_attributes(b)
    }

    // -------------------------------------------------------------------------
    // Parents, children and issues
    // -------------------------------------------------------------------------

    /// The node with no parent above `id`
    pub fn root_of(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            current = parent;
        }
        current
    }

    /// Append an issue; it lands on the root of the node's tree
    pub fn add_issue(&mut self, id: TypeId, issue: Issue) {
        let root = self.root_of(id);
        self.node_mut(root).issues.push(issue);
    }

    /// Issues visible from `id` (those held by its root)
    pub fn issues(&self, id: TypeId) -> &[Issue] {
        &self.node(self.root_of(id)).issues
    }

    /// Report against a node, or against a scope's root when no node owns
    /// the problem. Before the scope has a root the issue is buffered.
    pub fn report(&mut self, scope: ScopeId, reporter: Option<TypeId>, issue: Issue) {
        if let Some(id) = reporter {
            self.add_issue(id, issue);
            return;
        }
        match self.scope(scope).root.as_ref().and_then(TypeRef::id) {
            Some(root) => self.add_issue(root, issue),
            None => self.scope_mut(scope).pending.push(issue),
        }
    }

    /// Give a parentless node its parent, moving issues buffered on it to
    /// the parent's root
    pub fn attach(&mut self, child: TypeId, parent: TypeId) {
        if self.node(child).parent.is_some() || self.root_of(parent) == child {
            return;
        }
        self.node_mut(child).parent = Some(parent);
        let buffered = std::mem::take(&mut self.node_mut(child).issues);
        let root = self.root_of(parent);
        self.node_mut(root).issues.extend(buffered);
    }

    /// Register `child` as a nested type of `parent`
    pub fn add_child(&mut self, parent: TypeId, name: &str, child: TypeId) {
        if parent == child {
            return;
        }
        self.attach(child, parent);
        let children = &self.node(parent).children;
        if children.get(name) == Some(&child) {
            return;
        }
        let label = disambiguate(name, |n| children.contains_key(n));
        self.node_mut(parent).children.insert(label, child);
    }

    /// Every issue in the graph: the top-level root's first, then those of
    /// other document roots
    pub fn all_issues(&self) -> Vec<&Issue> {
        let mut roots: Vec<TypeId> = Vec::new();
        if let Some(root) = self.root_id() {
            roots.push(self.root_of(root));
        }
        for scope in &self.scopes {
            if let Some(id) = scope.root.as_ref().and_then(TypeRef::id) {
                let root = self.root_of(id);
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        roots
            .into_iter()
            .flat_map(|root| self.node(root).issues.iter())
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.all_issues().iter().any(|i| i.kind.is_error())
    }

    // -------------------------------------------------------------------------
    // Scopes and pending references
    // -------------------------------------------------------------------------

    pub fn add_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            call: self.call,
            ..scope
        });
        id
    }

    /// Start a new top-level call. Scopes added from now on do not see ids
    /// declared in earlier calls.
    pub fn begin_call(&mut self) {
        self.call += 1;
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes.iter().enumerate().map(|(i, s)| (ScopeId(i), s))
    }

    /// Set the root of a scope, handing it any issues raised before it
    /// existed
    pub fn set_scope_root(&mut self, scope: ScopeId, root: TypeRef) {
        let pending = std::mem::take(&mut self.scope_mut(scope).pending);
        if let Some(id) = root.id() {
            for issue in pending {
                self.add_issue(id, issue);
            }
        }
        self.scope_mut(scope).root = Some(root);
    }

    /// Look up a declared id: the given scope first, then every other scope
    /// opened in the same top-level call
    pub fn lookup_id(&self, scope: ScopeId, id: &str) -> Option<TypeRef> {
        let current = self.scope(scope);
        if let Some(found) = current.lookup_id(id) {
            return Some(found.clone());
        }
        self.scopes
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != scope.0 && s.call == current.call)
            .find_map(|(_, s)| s.lookup_id(id).cloned())
    }

    pub fn add_lazy(&mut self, lazy: LazyRef) -> LazyId {
        let id = LazyId(self.lazies.len());
        self.lazies.push(lazy);
        id
    }

    pub fn lazy(&self, id: LazyId) -> &LazyRef {
        &self.lazies[id.0]
    }

    // -------------------------------------------------------------------------
    // Reachability
    // -------------------------------------------------------------------------

    /// Nodes reachable from `start` through resolved edges and nested
    /// children, in discovery order
    pub fn reachable(&self, start: TypeId) -> Vec<TypeId> {
        let mut seen: HashSet<TypeId> = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            let node = self.node(id);
            let mut next: Vec<TypeId> = node
                .edges()
                .into_iter()
                .filter_map(TypeRef::id)
                .chain(node.children.values().copied())
                .collect();
            next.reverse();
            stack.extend(next.into_iter().filter(|n| !seen.contains(n)));
        }
        order
    }

    /// Whether any pending reference is still reachable from `start`
    pub fn contains_lazy(&self, start: TypeId) -> bool {
        self.reachable(start)
            .into_iter()
            .any(|id| self.node(id).edges().iter().any(|e| e.is_lazy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Token;

    fn structure(graph: &mut TypeGraph, name: &str, parent: Option<TypeId>) -> TypeId {
        graph.add_node(TypeNode::new(
            name,
            name,
            parent,
            TypeAttributes::default(),
            TypeKind::Structure(StructureType::default()),
        ))
    }

    fn basic(graph: &mut TypeGraph, kind: BasicKind, nullable: Option<bool>) -> TypeId {
        graph.add_node(TypeNode::new(
            kind.as_str(),
            "",
            None,
            TypeAttributes::nullable(nullable),
            TypeKind::Basic(kind),
        ))
    }

    #[test]
    fn test_issues_delegate_to_root() {
        let mut graph = TypeGraph::new();
        let root = structure(&mut graph, "Root", None);
        let child = structure(&mut graph, "child", Some(root));
        let grandchild = structure(&mut graph, "grandchild", Some(child));

        graph.add_issue(grandchild, Issue::error(Some(Token::new(3, 4)), "bad"));
        assert_eq!(graph.node(root).issues.len(), 1);
        assert!(graph.node(grandchild).issues.is_empty());
        assert_eq!(graph.issues(child).len(), 1);
    }

    #[test]
    fn test_buffered_issues_move_on_attach() {
        let mut graph = TypeGraph::new();
        let root = structure(&mut graph, "Root", None);
        let loose = structure(&mut graph, "loose", None);
        graph.add_issue(loose, Issue::warning(None, "early"));
        assert!(graph.issues(root).is_empty());

        graph.add_child(root, "loose", loose);
        assert_eq!(graph.issues(root).len(), 1);
        assert!(graph.node(loose).issues.is_empty());
        assert_eq!(graph.node(root).children.get("loose"), Some(&loose));
    }

    #[test]
    fn test_attach_refuses_cycles() {
        let mut graph = TypeGraph::new();
        let root = structure(&mut graph, "Root", None);
        let child = structure(&mut graph, "child", Some(root));
        graph.attach(root, child);
        assert_eq!(graph.node(root).parent, None);
    }

    #[test]
    fn test_same_type() {
        let mut graph = TypeGraph::new();
        let s1 = basic(&mut graph, BasicKind::String, None);
        let s2 = basic(&mut graph, BasicKind::String, None);
        let s3 = basic(&mut graph, BasicKind::String, Some(true));
        let i1 = basic(&mut graph, BasicKind::Integer, None);
        let o1 = structure(&mut graph, "A", None);
        let o2 = structure(&mut graph, "A", None);

        assert!(graph.same_type(&TypeRef::node(s1), &TypeRef::node(s2)));
        assert!(!graph.same_type(&TypeRef::node(s1), &TypeRef::node(s3)));
        assert!(!graph.same_type(&TypeRef::node(s1), &TypeRef::node(i1)));
        assert!(graph.same_type(&TypeRef::node(o1), &TypeRef::node(o1)));
        assert!(!graph.same_type(&TypeRef::node(o1), &TypeRef::node(o2)));

        let nullable = TypeRef::node(s1).with_attributes(&TypeAttributes::nullable(Some(true)));
        assert!(graph.same_type(&nullable, &TypeRef::node(s3)));
    }

    #[test]
    fn test_reachable_follows_edges_and_children() {
        let mut graph = TypeGraph::new();
        let root = structure(&mut graph, "Root", None);
        let member = basic(&mut graph, BasicKind::String, None);
        let nested = structure(&mut graph, "nested", Some(root));
        let _unreachable = basic(&mut graph, BasicKind::Boolean, None);

        if let TypeKind::Structure(s) = &mut graph.node_mut(root).kind {
            s.add_member("name", TypeRef::node(member), None);
        }
        graph.add_child(root, "nested", nested);

        let reached = graph.reachable(root);
        assert_eq!(reached, vec![root, member, nested]);
        assert!(!graph.contains_lazy(root));
    }

    #[test]
    fn test_ids_are_scoped_to_one_call() {
        let mut graph = TypeGraph::new();
        let first = graph.add_scope(Scope::new(None));
        let sibling = graph.add_scope(Scope::new(None));
        let thing = structure(&mut graph, "Thing", None);
        graph.scope_mut(first).register_id("#thing", TypeRef::node(thing)).unwrap();
        assert_eq!(graph.lookup_id(sibling, "thing").and_then(|r| r.id()), Some(thing));

        graph.begin_call();
        let later = graph.add_scope(Scope::new(None));
        assert!(graph.lookup_id(later, "thing").is_none());
        assert!(graph.lookup_id(first, "thing").is_some());
    }

    #[test]
    fn test_report_buffers_until_scope_root() {
        let mut graph = TypeGraph::new();
        let scope = graph.add_scope(Scope::new(None));
        graph.report(scope, None, Issue::error(None, "before root"));
        assert_eq!(graph.scope(scope).pending.len(), 1);

        let root = structure(&mut graph, "Root", None);
        graph.set_scope_root(scope, TypeRef::node(root));
        graph.report(scope, None, Issue::error(None, "after root"));
        assert_eq!(graph.issues(root).len(), 2);
        assert!(graph.scope(scope).pending.is_empty());
    }
}
