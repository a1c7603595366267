//! Reference Resolution
//!
//! A local `$ref` fragment may name a type that has not been built yet, so
//! the builder records a [`LazyRef`] instead of looking it up. Forcing a lazy
//! reference looks the fragment up in the scope it was written in, chasing
//! references that resolve to further pending references.
//! [`TypeGraph::resolve_refs`] forces every pending edge reachable from a
//! node and rewrites it in place.

use tracing::{debug, warn};

use super::issues::Issue;
use super::node::{LazyId, RefTarget, ResolveState, TypeId, TypeRef};
use super::scope::ScopeId;
use super::TypeGraph;
use crate::naming::make_identifier;
use crate::value::Token;

const JSCH_DEFS: &str = "$defs";
const JSCH_DEFINITIONS: &str = "definitions";

// =============================================================================
// Lazy Reference
// =============================================================================

/// Forcing progress of a lazy reference
#[derive(Debug, Clone, PartialEq)]
pub enum LazyState {
    Pending,
    Forcing,
    Forced(TypeRef),
}

/// A `$ref` fragment waiting to be looked up
#[derive(Debug, Clone)]
pub struct LazyRef {
    pub(crate) scope: ScopeId,
    pub(crate) fragment: String,
    /// Node that receives an issue if the lookup fails
    pub(crate) reporter: Option<TypeId>,
    pub(crate) token: Option<Token>,
    pub(crate) state: LazyState,
}

impl LazyRef {
    pub fn new(
        scope: ScopeId,
        fragment: impl Into<String>,
        reporter: Option<TypeId>,
        token: Option<Token>,
    ) -> Self {
        Self {
            scope,
            fragment: fragment.into(),
            reporter,
            token,
            state: LazyState::Pending,
        }
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn state(&self) -> &LazyState {
        &self.state
    }

    /// Last fragment segment, else the stem of the scope's document
    pub fn display_name(&self, graph: &TypeGraph) -> String {
        match self.fragment.rsplit('/').find(|s| !s.is_empty() && *s != "#") {
            Some(segment) => segment.to_string(),
            None => graph
                .scope(self.scope)
                .document()
                .map(|d| d.stem().to_string())
                .unwrap_or_else(|| "Root".to_string()),
        }
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl TypeGraph {
    /// Dotted registry path for a fragment: `/definitions/A` ->
    /// `definitions.A`. A leading segment naming a declared id is replaced by
    /// that node's qualified name.
    pub fn make_local_ref(&self, scope: ScopeId, fragment: &str) -> String {
        let trimmed = fragment.trim_start_matches('#').trim_start_matches('/');
        let mut segments: Vec<String> = Vec::new();
        for (i, raw) in trimmed.split('/').filter(|s| !s.is_empty()).enumerate() {
            let segment = raw.replace("~1", "/").replace("~0", "~");
            if i == 0 {
                let spliced = self
                    .lookup_id(scope, &segment)
                    .and_then(|r| r.id())
                    .map(|id| self.node(id).qualified_name.clone());
                if let Some(prefix) = spliced {
                    if !prefix.is_empty() {
                        segments.push(prefix);
                    }
                    continue;
                }
            }
            if segment == JSCH_DEFS {
                segments.push(JSCH_DEFINITIONS.to_string());
            } else {
                segments.push(make_identifier(&segment));
            }
        }
        segments.join(".")
    }

    /// Look a fragment up by declared id, then by qualified name
    pub fn find_local_ref(&self, scope: ScopeId, fragment: &str) -> Option<TypeRef> {
        if let Some(found) = self.lookup_id(scope, fragment) {
            return Some(found);
        }
        let path = self.make_local_ref(scope, fragment);
        let scope = self.scope(scope);
        if path.is_empty() {
            scope.root().cloned()
        } else {
            scope.lookup_path(&path).cloned()
        }
    }

    // =========================================================================
    // Forcing
    // =========================================================================

    /// Resolve a lazy reference to a node. Unresolvable fragments and lazy
    /// chains that loop back on themselves become errant nodes, with an
    /// issue on the reporter.
    pub fn force(&mut self, lazy: LazyId) -> TypeRef {
        match &self.lazies[lazy.0].state {
            LazyState::Forced(resolved) => return resolved.clone(),
            LazyState::Forcing => {
                let message = format!("Circular reference: {}", self.lazies[lazy.0].fragment);
                return self.fail_lazy(lazy, message);
            }
            LazyState::Pending => {}
        }

        self.lazies[lazy.0].state = LazyState::Forcing;
        let (scope, fragment) = {
            let l = &self.lazies[lazy.0];
            (l.scope, l.fragment.clone())
        };
        debug!(fragment = %fragment, "Forcing lazy reference");

        let resolved = match self.find_local_ref(scope, &fragment) {
            Some(found) => match found.target {
                RefTarget::Resolved(_) => found,
                RefTarget::Unresolved(inner) => {
                    let forced = self.force(inner);
                    forced.with_attributes(&found.attributes)
                }
            },
            None => self.fail_lazy(lazy, format!("Invalid URI fragment: {}", fragment)),
        };

        if self.lazies[lazy.0].state == LazyState::Forcing {
            self.lazies[lazy.0].state = LazyState::Forced(resolved.clone());
        }
        resolved
    }

    fn fail_lazy(&mut self, lazy: LazyId, message: String) -> TypeRef {
        let (scope, reporter, token, fragment) = {
            let l = &self.lazies[lazy.0];
            (l.scope, l.reporter, l.token, l.fragment.clone())
        };
        warn!(fragment = %fragment, "{}", message);
        self.report(scope, reporter, Issue::error(token, message));
        let document = self.scope(scope).document().cloned();
        let errant = TypeRef::node(self.add_errant(&fragment, document));
        self.lazies[lazy.0].state = LazyState::Forced(errant.clone());
        errant
    }

    // =========================================================================
    // resolve_refs
    // =========================================================================

    /// Force every pending edge reachable from `id`. Idempotent; a node
    /// already being resolved is skipped, which breaks cycles.
    pub fn resolve_refs(&mut self, id: TypeId) {
        if self.node(id).resolve_state != ResolveState::Unresolved {
            return;
        }
        self.node_mut(id).resolve_state = ResolveState::Resolving;

        let pending: Vec<(usize, LazyId)> = self
            .node(id)
            .edges()
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| edge.lazy_id().map(|lazy| (i, lazy)))
            .collect();

        for (index, lazy) in pending {
            let forced = self.force(lazy);
            if let Some(edge) = self.node_mut(id).edges_mut().into_iter().nth(index) {
                *edge = forced.with_attributes(&edge.attributes);
            }
        }

        let next: Vec<TypeId> = {
            let node = self.node(id);
            node.edges()
                .into_iter()
                .filter_map(TypeRef::id)
                .chain(node.children.values().copied())
                .collect()
        };
        for target in next {
            self.resolve_refs(target);
        }

        self.node_mut(id).resolve_state = ResolveState::Resolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::TypeAttributes;
    use crate::graph::node::{BasicKind, StructureType, TypeKind, TypeNode};
    use crate::graph::scope::Scope;
    use crate::loader::DocumentId;

    fn graph_with_scope() -> (TypeGraph, ScopeId, TypeId) {
        let mut graph = TypeGraph::new();
        let scope = graph.add_scope(Scope::new(Some(DocumentId::new("main.json"))));
        let root = graph.add_node(TypeNode::new(
            "Root",
            "",
            None,
            TypeAttributes::default(),
            TypeKind::Structure(StructureType::default()),
        ));
        graph.set_scope_root(scope, TypeRef::node(root));
        (graph, scope, root)
    }

    fn add_member(graph: &mut TypeGraph, owner: TypeId, name: &str, ty: TypeRef) {
        if let TypeKind::Structure(s) = &mut graph.node_mut(owner).kind {
            s.add_member(name, ty, None);
        }
    }

    #[test]
    fn test_make_local_ref() {
        let (mut graph, scope, _) = graph_with_scope();
        assert_eq!(graph.make_local_ref(scope, "/definitions/A"), "definitions.A");
        assert_eq!(graph.make_local_ref(scope, "#/$defs/date-time"), "definitions.date_time");
        assert_eq!(graph.make_local_ref(scope, ""), "");

        let address = graph.add_node(TypeNode::new(
            "Address",
            "definitions.Address",
            None,
            TypeAttributes::default(),
            TypeKind::Structure(StructureType::default()),
        ));
        graph.scope_mut(scope).register_id("addr", TypeRef::node(address)).unwrap();
        assert_eq!(graph.make_local_ref(scope, "addr/street"), "definitions.Address.street");
    }

    #[test]
    fn test_forward_reference() {
        let (mut graph, scope, root) = graph_with_scope();
        let lazy = graph.add_lazy(LazyRef::new(scope, "/definitions/Later", Some(root), None));
        add_member(&mut graph, root, "later", TypeRef::lazy(lazy));

        let later = graph.add_node(TypeNode::new(
            "Later",
            "definitions.Later",
            Some(root),
            TypeAttributes::default(),
            TypeKind::Basic(BasicKind::String),
        ));
        graph.scope_mut(scope).register_path("definitions.Later", TypeRef::node(later)).unwrap();

        assert!(graph.contains_lazy(root));
        graph.resolve_refs(root);
        assert!(!graph.contains_lazy(root));
        let member = &graph.node(root).as_structure().unwrap().members["later"];
        assert_eq!(member.ty.id(), Some(later));
        assert!(graph.issues(root).is_empty());
    }

    #[test]
    fn test_unresolvable_fragment_is_errant() {
        let (mut graph, scope, root) = graph_with_scope();
        let lazy = graph.add_lazy(LazyRef::new(scope, "/definitions/Nope", Some(root), Some(Token::new(2, 9))));
        add_member(&mut graph, root, "nope", TypeRef::lazy(lazy));

        graph.resolve_refs(root);
        let member = &graph.node(root).as_structure().unwrap().members["nope"];
        assert!(graph.is_errant(&member.ty));
        let issues = graph.issues(root);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Invalid URI fragment: /definitions/Nope");
        assert_eq!(issues[0].token, Some(Token::new(2, 9)));
    }

    #[test]
    fn test_lazy_chain_cycle() {
        let (mut graph, scope, root) = graph_with_scope();
        let a = graph.add_lazy(LazyRef::new(scope, "/definitions/B", Some(root), None));
        let b = graph.add_lazy(LazyRef::new(scope, "/definitions/A", Some(root), None));
        graph.scope_mut(scope).alias_path("definitions.A", TypeRef::lazy(a));
        graph.scope_mut(scope).alias_path("definitions.B", TypeRef::lazy(b));
        add_member(&mut graph, root, "a", TypeRef::lazy(a));

        graph.resolve_refs(root);
        let member = &graph.node(root).as_structure().unwrap().members["a"];
        assert!(graph.is_errant(&member.ty));
        assert!(graph.issues(root).iter().any(|i| i.message.starts_with("Circular reference")));
    }

    #[test]
    fn test_edge_attributes_layer_over_forced() {
        let (mut graph, scope, root) = graph_with_scope();
        let target = graph.add_node(TypeNode::new(
            "Name",
            "definitions.Name",
            Some(root),
            TypeAttributes::default(),
            TypeKind::Basic(BasicKind::String),
        ));
        graph.scope_mut(scope).register_path("definitions.Name", TypeRef::node(target)).unwrap();
        let lazy = graph.add_lazy(LazyRef::new(scope, "/definitions/Name", Some(root), None));
        let edge = TypeRef::lazy(lazy).with_attributes(&TypeAttributes::nullable(Some(true)));
        add_member(&mut graph, root, "name", edge);

        graph.resolve_refs(root);
        graph.resolve_refs(root);
        let member = &graph.node(root).as_structure().unwrap().members["name"];
        assert_eq!(member.ty.id(), Some(target));
        assert_eq!(graph.effective_attributes(&member.ty).nullable, Some(true));
        assert_eq!(graph.node(root).resolve_state(), ResolveState::Resolved);
    }

    #[test]
    fn test_self_reference_resolves() {
        let (mut graph, scope, root) = graph_with_scope();
        let lazy = graph.add_lazy(LazyRef::new(scope, "#", Some(root), None));
        add_member(&mut graph, root, "parent", TypeRef::lazy(lazy));

        graph.resolve_refs(root);
        let member = &graph.node(root).as_structure().unwrap().members["parent"];
        assert_eq!(member.ty.id(), Some(root));
        assert!(!graph.contains_lazy(root));
    }
}
