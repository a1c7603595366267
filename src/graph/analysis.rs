//! Recursion Analysis
//!
//! Computes strongly connected components (SCCs) over the structural edges
//! of a resolved graph and marks the edges a code generator must indirect
//! (box) so recursive types have a finite size.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{TypeGraph, TypeId, TypeKind, TypeNode, TypeRef};

// =============================================================================
// Edge Kind
// =============================================================================

/// How one node refers to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// A named structure member
    Member(String),
    /// A list's component type
    Component,
    /// A structure's supertype
    Supertype,
    /// A named union constituent
    Constituent(String),
}

impl EdgeKind {
    /// Whether a cycle through this edge needs an indirection. List
    /// components already live behind one; supertypes are flattened.
    pub fn needs_indirection(&self) -> bool {
        matches!(self, Self::Member(_) | Self::Constituent(_))
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member(name) => write!(f, ".{}", name),
            Self::Component => write!(f, "[]"),
            Self::Supertype => write!(f, "<super>"),
            Self::Constituent(name) => write!(f, "<{}>", name),
        }
    }
}

/// Labelled edges of a node, in declaration order
pub fn labeled_edges(node: &TypeNode) -> Vec<(EdgeKind, &TypeRef)> {
    match node.kind() {
        TypeKind::Structure(s) => s
            .members
            .iter()
            .map(|(name, m)| (EdgeKind::Member(name.clone()), &m.ty))
            .chain(s.supertypes.iter().map(|t| (EdgeKind::Supertype, t)))
            .collect(),
        TypeKind::List(l) => l.component.iter().map(|t| (EdgeKind::Component, t)).collect(),
        TypeKind::Union(u) => u
            .constituents
            .iter()
            .map(|(name, t)| (EdgeKind::Constituent(name.clone()), t))
            .collect(),
        TypeKind::Enum(_) | TypeKind::Basic(_) | TypeKind::Format(_) | TypeKind::Errant => {
            Vec::new()
        }
    }
}

// =============================================================================
// Analysis Result
// =============================================================================

/// An edge inside a recursive group that must be indirected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndirectEdge {
    pub from: TypeId,
    pub via: EdgeKind,
    pub to: TypeId,
    /// The group this edge is part of
    pub scc_id: usize,
}

/// A strongly connected component (cycle group) of the type graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursionGroup {
    pub id: usize,
    pub members: Vec<TypeId>,
    pub indirect_edges: Vec<IndirectEdge>,
    /// A single type referring to itself
    pub is_self_referential: bool,
}

/// Recursive groups reachable from a root
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecursionAnalysis {
    /// Only cycles with more than one member, or self references
    pub groups: Vec<RecursionGroup>,
    pub by_node: HashMap<TypeId, usize>,
    pub total_indirect_edges: usize,
}

impl RecursionAnalysis {
    pub fn is_recursive(&self, id: TypeId) -> bool {
        self.by_node.contains_key(&id)
    }

    pub fn group_of(&self, id: TypeId) -> Option<&RecursionGroup> {
        let group = *self.by_node.get(&id)?;
        self.groups.get(group)
    }

    /// Whether the edge `via` out of `from` must be indirected
    pub fn needs_indirection(&self, from: TypeId, via: &EdgeKind) -> bool {
        self.group_of(from)
            .map(|g| g.indirect_edges.iter().any(|e| e.from == from && &e.via == via))
            .unwrap_or(false)
    }
}

// =============================================================================
// Analysis Functions
// =============================================================================

/// Compute recursion analysis for everything reachable from `root`. Pending
/// references are ignored, so run this after `resolve_refs`.
pub fn analyze_recursion(graph: &TypeGraph, root: TypeId) -> RecursionAnalysis {
    let mut digraph: DiGraph<TypeId, EdgeKind> = DiGraph::new();
    let mut indices: HashMap<TypeId, NodeIndex> = HashMap::new();

    let reachable = graph.reachable(root);
    for id in &reachable {
        indices.insert(*id, digraph.add_node(*id));
    }
    for id in &reachable {
        for (kind, target) in labeled_edges(graph.node(*id)) {
            let Some(target) = target.id() else { continue };
            if let (Some(from), Some(to)) = (indices.get(id), indices.get(&target)) {
                digraph.add_edge(*from, *to, kind);
            }
        }
    }

    let mut analysis = RecursionAnalysis::default();
    for scc in kosaraju_scc(&digraph) {
        let is_self_referential = scc.len() == 1
            && digraph
                .edges_directed(scc[0], Direction::Outgoing)
                .any(|e| e.target() == scc[0]);
        if scc.len() == 1 && !is_self_referential {
            continue;
        }

        let scc_id = analysis.groups.len();
        let in_group: HashSet<NodeIndex> = scc.iter().copied().collect();
        let mut members: Vec<TypeId> = scc.iter().map(|idx| digraph[*idx]).collect();
        members.sort();

        let mut indirect_edges = Vec::new();
        for idx in &scc {
            for edge in digraph.edges_directed(*idx, Direction::Outgoing) {
                if in_group.contains(&edge.target()) && edge.weight().needs_indirection() {
                    indirect_edges.push(IndirectEdge {
                        from: digraph[edge.source()],
                        via: edge.weight().clone(),
                        to: digraph[edge.target()],
                        scc_id,
                    });
                }
            }
        }

        for member in &members {
            analysis.by_node.insert(*member, scc_id);
        }
        analysis.total_indirect_edges += indirect_edges.len();
        analysis.groups.push(RecursionGroup {
            id: scc_id,
            members,
            indirect_edges,
            is_self_referential,
        });
    }
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::TypeAttributes;
    use crate::graph::{BasicKind, ListType, StructureType};

    fn structure(graph: &mut TypeGraph, name: &str) -> TypeId {
        graph.add_node(TypeNode::new(
            name,
            name,
            None,
            TypeAttributes::default(),
            TypeKind::Structure(StructureType::default()),
        ))
    }

    fn add_member(graph: &mut TypeGraph, owner: TypeId, name: &str, target: TypeId) {
        if let TypeKind::Structure(s) = &mut graph.node_mut(owner).kind {
            s.add_member(name, TypeRef::node(target), None);
        }
    }

    #[test]
    fn test_edge_kind_display() {
        assert_eq!(EdgeKind::Member("next".into()).to_string(), ".next");
        assert_eq!(EdgeKind::Component.to_string(), "[]");
        assert_eq!(EdgeKind::Constituent("Option0".into()).to_string(), "<Option0>");
    }

    #[test]
    fn test_self_reference() {
        let mut graph = TypeGraph::new();
        let node = structure(&mut graph, "Node");
        let string = graph.add_node(TypeNode::new(
            "string",
            "",
            None,
            TypeAttributes::default(),
            TypeKind::Basic(BasicKind::String),
        ));
        add_member(&mut graph, node, "value", string);
        add_member(&mut graph, node, "next", node);

        let analysis = analyze_recursion(&graph, node);
        assert_eq!(analysis.groups.len(), 1);
        assert!(analysis.groups[0].is_self_referential);
        assert!(analysis.is_recursive(node));
        assert!(!analysis.is_recursive(string));
        assert!(analysis.needs_indirection(node, &EdgeKind::Member("next".into())));
        assert!(!analysis.needs_indirection(node, &EdgeKind::Member("value".into())));
        assert_eq!(analysis.total_indirect_edges, 1);
    }

    #[test]
    fn test_mutual_recursion() {
        let mut graph = TypeGraph::new();
        let person = structure(&mut graph, "Person");
        let pet = structure(&mut graph, "Pet");
        add_member(&mut graph, person, "pet", pet);
        add_member(&mut graph, pet, "owner", person);

        let analysis = analyze_recursion(&graph, person);
        assert_eq!(analysis.groups.len(), 1);
        let group = analysis.group_of(pet).unwrap();
        assert_eq!(group.members, vec![person, pet]);
        assert!(!group.is_self_referential);
        assert_eq!(group.indirect_edges.len(), 2);
    }

    #[test]
    fn test_list_cycle_needs_no_indirection() {
        let mut graph = TypeGraph::new();
        let tree = structure(&mut graph, "Tree");
        let children = graph.add_node(TypeNode::new(
            "children",
            "Tree.children",
            Some(tree),
            TypeAttributes::default(),
            TypeKind::List(ListType {
                component: Some(TypeRef::node(tree)),
            }),
        ));
        add_member(&mut graph, tree, "children", children);

        let analysis = analyze_recursion(&graph, tree);
        assert_eq!(analysis.groups.len(), 1);
        let edges = &analysis.groups[0].indirect_edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].via, EdgeKind::Member("children".into()));
    }

    #[test]
    fn test_acyclic() {
        let mut graph = TypeGraph::new();
        let a = structure(&mut graph, "A");
        let b = structure(&mut graph, "B");
        add_member(&mut graph, a, "b", b);
        let analysis = analyze_recursion(&graph, a);
        assert!(analysis.groups.is_empty());
        assert_eq!(analysis.total_indirect_edges, 0);
    }
}
