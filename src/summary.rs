//! Graph Summary
//!
//! Flat, serializable view of a resolved graph: every node reachable from
//! the root with its kind, attributes and outgoing edges named by label,
//! plus the collected issues and recursive groups.

use serde::Serialize;

use crate::attributes::TypeAttributes;
use crate::format::FormatType;
use crate::graph::{
    analyze_recursion, labeled_edges, BasicKind, Issue, TypeGraph, TypeId, TypeKind,
};

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub root: Option<String>,
    pub nodes: Vec<NodeSummary>,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recursive_groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub label: String,
    pub name: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "TypeAttributes::is_empty")]
    pub attributes: TypeAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeSummary {
    pub via: String,
    pub target: String,
    #[serde(skip_serializing_if = "TypeAttributes::is_empty")]
    pub attributes: TypeAttributes,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub indirect: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub members: Vec<String>,
    pub self_referential: bool,
}

/// Display label of a node: its qualified name, or its simple name for
/// document roots and errant nodes
pub fn node_label(graph: &TypeGraph, id: TypeId) -> String {
    let node = graph.node(id);
    if node.qualified_name().is_empty() {
        node.name().to_string()
    } else {
        node.qualified_name().to_string()
    }
}

impl GraphSummary {
    /// Summarize everything reachable from the graph's root
    pub fn from_graph(graph: &TypeGraph) -> Self {
        let Some(root) = graph.root_id() else {
            return Self {
                root: None,
                nodes: Vec::new(),
                issues: graph.all_issues().into_iter().cloned().collect(),
                recursive_groups: Vec::new(),
            };
        };

        let recursion = analyze_recursion(graph, root);
        let nodes = graph
            .reachable(root)
            .into_iter()
            .map(|id| summarize_node(graph, id, &recursion))
            .collect();
        let recursive_groups = recursion
            .groups
            .iter()
            .map(|g| GroupSummary {
                members: g.members.iter().map(|m| node_label(graph, *m)).collect(),
                self_referential: g.is_self_referential,
            })
            .collect();

        Self {
            root: Some(node_label(graph, root)),
            nodes,
            issues: graph.all_issues().into_iter().cloned().collect(),
            recursive_groups,
        }
    }
}

fn summarize_node(
    graph: &TypeGraph,
    id: TypeId,
    recursion: &crate::graph::RecursionAnalysis,
) -> NodeSummary {
    let node = graph.node(id);
    let edges = labeled_edges(node)
        .into_iter()
        .map(|(via, target)| EdgeSummary {
            indirect: recursion.needs_indirection(id, &via),
            via: via.to_string(),
            target: match target.id() {
                Some(target) => node_label(graph, target),
                None => graph.type_name(target),
            },
            attributes: target.attributes.clone(),
        })
        .collect();

    let (constants, required) = match node.kind() {
        TypeKind::Enum(e) => (e.constants.iter().map(|c| c.value.clone()).collect(), Vec::new()),
        TypeKind::Structure(s) => (
            Vec::new(),
            s.required
                .as_ref()
                .map(|r| r.iter().cloned().collect())
                .unwrap_or_default(),
        ),
        _ => (Vec::new(), Vec::new()),
    };

    NodeSummary {
        label: node_label(graph, id),
        name: node.name().to_string(),
        kind: node.kind().kind_name(),
        document: node.document().map(|d| d.to_string()),
        id: node.declared_id().map(str::to_string),
        attributes: node.attributes().clone(),
        basic: node.as_basic(),
        format: node.as_format().cloned(),
        constants,
        required,
        edges,
        definitions: node
            .definitions()
            .iter()
            .filter_map(|d| d.id().map(|d| node_label(graph, d)))
            .collect(),
        children: node.children().keys().cloned().collect(),
        synthetic: node.is_synthetic(),
    }
}
