//! Type Nodes
//!
//! The closed set of node variants a schema can turn into. Nodes live in the
//! [`TypeGraph`](super::TypeGraph) arena and point at each other through
//! [`TypeRef`] edges, which may still be unresolved while a graph is built.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::issues::Issue;
use crate::attributes::TypeAttributes;
use crate::format::FormatType;
use crate::loader::DocumentId;
use crate::value::Token;

// =============================================================================
// Handles
// =============================================================================

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a pending reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LazyId(pub(crate) usize);

/// Where an edge points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefTarget {
    Resolved(TypeId),
    Unresolved(LazyId),
}

/// An edge to a type plus the attributes this occurrence layers on top of
/// the target's own. Copying a type "with attributes" is just building a new
/// `TypeRef`; the target node is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub target: RefTarget,
    #[serde(default, skip_serializing_if = "TypeAttributes::is_empty")]
    pub attributes: TypeAttributes,
}

impl TypeRef {
    pub fn node(id: TypeId) -> Self {
        Self {
            target: RefTarget::Resolved(id),
            attributes: TypeAttributes::default(),
        }
    }

    pub fn lazy(id: LazyId) -> Self {
        Self {
            target: RefTarget::Unresolved(id),
            attributes: TypeAttributes::default(),
        }
    }

    pub fn id(&self) -> Option<TypeId> {
        match self.target {
            RefTarget::Resolved(id) => Some(id),
            RefTarget::Unresolved(_) => None,
        }
    }

    pub fn lazy_id(&self) -> Option<LazyId> {
        match self.target {
            RefTarget::Unresolved(id) => Some(id),
            RefTarget::Resolved(_) => None,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.target, RefTarget::Unresolved(_))
    }

    /// Same target, `attributes` layered over this occurrence's
    pub fn with_attributes(&self, attributes: &TypeAttributes) -> Self {
        Self {
            target: self.target,
            attributes: self.attributes.override_with(attributes),
        }
    }
}

// =============================================================================
// Variants
// =============================================================================

/// A structure member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub ty: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

/// Object type: named members plus (from `allOf`) ordered supertypes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureType {
    pub members: IndexMap<String, Member>,
    pub supertypes: Vec<TypeRef>,
    pub required: Option<IndexSet<String>>,
}

impl StructureType {
    pub fn add_member(&mut self, name: impl Into<String>, ty: TypeRef, token: Option<Token>) {
        self.members.insert(name.into(), Member { ty, token });
    }

    pub fn add_super(&mut self, ty: TypeRef) {
        self.supertypes.push(ty);
    }

    pub fn add_required<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required = self.required.get_or_insert_with(IndexSet::new);
        required.extend(names.into_iter().map(Into::into));
    }

    pub fn is_required(&self, member: &str) -> bool {
        self.required
            .as_ref()
            .map(|r| r.contains(member))
            .unwrap_or(false)
    }
}

/// Array type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListType {
    pub component: Option<TypeRef>,
}

/// A named enum literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

/// Enumeration of literal constants. A `null` literal never becomes a
/// constant; it sets `nullable` instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub constants: Vec<EnumConstant>,
    pub nullable: bool,
}

impl EnumType {
    pub fn contains_value(&self, value: &serde_json::Value) -> bool {
        self.constants.iter().any(|c| &c.value == value)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.constants.iter().any(|c| c.name == name)
    }
}

/// `anyOf`/`oneOf` union of named constituents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnionType {
    pub constituents: IndexMap<String, TypeRef>,
}

/// Built-in scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Dynamic,
}

impl BasicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Dynamic => "dynamic",
        }
    }

    /// Kind of a JSON literal, used when widening an enum to a scalar
    pub fn of_literal(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(_) => Self::String,
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            serde_json::Value::Number(_) => Self::Number,
            serde_json::Value::Bool(_) => Self::Boolean,
            serde_json::Value::Null => Self::Null,
            _ => Self::Dynamic,
        }
    }

    /// Whether a literal of kind `literal` is a value of `self`
    pub fn accepts(&self, literal: BasicKind) -> bool {
        *self == literal
            || *self == Self::Dynamic
            || (*self == Self::Number && literal == Self::Integer)
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    Structure(StructureType),
    List(ListType),
    Enum(EnumType),
    Union(UnionType),
    Basic(BasicKind),
    Format(FormatType),
    Errant,
}

impl TypeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Structure(_) => "structure",
            Self::List(_) => "list",
            Self::Enum(_) => "enum",
            Self::Union(_) => "union",
            Self::Basic(_) => "basic",
            Self::Format(_) => "format",
            Self::Errant => "errant",
        }
    }

    /// Structural edges, in declaration order
    pub fn edges(&self) -> Vec<&TypeRef> {
        match self {
            Self::Structure(s) => s
                .members
                .values()
                .map(|m| &m.ty)
                .chain(s.supertypes.iter())
                .collect(),
            Self::List(l) => l.component.iter().collect(),
            Self::Union(u) => u.constituents.values().collect(),
            Self::Enum(_) | Self::Basic(_) | Self::Format(_) | Self::Errant => Vec::new(),
        }
    }

    pub fn edges_mut(&mut self) -> Vec<&mut TypeRef> {
        match self {
            Self::Structure(s) => s
                .members
                .values_mut()
                .map(|m| &mut m.ty)
                .chain(s.supertypes.iter_mut())
                .collect(),
            Self::List(l) => l.component.iter_mut().collect(),
            Self::Union(u) => u.constituents.values_mut().collect(),
            Self::Enum(_) | Self::Basic(_) | Self::Format(_) | Self::Errant => Vec::new(),
        }
    }
}

// =============================================================================
// Node
// =============================================================================

/// Progress of the reference resolution pass over a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolveState {
    #[default]
    Unresolved,
    Resolving,
    Resolved,
}

/// A node of the type graph
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub(crate) name: String,
    pub(crate) qualified_name: String,
    pub(crate) parent: Option<TypeId>,
    pub(crate) document: Option<DocumentId>,
    pub(crate) attributes: TypeAttributes,
    pub(crate) kind: TypeKind,
    pub(crate) definitions: Vec<TypeRef>,
    pub(crate) children: IndexMap<String, TypeId>,
    pub(crate) declared_id: Option<String>,
    pub(crate) token: Option<Token>,
    pub(crate) schema_origin: bool,
    pub(crate) synthetic: bool,
    pub(crate) resolve_state: ResolveState,
    /// Held by roots; on other nodes only until they are attached
    pub(crate) issues: Vec<Issue>,
}

impl TypeNode {
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        parent: Option<TypeId>,
        attributes: TypeAttributes,
        kind: TypeKind,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            parent,
            document: None,
            attributes,
            kind,
            definitions: Vec::new(),
            children: IndexMap::new(),
            declared_id: None,
            token: None,
            schema_origin: false,
            synthetic: false,
            resolve_state: ResolveState::Unresolved,
            issues: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: Option<DocumentId>) -> Self {
        self.document = document;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the document root (empty for the root itself)
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }

    pub fn document(&self) -> Option<&DocumentId> {
        self.document.as_ref()
    }

    pub fn attributes(&self) -> &TypeAttributes {
        &self.attributes
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn definitions(&self) -> &[TypeRef] {
        &self.definitions
    }

    pub fn children(&self) -> &IndexMap<String, TypeId> {
        &self.children
    }

    pub fn declared_id(&self) -> Option<&str> {
        self.declared_id.as_deref()
    }

    pub fn token(&self) -> Option<Token> {
        self.token
    }

    pub fn is_schema_origin(&self) -> bool {
        self.schema_origin
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn resolve_state(&self) -> ResolveState {
        self.resolve_state
    }

    pub fn is_errant(&self) -> bool {
        matches!(self.kind, TypeKind::Errant)
    }

    pub fn as_structure(&self) -> Option<&StructureType> {
        match &self.kind {
            TypeKind::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListType> {
        match &self.kind {
            TypeKind::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match &self.kind {
            TypeKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&UnionType> {
        match &self.kind {
            TypeKind::Union(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_basic(&self) -> Option<BasicKind> {
        match &self.kind {
            TypeKind::Basic(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_format(&self) -> Option<&FormatType> {
        match &self.kind {
            TypeKind::Format(f) => Some(f),
            _ => None,
        }
    }

    /// Structural edges followed by definitions
    pub fn edges(&self) -> Vec<&TypeRef> {
        let mut edges = self.kind.edges();
        edges.extend(self.definitions.iter());
        edges
    }

    pub fn edges_mut(&mut self) -> Vec<&mut TypeRef> {
        let mut edges = self.kind.edges_mut();
        edges.extend(self.definitions.iter_mut());
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_attributes_shares_target() {
        let original = TypeRef::node(TypeId(7));
        let copy = original.with_attributes(&TypeAttributes::nullable(Some(true)));
        assert_eq!(copy.target, original.target);
        assert_eq!(copy.attributes.nullable, Some(true));
        assert_eq!(original.attributes.nullable, None);
    }

    #[test]
    fn test_with_attributes_layers() {
        let first = TypeRef::lazy(LazyId(0)).with_attributes(&TypeAttributes {
            default_value: Some(json!(1)),
            nullable: Some(false),
            ..Default::default()
        });
        let second = first.with_attributes(&TypeAttributes::nullable(Some(true)));
        assert!(second.is_lazy());
        assert_eq!(second.attributes.nullable, Some(true));
        assert_eq!(second.attributes.default_value, Some(json!(1)));
    }

    #[test]
    fn test_structure_required() {
        let mut s = StructureType::default();
        assert!(!s.is_required("id"));
        s.add_required(["id", "name"]);
        s.add_required(vec!["id".to_string()]);
        assert!(s.is_required("id"));
        assert_eq!(s.required.as_ref().map(|r| r.len()), Some(2));
    }

    #[test]
    fn test_structure_edges_in_order() {
        let mut s = StructureType::default();
        s.add_member("b", TypeRef::node(TypeId(2)), None);
        s.add_member("a", TypeRef::node(TypeId(1)), None);
        s.add_super(TypeRef::node(TypeId(3)));
        let kind = TypeKind::Structure(s);
        let ids: Vec<TypeId> = kind.edges().iter().filter_map(|r| r.id()).collect();
        assert_eq!(ids, vec![TypeId(2), TypeId(1), TypeId(3)]);
    }

    #[test]
    fn test_basic_kind_literals() {
        assert_eq!(BasicKind::of_literal(&json!("x")), BasicKind::String);
        assert_eq!(BasicKind::of_literal(&json!(3)), BasicKind::Integer);
        assert_eq!(BasicKind::of_literal(&json!(3.5)), BasicKind::Number);
        assert!(BasicKind::Number.accepts(BasicKind::Integer));
        assert!(!BasicKind::Integer.accepts(BasicKind::Number));
        assert!(BasicKind::Dynamic.accepts(BasicKind::Boolean));
    }
}
