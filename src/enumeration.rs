//! Enum and Const Derivation
//!
//! `enum` lists and `const` values become enum types. Each non-null literal
//! is a named constant; `null` is not a constant but makes the enum
//! nullable. Also hosts [`TypeGraph::merge_types`], which folds two enum
//! occurrences (or an enum and a scalar) into one type.

use crate::attributes::{either_true, TypeAttributes};
use crate::graph::{
    BasicKind, EnumConstant, EnumType, Issue, ScopeId, TypeGraph, TypeId, TypeKind, TypeNode,
    TypeRef,
};
use crate::naming::{disambiguate, literal_identifier};
use crate::session::Session;
use crate::value::{SchemaObject, SchemaValue, Spanned};

const JSCH_ENUM: &str = "enum";
const JSCH_CONST: &str = "const";

/// Build an enum from literals in declaration order. Duplicate literals are
/// dropped; literals whose identifiers collide get `_2`, `_3`, ... suffixes.
pub fn enum_type_from_literals<'v, I>(literals: I) -> EnumType
where
    I: IntoIterator<Item = &'v Spanned>,
{
    let mut result = EnumType::default();
    for literal in literals {
        let value = literal.value.to_json();
        if value.is_null() {
            result.nullable = true;
            continue;
        }
        if result.contains_value(&value) {
            continue;
        }
        let name = disambiguate(&literal_identifier(&value), |n| result.contains_name(n));
        result.constants.push(EnumConstant {
            name,
            value,
            token: literal.token,
        });
    }
    result
}

impl Session<'_> {
    /// Derive an enum from `enum` (or a single-element `const`)
    pub(crate) fn derive_enum(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        name: &str,
        schema: &SchemaObject,
        attributes: TypeAttributes,
    ) -> TypeRef {
        let enum_type = match schema.get_spanned(JSCH_ENUM) {
            Some(spanned) => match &spanned.value {
                SchemaValue::Array(literals) => enum_type_from_literals(literals),
                _ => {
                    let errant = self.errant(scope, name);
                    if let Some(id) = errant.id() {
                        self.graph.add_issue(
                            id,
                            Issue::error(spanned.token, "'enum' must be a list of literal values"),
                        );
                    }
                    return errant;
                }
            },
            None => match schema.get_spanned(JSCH_CONST) {
                Some(spanned) => enum_type_from_literals(std::iter::once(spanned)),
                None => EnumType::default(),
            },
        };

        let nullable = enum_type.nullable.then_some(true);
        let attributes = TypeAttributes {
            nullable: either_true(attributes.nullable, nullable),
            ..attributes
        };
        TypeRef::node(self.create(scope, parent, path, name, attributes, TypeKind::Enum(enum_type)))
    }
}

// =============================================================================
// Merging
// =============================================================================

impl TypeGraph {
    /// Fold two types into one:
    /// - two enums of the same name: a new enum with the union of their
    ///   constants, nullable if either is
    /// - an enum and a scalar accepting every constant: the scalar
    /// - two equal scalars: that scalar, attributes combined
    /// - the same node twice: that node
    ///
    /// Anything else cannot be merged.
    pub fn merge_types(&mut self, a: &TypeRef, b: &TypeRef) -> Option<TypeRef> {
        let (x, y) = (a.id()?, b.id()?);
        if x == y {
            return Some(a.clone());
        }

        let (node_a, node_b) = (self.node(x), self.node(y));
        match (&node_a.kind, &node_b.kind) {
            (TypeKind::Enum(e1), TypeKind::Enum(e2)) if node_a.name == node_b.name => {
                let mut merged = e1.clone();
                for constant in &e2.constants {
                    if !merged.contains_value(&constant.value) {
                        let name = disambiguate(&constant.name, |n| merged.contains_name(n));
                        merged.constants.push(EnumConstant {
                            name,
                            ..constant.clone()
                        });
                    }
                }
                merged.nullable = e1.nullable || e2.nullable;

                let attributes = TypeAttributes {
                    nullable: either_true(
                        self.effective_attributes(a).nullable,
                        self.effective_attributes(b).nullable,
                    ),
                    ..self.effective_attributes(a)
                };
                let node = TypeNode::new(
                    node_a.name.clone(),
                    node_a.qualified_name.clone(),
                    node_a.parent,
                    attributes,
                    TypeKind::Enum(merged),
                )
                .with_document(node_a.document.clone());
                Some(TypeRef::node(self.add_node(node)))
            }
            (TypeKind::Enum(e), TypeKind::Basic(kind)) if widens(e, *kind) => Some(b.clone()),
            (TypeKind::Basic(kind), TypeKind::Enum(e)) if widens(e, *kind) => Some(a.clone()),
            (TypeKind::Basic(k1), TypeKind::Basic(k2)) if k1 == k2 => {
                let attributes = TypeAttributes::combine_from_operands(
                    &self.effective_attributes(a),
                    &self.effective_attributes(b),
                );
                Some(TypeRef {
                    target: a.target,
                    attributes: node_a.attributes.override_with(&attributes),
                })
            }
            _ => None,
        }
    }
}

/// Whether scalar `kind` holds every constant of `e`
fn widens(e: &EnumType, kind: BasicKind) -> bool {
    e.constants
        .iter()
        .all(|c| kind.accepts(BasicKind::of_literal(&c.value)))
}
