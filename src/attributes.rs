//! Type Attributes
//!
//! Attributes decorate a type without being part of its structure: the same
//! structure referenced from two places may be nullable at one and not the
//! other. Two combination rules exist and are not interchangeable:
//!
//! - [`TypeAttributes::merge`]: first operand wins wherever it has a value
//! - [`TypeAttributes::combine_from_operands`]: flags must agree (AND),
//!   default value is the first non-null one

use serde::{Deserialize, Serialize};

use crate::value::SchemaObject;

const JSCH_NULLABLE: &str = "nullable";
const JSCH_DEFAULT: &str = "default";
const JSCH_READONLY: &str = "readOnly";
const JSCH_WRITEONLY: &str = "writeOnly";

/// Nullable/default/access attributes of a type occurrence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeAttributes {
    /// Tri-state: `None` means nothing said either way
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,
}

impl TypeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nullable(nullable: Option<bool>) -> Self {
        Self { nullable, ..Self::default() }
    }

    /// Attributes declared by a schema object, with `nullable` supplied by
    /// the caller (it is computed from several sources).
    pub fn from_schema(nullable: Option<bool>, schema: &SchemaObject) -> Self {
        Self {
            nullable,
            default_value: schema.get(JSCH_DEFAULT).map(|v| v.to_json()),
            read_only: schema.get_bool(JSCH_READONLY),
            write_only: schema.get_bool(JSCH_WRITEONLY),
        }
    }

    /// Only the explicit `nullable` marker of a schema object
    pub fn nullable_from_schema(schema: &SchemaObject) -> Self {
        Self::nullable(schema.get_bool(JSCH_NULLABLE))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `a` wins wherever it has a value, `b` fills the gaps.
    pub fn merge(a: &Self, b: &Self) -> Self {
        Self {
            nullable: a.nullable.or(b.nullable),
            default_value: a.default_value.clone().or_else(|| b.default_value.clone()),
            read_only: a.read_only.or(b.read_only),
            write_only: a.write_only.or(b.write_only),
        }
    }

    /// Layer `other` on top of `self`: values present in `other` replace ours.
    pub fn override_with(&self, other: &Self) -> Self {
        Self::merge(other, self)
    }

    /// Attributes of a type derived from two operand types. Flags hold only
    /// if both operands agree; the default is the first non-null one.
    pub fn combine_from_operands(t1: &Self, t2: &Self) -> Self {
        Self {
            nullable: both_true(t1.nullable, t2.nullable),
            default_value: first_non_null(&t1.default_value, &t2.default_value),
            read_only: both_true(t1.read_only, t2.read_only),
            write_only: both_true(t1.write_only, t2.write_only),
        }
    }
}

/// Tri-state OR: unknown only when both are unknown
pub fn either_true(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a || b),
        (a, None) => a,
        (None, b) => b,
    }
}

fn both_true(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a && b),
        (a, None) => a,
        (None, b) => b,
    }
}

fn first_non_null(
    a: &Option<serde_json::Value>,
    b: &Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    match a {
        Some(v) if !v.is_null() => Some(v.clone()),
        _ => b.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SchemaValue;
    use serde_json::json;

    fn attrs(nullable: Option<bool>, default_value: Option<serde_json::Value>) -> TypeAttributes {
        TypeAttributes { nullable, default_value, ..TypeAttributes::default() }
    }

    #[test]
    fn test_merge_first_operand_wins() {
        let a = attrs(Some(false), None);
        let b = attrs(Some(true), Some(json!(5)));
        let merged = TypeAttributes::merge(&a, &b);
        assert_eq!(merged.nullable, Some(false));
        assert_eq!(merged.default_value, Some(json!(5)));

        let merged = TypeAttributes::merge(&b, &a);
        assert_eq!(merged.nullable, Some(true));
        assert_eq!(merged.default_value, Some(json!(5)));
    }

    #[test]
    fn test_override_with_replaces_present_values() {
        let base = attrs(Some(false), Some(json!("x")));
        let layered = base.override_with(&attrs(Some(true), None));
        assert_eq!(layered, attrs(Some(true), Some(json!("x"))));
    }

    #[test]
    fn test_combine_requires_agreement() {
        let t1 = attrs(Some(true), Some(json!(null)));
        let t2 = attrs(Some(false), Some(json!(3)));
        let combined = TypeAttributes::combine_from_operands(&t1, &t2);
        assert_eq!(combined.nullable, Some(false));
        assert_eq!(combined.default_value, Some(json!(3)));

        let combined = TypeAttributes::combine_from_operands(&attrs(Some(true), None), &attrs(None, None));
        assert_eq!(combined.nullable, Some(true));
    }

    #[test]
    fn test_combine_is_not_merge() {
        let t1 = attrs(Some(true), None);
        let t2 = attrs(Some(false), None);
        assert_ne!(
            TypeAttributes::merge(&t1, &t2),
            TypeAttributes::combine_from_operands(&t1, &t2)
        );
    }

    #[test]
    fn test_equality_is_by_value() {
        assert_eq!(attrs(Some(true), Some(json!([1]))), attrs(Some(true), Some(json!([1]))));
        assert_ne!(attrs(Some(true), None), attrs(None, None));
        assert_ne!(attrs(None, Some(json!(1))), attrs(None, Some(json!(2))));
    }

    #[test]
    fn test_from_schema() {
        let value: SchemaValue = json!({"default": "red", "readOnly": true}).into();
        let a = TypeAttributes::from_schema(None, value.as_object().unwrap());
        assert_eq!(a.nullable, None);
        assert_eq!(a.default_value, Some(json!("red")));
        assert_eq!(a.read_only, Some(true));
        assert_eq!(a.write_only, None);
    }

    #[test]
    fn test_either_true() {
        assert_eq!(either_true(None, None), None);
        assert_eq!(either_true(Some(false), None), Some(false));
        assert_eq!(either_true(Some(false), Some(true)), Some(true));
    }
}
