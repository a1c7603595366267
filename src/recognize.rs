//! Schema Recognition
//!
//! Decides whether a parsed document is a schema at all. Only the top-level
//! document is checked; nested property schemas are taken as schemas.

use crate::value::{SchemaObject, SchemaValue};

const JSCH_SCHEMA: &str = "$schema";
const JSCH_ID: &str = "$id";
const JSCH_LEGACY_ID: &str = "id";
const JSCH_TYPE: &str = "type";
const JSCH_PROPERTIES: &str = "properties";

/// A mapping is a schema if it has a `$schema` marker, a declared id,
/// `type` of `object`/`array`, or a `properties` mapping.
pub fn is_schema(obj: &SchemaObject) -> bool {
    has_value(obj, JSCH_SCHEMA)
        || has_value(obj, JSCH_ID)
        || obj.get_str(JSCH_LEGACY_ID).is_some()
        || matches!(obj.get_str(JSCH_TYPE), Some("object") | Some("array"))
        || obj.get_object(JSCH_PROPERTIES).is_some()
}

fn has_value(obj: &SchemaObject, key: &str) -> bool {
    obj.get(key).map(|v| !v.is_null()).unwrap_or(false)
}

/// [`is_schema`] for any value; only mappings can be schemas
pub fn is_schema_value(value: &SchemaValue) -> bool {
    value.as_object().map(is_schema).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(value: serde_json::Value) -> bool {
        is_schema_value(&value.into())
    }

    #[test]
    fn test_markers() {
        assert!(check(json!({"$schema": "http://json-schema.org/draft-07/schema#"})));
        assert!(check(json!({"$id": "http://example.com/person.json"})));
        assert!(check(json!({"id": "person"})));
    }

    #[test]
    fn test_type_and_properties() {
        assert!(check(json!({"type": "object"})));
        assert!(check(json!({"type": "array"})));
        assert!(check(json!({"properties": {"a": {}}})));
        assert!(!check(json!({"type": "string"})));
        assert!(!check(json!({"properties": "nope"})));
    }

    #[test]
    fn test_plain_data_is_not_a_schema() {
        assert!(!check(json!({"firstName": "Jane", "age": 30})));
        assert!(!check(json!({"$schema": null})));
        assert!(!check(json!([1, 2, 3])));
    }
}
