//! Parsed Value Tree
//!
//! The transformer never parses text. Loaders hand it a [`SchemaValue`] tree
//! whose entries may carry a source [`Token`] so issues can point back at the
//! offending key.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Token
// =============================================================================

/// Source location of a key or value (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// =============================================================================
// Values
// =============================================================================

/// A value plus the location it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub value: SchemaValue,
    pub token: Option<Token>,
}

impl Spanned {
    pub fn new(value: SchemaValue) -> Self {
        Self { value, token: None }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }
}

/// Recursive parsed document value
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaValue {
    Object(SchemaObject),
    Array(Vec<Spanned>),
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl SchemaValue {
    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Spanned]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Plain JSON view, dropping tokens (used for literals and default values)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Object(obj) => serde_json::Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.value.to_json()))
                    .collect(),
            ),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.value.to_json()).collect())
            }
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl From<serde_json::Value> for SchemaValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self::Object(SchemaObject {
                entries: map
                    .into_iter()
                    .map(|(k, v)| (k, Spanned::new(v.into())))
                    .collect(),
            }),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(|v| Spanned::new(v.into())).collect())
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Null => Self::Null,
        }
    }
}

// =============================================================================
// Schema Object
// =============================================================================

/// Ordered string-keyed mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaObject {
    entries: IndexMap<String, Spanned>,
}

impl SchemaObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Spanned) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&SchemaValue> {
        self.entries.get(key).map(|s| &s.value)
    }

    pub fn get_spanned(&self, key: &str) -> Option<&Spanned> {
        self.entries.get(key)
    }

    pub fn token(&self, key: &str) -> Option<Token> {
        self.entries.get(key).and_then(|s| s.token)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SchemaValue::as_str)
    }

    pub fn get_object(&self, key: &str) -> Option<&SchemaObject> {
        self.get(key).and_then(SchemaValue::as_object)
    }

    pub fn get_array(&self, key: &str) -> Option<&[Spanned]> {
        self.get(key).and_then(SchemaValue::as_array)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(SchemaValue::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Spanned)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_preserves_key_order() {
        let value: SchemaValue = json!({"zeta": 1, "alpha": 2, "mid": 3}).into();
        let obj = value.as_object().unwrap();
        let keys: Vec<&str> = obj.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_accessors() {
        let value: SchemaValue = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["a"],
            "nullable": true
        })
        .into();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get_str("type"), Some("object"));
        assert!(obj.get_object("properties").is_some());
        assert_eq!(obj.get_array("required").map(|a| a.len()), Some(1));
        assert_eq!(obj.get_bool("nullable"), Some(true));
        assert!(obj.get_str("properties").is_none());
    }

    #[test]
    fn test_tokens_survive() {
        let mut obj = SchemaObject::new();
        obj.insert(
            "$ref",
            Spanned::new(SchemaValue::String("#/definitions/A".into())).with_token(Token::new(4, 7)),
        );
        assert_eq!(obj.token("$ref"), Some(Token::new(4, 7)));
        assert_eq!(obj.token("missing"), None);
    }

    #[test]
    fn test_to_json() {
        let original = json!({"a": [1, "two", null, true]});
        let value: SchemaValue = original.clone().into();
        assert_eq!(value.to_json(), original);
    }
}
