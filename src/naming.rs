//! Identifier Synthesis
//!
//! Qualified names and enum constant names must be usable as identifiers by
//! whatever code generator consumes the graph. Names are made identifier-safe
//! here and disambiguated when two literals map to the same identifier.

/// Map an arbitrary string onto an identifier: characters outside
/// `[A-Za-z0-9_]` become `_`, and a leading digit gets a `_` prefix.
pub fn make_identifier(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }

    let mut result = String::with_capacity(name.len() + 1);
    for (i, c) in name.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            result.push('_');
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c);
        } else {
            result.push('_');
        }
    }
    result
}

/// Dotted child path: `join_path("", "a") == "a"`, `join_path("a", "b c") == "a.b_c"`
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        make_identifier(name)
    } else {
        format!("{}.{}", prefix, make_identifier(name))
    }
}

/// Identifier for an enum literal. Strings use their text, other literals
/// their JSON rendering (`5` -> `_5`, `4.5` -> `_4_5`, `true` -> `true`).
pub fn literal_identifier(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => make_identifier(s),
        other => make_identifier(&other.to_string()),
    }
}

/// First of `base`, `base_2`, `base_3`, ... that `is_taken` rejects.
pub fn disambiguate(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_make_identifier() {
        assert_eq!(make_identifier("blue"), "blue");
        assert_eq!(make_identifier("date-time"), "date_time");
        assert_eq!(make_identifier("5"), "_5");
        assert_eq!(make_identifier("4.0"), "_4_0");
        assert_eq!(make_identifier("a b/c"), "a_b_c");
        assert_eq!(make_identifier(""), "_");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "Person"), "Person");
        assert_eq!(join_path("definitions", "date-of-birth"), "definitions.date_of_birth");
    }

    #[test]
    fn test_literal_identifier() {
        assert_eq!(literal_identifier(&json!("green")), "green");
        assert_eq!(literal_identifier(&json!(5)), "_5");
        assert_eq!(literal_identifier(&json!(4.5)), "_4_5");
        assert_eq!(literal_identifier(&json!(true)), "true");
    }

    #[test]
    fn test_disambiguate() {
        let taken: HashSet<&str> = ["a_b", "a_b_2"].into_iter().collect();
        assert_eq!(disambiguate("a_b", |n| taken.contains(n)), "a_b_3");
        assert_eq!(disambiguate("c", |n| taken.contains(n)), "c");
    }
}
