//! Format Resolvers
//!
//! A schema's `format` tag may map a scalar onto an external type (a date, a
//! UUID, ...). Resolvers are plugins: each claims a set of tags and turns a
//! tag into a [`FormatType`]. The registry asks them in registration order
//! and the first match wins. Two resolvers claiming the same tag is not
//! diagnosed; whoever registered first takes it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An externally resolved scalar with no structural children
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatType {
    /// The `format` tag, e.g. `date-time`
    pub format: String,
    /// Canonical path of the target type, e.g. `chrono::NaiveDateTime`
    pub target: String,
}

impl FormatType {
    pub fn new(format: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            target: target.into(),
        }
    }
}

/// A format resolver plugin
pub trait FormatResolver {
    /// Tags this resolver claims
    fn formats(&self) -> Vec<String>;

    /// Resolve a tag, `None` if not claimed
    fn resolve(&self, format: &str) -> Option<FormatType>;
}

// =============================================================================
// Default Resolver
// =============================================================================

/// Standard temporal formats plus the common non-standard ones
#[derive(Debug, Clone, Default)]
pub struct DefaultFormatResolver;

impl DefaultFormatResolver {
    const FORMATS: [(&'static str, &'static str); 5] = [
        ("date-time", "chrono::NaiveDateTime"),
        ("date", "chrono::NaiveDate"),
        ("time", "chrono::NaiveTime"),
        ("full-date", "chrono::NaiveDateTime"),
        ("utc-millisec", "chrono::DateTime<chrono::Utc>"),
    ];
}

impl FormatResolver for DefaultFormatResolver {
    fn formats(&self) -> Vec<String> {
        Self::FORMATS.iter().map(|(tag, _)| tag.to_string()).collect()
    }

    fn resolve(&self, format: &str) -> Option<FormatType> {
        Self::FORMATS
            .iter()
            .find(|(tag, _)| *tag == format)
            .map(|(tag, target)| FormatType::new(*tag, *target))
    }
}

// =============================================================================
// Mapped Resolver
// =============================================================================

/// Resolver built from a tag -> target table (e.g. from configuration)
#[derive(Debug, Clone, Default)]
pub struct MappedFormatResolver {
    mappings: HashMap<String, String>,
}

impl MappedFormatResolver {
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }
}

impl FormatResolver for MappedFormatResolver {
    fn formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.mappings.keys().cloned().collect();
        formats.sort();
        formats
    }

    fn resolve(&self, format: &str) -> Option<FormatType> {
        self.mappings
            .get(format)
            .map(|target| FormatType::new(format, target.clone()))
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Ordered set of format resolvers
#[derive(Default)]
pub struct FormatRegistry {
    resolvers: Vec<Box<dyn FormatResolver>>,
}

impl FormatRegistry {
    /// Registry with no resolvers
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the [`DefaultFormatResolver`]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(DefaultFormatResolver);
        registry
    }

    pub fn register(&mut self, resolver: impl FormatResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// First registered resolver claiming `format` wins
    pub fn resolve(&self, format: &str) -> Option<FormatType> {
        self.resolvers.iter().find_map(|r| r.resolve(format))
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field(
                "formats",
                &self.resolvers.iter().map(|r| r.formats()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
