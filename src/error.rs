//! Error types for the type graph transformer
//!
//! Only a handful of conditions abort a transform. Everything else a schema
//! can get wrong is recorded as an [`Issue`](crate::graph::Issue) on the graph
//! and the walk carries on.

use thiserror::Error;

use crate::value::Token;

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;

/// Fatal transform errors
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Illegal schema type name: '{name}'{}", fmt_token(.token))]
    IllegalTypeName { name: String, token: Option<Token> },

    #[error("Session stack mismatch: expected transformer {expected}, found {actual}")]
    SessionStackMismatch { expected: String, actual: String },

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// Document loader errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Unsupported document location: {0}")]
    UnsupportedLocation(String),

    #[error("IO error reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

fn fmt_token(token: &Option<Token>) -> String {
    match token {
        Some(token) => format!(" at {}", token),
        None => String::new(),
    }
}
