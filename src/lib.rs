//! Schema Type Graph
//!
//! Resolves JSON Schema documents into a strongly-typed type graph: named
//! structures, lists, enums, unions and scalars linked by edges, ready for a
//! code generator.
//!
//! ## Features
//!
//! - **References**: local, forward, circular and cross-document `$ref`s
//! - **Combinations**: `allOf` hierarchies, `anyOf`/`oneOf` unions
//! - **Enums**: `enum` and `const`, with `null` folded into nullability
//! - **Attributes**: nullable/default/readOnly/writeOnly per occurrence
//! - **Issues**: problems are collected on the graph, the walk carries on
//!
//! ## Architecture
//!
//! ```text
//! SchemaTransformer::transform
//! └── Session                      one per top-level call
//!     ├── transform_document       scope + transformer stack push/pop
//!     │   └── transform_type       builder, recursive
//!     │       ├── find_reference   eager ids, lazy fragments, other documents
//!     │       ├── derive_enum
//!     │       └── transform_combination
//!     └── TypeGraph::resolve_refs  forces every pending reference
//! ```

pub mod attributes;
pub mod builder;
pub mod combination;
pub mod config;
pub mod enumeration;
pub mod error;
pub mod format;
pub mod graph;
pub mod loader;
pub mod naming;
pub mod recognize;
pub mod reference;
pub mod session;
pub mod summary;
pub mod value;

pub use attributes::TypeAttributes;
pub use config::TypeGraphConfig;
pub use error::{LoadError, Result, TransformError};
pub use format::{DefaultFormatResolver, FormatRegistry, FormatResolver, FormatType, MappedFormatResolver};
pub use graph::{
    analyze_recursion, Issue, IssueKind, RecursionAnalysis, TypeGraph, TypeId, TypeKind, TypeNode,
    TypeRef,
};
pub use loader::{DocumentId, DocumentLoader, FsLoader, MemoryLoader};
pub use recognize::is_schema;
pub use session::Session;
pub use summary::GraphSummary;
pub use value::{SchemaObject, SchemaValue, Token};

use tracing::debug;

/// Entry point: a loader for referenced documents plus the format resolvers
pub struct SchemaTransformer {
    loader: Box<dyn DocumentLoader>,
    formats: FormatRegistry,
}

impl SchemaTransformer {
    pub fn new(loader: Box<dyn DocumentLoader>, formats: FormatRegistry) -> Self {
        Self { loader, formats }
    }

    /// Filesystem loader and format registry as configured
    pub fn from_config(config: &TypeGraphConfig) -> Self {
        Self::new(
            Box::new(FsLoader::from_config(&config.loader)),
            config.formats.registry(),
        )
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn loader(&self) -> &dyn DocumentLoader {
        self.loader.as_ref()
    }

    /// Transform a document and resolve every reference in the result.
    ///
    /// Each call runs in a fresh session: documents referenced by a previous
    /// call are loaded again.
    pub fn transform(
        &self,
        name: Option<&str>,
        document: Option<DocumentId>,
        value: &SchemaValue,
    ) -> Result<TypeGraph> {
        let mut graph = self.transform_unresolved(name, document, value)?;
        if let Some(root) = graph.root_id() {
            graph.resolve_refs(root);
        }
        Ok(graph)
    }

    /// Transform without the reference resolution pass; edges to targets
    /// not yet seen are left pending.
    pub fn transform_unresolved(
        &self,
        name: Option<&str>,
        document: Option<DocumentId>,
        value: &SchemaValue,
    ) -> Result<TypeGraph> {
        let mut session = Session::new(self.loader.as_ref(), &self.formats);
        let root = session.transform_document(name, document, value)?;
        debug!(nodes = session.graph().len(), "Transform complete");
        Ok(session.finish(root))
    }

    /// Load a document through the loader, then [`transform`](Self::transform) it
    pub fn transform_location(&self, location: &str) -> Result<TypeGraph> {
        let document = self.loader.resolve(None, location)?;
        let value = self.loader.load(&document)?;
        self.transform(None, Some(document), &value)
    }
}

impl std::fmt::Debug for SchemaTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaTransformer")
            .field("formats", &self.formats.len())
            .finish_non_exhaustive()
    }
}
