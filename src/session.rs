//! Transform Session
//!
//! State shared by one top-level transform and every nested transform it
//! triggers through cross-document `$ref`s:
//! - The graph arena all documents are built into
//! - A LIFO stack of active transformers (one scope per document transform)
//! - A cache of document identity -> root type
//!
//! The cache lives only while the stack is non-empty. When the last
//! transformer pops, it is cleared, so a later top-level call on the same
//! session reloads every referenced document. Declared ids are likewise
//! only visible within the top-level call that registered them.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::format::FormatRegistry;
use crate::graph::{Issue, ScopeId, Scope, TypeGraph, TypeId, TypeRef};
use crate::loader::{DocumentId, DocumentLoader};
use crate::recognize::is_schema;
use crate::value::{SchemaObject, SchemaValue};

const JSCH_NAME: &str = "name";
const JSCH_SYNTHETIC: &str = "synthetic";
const DEFAULT_ROOT_NAME: &str = "Root";

/// What the session knows about a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentState {
    /// Transformed; its root is cached
    Cached(ScopeId),
    /// Transform started further up the stack, root not known yet
    InProgress(ScopeId),
    Unknown,
}

/// Context object threaded through one top-level transform
pub struct Session<'a> {
    pub(crate) graph: TypeGraph,
    stack: Vec<ScopeId>,
    cache: HashMap<DocumentId, TypeRef>,
    documents: HashMap<DocumentId, ScopeId>,
    pub(crate) formats: &'a FormatRegistry,
    pub(crate) loader: &'a dyn DocumentLoader,
}

impl<'a> Session<'a> {
    pub fn new(loader: &'a dyn DocumentLoader, formats: &'a FormatRegistry) -> Self {
        Self {
            graph: TypeGraph::new(),
            stack: Vec::new(),
            cache: HashMap::new(),
            documents: HashMap::new(),
            formats,
            loader,
        }
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// Number of active transformers
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Hand over the graph with `root` as its top-level type
    pub fn finish(mut self, root: TypeRef) -> TypeGraph {
        self.graph.set_root(root);
        self.graph
    }

    // =========================================================================
    // Transformer stack
    // =========================================================================

    /// New transformer scope for a document. A scope opened while no
    /// transformer is active starts a new top-level call.
    pub fn open_scope(&mut self, document: Option<DocumentId>) -> ScopeId {
        if self.stack.is_empty() {
            self.graph.begin_call();
        }
        self.graph.add_scope(Scope::new(document))
    }

    pub fn push_transformer(&mut self, scope: ScopeId) {
        self.stack.push(scope);
        debug!(scope = scope.index(), depth = self.stack.len(), "Pushed transformer");
    }

    /// Pop the top transformer, which must be `expected`. The document cache
    /// is cleared once the stack is empty.
    pub fn pop_transformer(&mut self, expected: ScopeId) -> Result<()> {
        let popped = self.stack.pop();
        if self.stack.is_empty() {
            self.cache.clear();
            self.documents.clear();
            debug!("Transformer stack empty, cleared document cache");
        }
        match popped {
            Some(top) if top == expected => {
                debug!(scope = top.index(), depth = self.stack.len(), "Popped transformer");
                Ok(())
            }
            other => Err(TransformError::SessionStackMismatch {
                expected: format!("scope {}", expected.index()),
                actual: other
                    .map(|s| format!("scope {}", s.index()))
                    .unwrap_or_else(|| "empty stack".to_string()),
            }),
        }
    }

    // =========================================================================
    // Document cache
    // =========================================================================

    pub fn cached_root(&self, document: &DocumentId) -> Option<&TypeRef> {
        self.cache.get(document)
    }

    pub(crate) fn cache_root(&mut self, document: DocumentId, root: TypeRef) {
        debug!(document = %document, "Cached document root");
        self.cache.insert(document, root);
    }

    pub(crate) fn document_state(&self, document: &DocumentId) -> DocumentState {
        let scope = match self.documents.get(document) {
            Some(scope) => *scope,
            None => return DocumentState::Unknown,
        };
        match self.cache.get(document) {
            Some(root) if !self.graph.is_errant(root) => DocumentState::Cached(scope),
            Some(_) => DocumentState::Unknown,
            None => DocumentState::InProgress(scope),
        }
    }

    // =========================================================================
    // Top-level transform
    // =========================================================================

    /// Transform a whole document. Input that is not recognised as a schema
    /// yields an errant root carrying one error. Transforming a document
    /// already cached in this top-level call returns the cached root.
    pub fn transform_document(
        &mut self,
        name: Option<&str>,
        document: Option<DocumentId>,
        value: &SchemaValue,
    ) -> Result<TypeRef> {
        let schema = match value.as_object().filter(|obj| is_schema(obj)) {
            Some(schema) => schema,
            None => return Ok(self.not_a_schema(name, document)),
        };
        let name = document_name(name, document.as_ref(), schema);

        let stale = match document.as_ref().and_then(|d| self.cache.get(d)) {
            Some(cached) if !self.graph.is_errant(cached) => {
                debug!(document = ?document, "Document already transformed");
                return Ok(cached.clone());
            }
            Some(cached) => cached.id(),
            None => None,
        };

        debug!(name = %name, document = ?document, "Transforming document");
        let scope = self.open_scope(document.clone());
        if let Some(document) = &document {
            self.documents.insert(document.clone(), scope);
        }

        self.push_transformer(scope);
        let result = self.transform_root(scope, &name, schema, stale);
        let popped = self.pop_transformer(scope);
        let root = result?;
        popped?;
        Ok(root)
    }

    fn transform_root(
        &mut self,
        scope: ScopeId,
        name: &str,
        schema: &SchemaObject,
        stale: Option<TypeId>,
    ) -> Result<TypeRef> {
        let root = self.transform_type(scope, None, "", name, schema, None)?;
        if let Some(id) = root.id() {
            if schema.get_bool(JSCH_SYNTHETIC) == Some(true) {
                self.graph.node_mut(id).synthetic = true;
            }
            if let Some(stale) = stale.filter(|s| *s != id) {
                let moved = std::mem::take(&mut self.graph.node_mut(stale).issues);
                for issue in moved {
                    self.graph.add_issue(id, issue);
                }
            }
        }
        Ok(root)
    }

    fn not_a_schema(&mut self, name: Option<&str>, document: Option<DocumentId>) -> TypeRef {
        let source = document
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "<inline>".to_string());
        let name = name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| document.as_ref().map(|d| d.stem().to_string()))
            .unwrap_or_else(|| DEFAULT_ROOT_NAME.to_string());
        let errant = self.graph.add_errant(&name, document);
        self.graph.add_issue(
            errant,
            Issue::error(
                None,
                format!("The Json object from '{}' does not contain a '$schema' element.", source),
            ),
        );
        TypeRef::node(errant)
    }
}

/// Caller's name, else the document's `name` key, else the file stem
fn document_name(name: Option<&str>, document: Option<&DocumentId>, schema: &SchemaObject) -> String {
    name.filter(|n| !n.is_empty())
        .or_else(|| schema.get_str(JSCH_NAME).filter(|n| !n.is_empty()))
        .or_else(|| document.map(|d| d.stem()).filter(|n| !n.is_empty()))
        .unwrap_or(DEFAULT_ROOT_NAME)
        .to_string()
}
