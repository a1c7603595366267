//! Reference Resolution
//!
//! `$ref` values are split into a document location and a fragment. An
//! empty location refers to the current document. Fragments are bound
//! lazily: the target may not exist yet (forward and circular references)
//! and is looked up by [`TypeGraph::force`](crate::graph::TypeGraph::force)
//! once the whole document has been walked.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::graph::{Issue, LazyRef, ScopeId, TypeId, TypeRef};
use crate::session::{DocumentState, Session};
use crate::value::{SchemaObject, SchemaValue, Token};

const JSCH_REF: &str = "$ref";

static URI_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*):").unwrap());

/// A `$ref` split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RefParts<'s> {
    pub location: &'s str,
    /// `None` when the reference has no `#`
    pub fragment: Option<String>,
}

/// Split `doc.json#/definitions/A` into location and fragment. A
/// `/properties/` segment is dropped, since member types are registered
/// directly under their owner's path.
pub(crate) fn split_ref(raw: &str) -> RefParts<'_> {
    match raw.split_once('#') {
        Some((location, fragment)) => RefParts {
            location,
            fragment: Some(fragment.replace("/properties/", "/")),
        },
        None => RefParts {
            location: raw,
            fragment: None,
        },
    }
}

/// URI scheme of a location, if it has one. Single letters are drive
/// letters, not schemes.
pub(crate) fn uri_scheme(location: &str) -> Option<&str> {
    URI_SCHEME
        .captures(location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|scheme| scheme.len() > 1)
}

impl Session<'_> {
    /// Resolve the `$ref` of `schema`, if it has one.
    ///
    /// Problems with the reference itself (wrong type, unsupported scheme,
    /// unreadable document) yield an errant type carrying an issue. Only a
    /// fatal error in a referenced document is returned as `Err`.
    pub(crate) fn find_reference(
        &mut self,
        scope: ScopeId,
        reporter: Option<TypeId>,
        schema: &SchemaObject,
    ) -> Result<Option<TypeRef>> {
        let Some(spanned) = schema.get_spanned(JSCH_REF) else {
            return Ok(None);
        };
        let token = spanned.token;
        let raw = match &spanned.value {
            SchemaValue::String(raw) => raw.as_str(),
            _ => {
                return Ok(Some(self.bad_reference(
                    scope,
                    "ref",
                    token,
                    "'$ref' must be a string".to_string(),
                )))
            }
        };

        if let Some(found) = self.graph.lookup_id(scope, raw) {
            return Ok(Some(found));
        }

        let parts = split_ref(raw);
        if let Some(scheme) = uri_scheme(parts.location).filter(|s| *s != "file") {
            return Ok(Some(self.bad_reference(
                scope,
                raw,
                token,
                format!("Unsupported URI scheme '{}' in '$ref': {}", scheme, raw),
            )));
        }

        if parts.location.is_empty() {
            return Ok(Some(self.local_reference(scope, reporter, parts.fragment, token)));
        }
        self.foreign_reference(scope, reporter, raw, &parts, token)
            .map(Some)
    }

    fn local_reference(
        &mut self,
        scope: ScopeId,
        reporter: Option<TypeId>,
        fragment: Option<String>,
        token: Option<Token>,
    ) -> TypeRef {
        let fragment = fragment.unwrap_or_default();
        if fragment.is_empty() || fragment == "/" {
            let cached = self
                .graph
                .scope(scope)
                .document()
                .and_then(|d| self.cached_root(d))
                .or_else(|| self.graph.scope(scope).root())
                .cloned();
            if let Some(root) = cached {
                return root;
            }
        }
        let lazy = self.graph.add_lazy(LazyRef::new(scope, fragment, reporter, token));
        TypeRef::lazy(lazy)
    }

    fn foreign_reference(
        &mut self,
        scope: ScopeId,
        reporter: Option<TypeId>,
        raw: &str,
        parts: &RefParts<'_>,
        token: Option<Token>,
    ) -> Result<TypeRef> {
        let base = self.graph.scope(scope).document().cloned();
        let document = match self.loader.resolve(base.as_ref(), parts.location) {
            Ok(document) => document,
            Err(err) => {
                return Ok(self.bad_reference(
                    scope,
                    raw,
                    token,
                    format!("Cannot resolve '$ref' {}: {}", raw, err),
                ))
            }
        };

        let target = match self.document_state(&document) {
            DocumentState::Cached(target) => target,
            DocumentState::InProgress(target) => {
                let fragment = parts.fragment.clone().unwrap_or_default();
                let lazy = self
                    .graph
                    .add_lazy(LazyRef::new(target, fragment, reporter, token));
                return Ok(TypeRef::lazy(lazy));
            }
            DocumentState::Unknown => {
                debug!(document = %document, "Loading referenced document");
                let value = match self.loader.load(&document) {
                    Ok(value) => value,
                    Err(err) => {
                        return Ok(self.bad_reference(
                            scope,
                            raw,
                            token,
                            format!("Cannot load '$ref' {}: {}", raw, err),
                        ))
                    }
                };
                let stem = document.stem().to_string();
                let root = self.transform_document(Some(&stem), Some(document.clone()), &value)?;
                match self.document_state(&document) {
                    DocumentState::Cached(target) | DocumentState::InProgress(target) => target,
                    DocumentState::Unknown => return Ok(root),
                }
            }
        };

        match parts.fragment.as_deref() {
            None | Some("") | Some("/") => {
                let root = self
                    .cached_root(&document)
                    .cloned()
                    .or_else(|| self.graph.scope(target).root().cloned());
                match root {
                    Some(root) => Ok(root),
                    None => {
                        let lazy = self
                            .graph
                            .add_lazy(LazyRef::new(target, "", reporter, token));
                        Ok(TypeRef::lazy(lazy))
                    }
                }
            }
            Some(fragment) => {
                let lazy = self
                    .graph
                    .add_lazy(LazyRef::new(target, fragment, reporter, token));
                Ok(TypeRef::lazy(lazy))
            }
        }
    }

    /// Errant stand-in for a reference that cannot be followed
    fn bad_reference(
        &mut self,
        scope: ScopeId,
        name: &str,
        token: Option<Token>,
        message: String,
    ) -> TypeRef {
        debug!(message = %message, "Unusable reference");
        let errant = self.errant(scope, name);
        if let Some(id) = errant.id() {
            self.graph.add_issue(id, Issue::error(token, message));
        }
        errant
    }
}
