//! Transformer Scopes
//!
//! Every document transform owns a scope: the qualified-name and id
//! registries that local `$ref` fragments are looked up in. Scopes outlive
//! the transform that filled them so lazy references can be forced later.

use std::collections::HashMap;

use super::issues::Issue;
use super::node::TypeRef;
use crate::loader::DocumentId;

/// Index of a scope in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

impl ScopeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Registries of one document transform
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub(crate) document: Option<DocumentId>,
    pub(crate) root: Option<TypeRef>,
    /// Top-level call the scope was opened in
    pub(crate) call: usize,
    pub(crate) by_path: HashMap<String, TypeRef>,
    pub(crate) by_id: HashMap<String, TypeRef>,
    /// Issues raised before the root exists
    pub(crate) pending: Vec<Issue>,
}

impl Scope {
    pub fn new(document: Option<DocumentId>) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    pub fn document(&self) -> Option<&DocumentId> {
        self.document.as_ref()
    }

    pub fn root(&self) -> Option<&TypeRef> {
        self.root.as_ref()
    }

    pub fn lookup_path(&self, path: &str) -> Option<&TypeRef> {
        self.by_path.get(path)
    }

    pub fn lookup_id(&self, id: &str) -> Option<&TypeRef> {
        self.by_id.get(id_key(id))
    }

    /// Register a node under its own qualified name. On collision the first
    /// registration stays and is returned.
    pub fn register_path(&mut self, path: &str, ty: TypeRef) -> Result<(), TypeRef> {
        match self.by_path.get(path) {
            Some(existing) if existing.target != ty.target => Err(existing.clone()),
            Some(_) => Ok(()),
            None => {
                self.by_path.insert(path.to_string(), ty);
                Ok(())
            }
        }
    }

    /// Register a shared or pending type under a path if the path is free
    pub fn alias_path(&mut self, path: &str, ty: TypeRef) {
        self.by_path.entry(path.to_string()).or_insert(ty);
    }

    /// Drop a path registration so the path can be registered again
    pub fn remove_path(&mut self, path: &str) -> Option<TypeRef> {
        self.by_path.remove(path)
    }

    /// Point a path at a merged type, whatever it named before
    pub fn replace_path(&mut self, path: &str, ty: TypeRef) {
        self.by_path.insert(path.to_string(), ty);
    }

    /// Register a declared id. On collision the first registration stays and
    /// is returned.
    pub fn register_id(&mut self, id: &str, ty: TypeRef) -> Result<(), TypeRef> {
        let key = id_key(id);
        if let Some(existing) = self.by_id.get(key) {
            return Err(existing.clone());
        }
        self.by_id.insert(key.to_string(), ty);
        Ok(())
    }

    pub fn path_count(&self) -> usize {
        self.by_path.len()
    }
}

/// `#foo` and `foo` name the same id
fn id_key(id: &str) -> &str {
    id.strip_prefix('#').unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{LazyId, TypeId};

    #[test]
    fn test_register_path_first_wins() {
        let mut scope = Scope::new(None);
        assert!(scope.register_path("definitions.A", TypeRef::node(TypeId(1))).is_ok());
        assert!(scope.register_path("definitions.A", TypeRef::node(TypeId(1))).is_ok());

        let existing = scope
            .register_path("definitions.A", TypeRef::node(TypeId(2)))
            .unwrap_err();
        assert_eq!(existing.id(), Some(TypeId(1)));
        assert_eq!(scope.lookup_path("definitions.A").and_then(|r| r.id()), Some(TypeId(1)));
    }

    #[test]
    fn test_alias_never_overwrites() {
        let mut scope = Scope::new(None);
        scope.alias_path("a", TypeRef::lazy(LazyId(0)));
        scope.alias_path("a", TypeRef::node(TypeId(3)));
        assert!(scope.lookup_path("a").map(|r| r.is_lazy()).unwrap_or(false));
        assert_eq!(scope.path_count(), 1);
    }

    #[test]
    fn test_replace_path_overwrites() {
        let mut scope = Scope::new(None);
        scope.register_path("Thing.color", TypeRef::node(TypeId(1))).unwrap();
        scope.replace_path("Thing.color", TypeRef::node(TypeId(2)));
        assert_eq!(scope.lookup_path("Thing.color").and_then(|r| r.id()), Some(TypeId(2)));

        assert_eq!(scope.remove_path("Thing.color").and_then(|r| r.id()), Some(TypeId(2)));
        assert!(scope.register_path("Thing.color", TypeRef::node(TypeId(3))).is_ok());
    }

    #[test]
    fn test_id_hash_prefix_is_optional() {
        let mut scope = Scope::new(None);
        scope.register_id("#address", TypeRef::node(TypeId(4))).unwrap();
        assert_eq!(scope.lookup_id("address").and_then(|r| r.id()), Some(TypeId(4)));
        assert_eq!(scope.lookup_id("#address").and_then(|r| r.id()), Some(TypeId(4)));
        assert!(scope.register_id("address", TypeRef::node(TypeId(5))).is_err());
    }
}
