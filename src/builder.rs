//! Type Graph Builder
//!
//! Derives one type per schema object, depth first. Branch order:
//!
//! 1. `format` claimed by a registered resolver -> format type
//! 2. `enum` / `const` -> enum type
//! 3. no `type`, a `$ref`, or a combination without `properties` ->
//!    reference, else combination, else dynamic
//! 4. `type` (defaulting to `object` when `properties` is present) ->
//!    structure, list or scalar; an unknown name is fatal
//!
//! Afterwards `definitions` are transformed, the result is registered by
//! qualified name and declared id, and a document root is cached in the
//! session. Structures and lists are registered before their members are
//! built so recursive references can find them.

use tracing::{trace, warn};

use crate::attributes::{either_true, TypeAttributes};
use crate::error::{Result, TransformError};
use crate::graph::{
    BasicKind, Issue, ListType, ScopeId, StructureType, TypeId, TypeKind, TypeNode, TypeRef,
};
use crate::naming::join_path;
use crate::session::Session;
use crate::value::{SchemaObject, SchemaValue, Token};

const JSCH_TYPE: &str = "type";
const JSCH_ID: &str = "$id";
const JSCH_LEGACY_ID: &str = "id";
const JSCH_REF: &str = "$ref";
const JSCH_ENUM: &str = "enum";
const JSCH_CONST: &str = "const";
const JSCH_FORMAT: &str = "format";
const JSCH_NULLABLE: &str = "nullable";
const JSCH_ITEMS: &str = "items";
pub(crate) const JSCH_ALL_OF: &str = "allOf";
pub(crate) const JSCH_ONE_OF: &str = "oneOf";
pub(crate) const JSCH_ANY_OF: &str = "anyOf";
pub(crate) const JSCH_REQUIRED: &str = "required";
pub(crate) const JSCH_PROPERTIES: &str = "properties";
pub(crate) const JSCH_DEFINITIONS: &str = "definitions";
const JSCH_DEFS: &str = "$defs";

// =============================================================================
// Schema Accessors
// =============================================================================

/// The `type` keyword, with `["x", "null"]` arrays folded into a type name
/// plus a nullable flag. Of several non-null entries the last one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeclaredType<'s> {
    pub name: Option<&'s str>,
    pub token: Option<Token>,
    pub nullable: Option<bool>,
}

pub(crate) fn declared_type(schema: &SchemaObject) -> DeclaredType<'_> {
    let Some(spanned) = schema.get_spanned(JSCH_TYPE) else {
        return DeclaredType { name: None, token: None, nullable: None };
    };
    match &spanned.value {
        SchemaValue::String(name) => DeclaredType {
            name: Some(name.as_str()),
            token: spanned.token,
            nullable: None,
        },
        SchemaValue::Array(entries) => {
            let names: Vec<&str> = entries.iter().filter_map(|e| e.value.as_str()).collect();
            let has_null = names.contains(&"null");
            let name = names
                .iter()
                .rev()
                .find(|n| **n != "null")
                .copied()
                .or_else(|| has_null.then_some("null"));
            DeclaredType {
                name,
                token: spanned.token,
                nullable: has_null.then_some(true),
            }
        }
        _ => DeclaredType { name: None, token: spanned.token, nullable: None },
    }
}

/// `$id`, or the legacy `id` when `$id` is absent
pub(crate) fn declared_id(schema: &SchemaObject) -> Option<(&str, Option<Token>)> {
    schema
        .get_str(JSCH_ID)
        .map(|id| (id, schema.token(JSCH_ID)))
        .or_else(|| {
            schema
                .get_str(JSCH_LEGACY_ID)
                .map(|id| (id, schema.token(JSCH_LEGACY_ID)))
        })
}

pub(crate) fn has_properties(schema: &SchemaObject) -> bool {
    schema.get_object(JSCH_PROPERTIES).is_some()
}

pub(crate) fn has_combination(schema: &SchemaObject) -> bool {
    schema.contains_key(JSCH_ALL_OF)
        || schema.contains_key(JSCH_ONE_OF)
        || schema.contains_key(JSCH_ANY_OF)
}

fn is_combination(schema: &SchemaObject) -> bool {
    has_combination(schema) && !has_properties(schema)
}

/// A branch holding nothing but `required`
pub(crate) fn is_required_only(schema: &SchemaObject) -> bool {
    schema.len() == 1 && schema.contains_key(JSCH_REQUIRED)
}

pub(crate) fn required_names(schema: &SchemaObject) -> Vec<String> {
    schema
        .get_array(JSCH_REQUIRED)
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.value.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn basic_kind(name: &str) -> Option<BasicKind> {
    match name {
        "string" => Some(BasicKind::String),
        "number" => Some(BasicKind::Number),
        "integer" => Some(BasicKind::Integer),
        "boolean" => Some(BasicKind::Boolean),
        "null" => Some(BasicKind::Null),
        "dynamic" | "any" => Some(BasicKind::Dynamic),
        _ => None,
    }
}

/// Work left after a node is registered
enum Populate {
    Members(TypeId),
    Component(TypeId),
    Nothing,
}

// =============================================================================
// Builder
// =============================================================================

impl Session<'_> {
    /// Derive the type of one schema object.
    ///
    /// `path` is the qualified name the result is registered under (empty
    /// for a document root). `forced_nullable` comes from an enclosing
    /// construct such as a `[T, null]` union.
    pub(crate) fn transform_type(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        name: &str,
        schema: &SchemaObject,
        forced_nullable: Option<bool>,
    ) -> Result<TypeRef> {
        let declared = declared_type(schema);
        let nullable = either_true(
            either_true(forced_nullable, declared.nullable),
            schema.get_bool(JSCH_NULLABLE),
        );
        let attributes = TypeAttributes::from_schema(nullable, schema);
        let type_name = declared
            .name
            .or_else(|| has_properties(schema).then_some("object"));
        let is_root = parent.is_none() && path.is_empty();
        let definitions_path = join_path(path, JSCH_DEFINITIONS);

        let format = schema
            .get_str(JSCH_FORMAT)
            .and_then(|tag| self.formats.resolve(tag));

        let (result, fresh, populate) = if let Some(format) = format {
            let tag = format.format.clone();
            let id = self.create(scope, parent, path, &tag, attributes, TypeKind::Format(format));
            self.add_definitions(scope, id, &definitions_path, schema)?;
            (TypeRef::node(id), true, Populate::Nothing)
        } else if schema.contains_key(JSCH_ENUM) || schema.contains_key(JSCH_CONST) {
            let result = self.derive_enum(scope, parent, path, name, schema, attributes);
            if let Some(id) = result.id().filter(|_| !self.graph.is_errant(&result)) {
                self.add_definitions(scope, id, &definitions_path, schema)?;
            }
            self.transfer_errant_issues(parent, &result, schema);
            (result, true, Populate::Nothing)
        } else if type_name.is_none() || schema.contains_key(JSCH_REF) || is_combination(schema) {
            if is_root && schema.contains_key(JSCH_REF) {
                let document = self.graph.scope(scope).document().cloned();
                let id = self.graph.add_errant(name, document);
                self.graph.add_issue(
                    id,
                    Issue::error(schema.token(JSCH_REF), "'$ref' not allowed at root level"),
                );
                (TypeRef::node(id), true, Populate::Nothing)
            } else {
                let definitions =
                    self.transform_definitions(scope, parent, &definitions_path, schema)?;
                let (found, fresh) = match self.find_reference(scope, parent, schema)? {
                    Some(reference) => (reference, false),
                    None => {
                        let combined = self.transform_combination(
                            scope, parent, path, name, schema, nullable,
                        )?;
                        match combined {
                            Some(combined) => (combined, true),
                            None => (self.dynamic(scope, parent, path), true),
                        }
                    }
                };
                let result = found.with_attributes(&attributes);
                self.adopt_definitions(parent, &result, fresh, definitions);
                self.transfer_errant_issues(parent, &result, schema);
                (result, fresh, Populate::Nothing)
            }
        } else {
            let type_name = type_name.unwrap_or_default();
            let (kind, node_name) = match type_name {
                "object" => (TypeKind::Structure(StructureType::default()), name),
                "array" => (TypeKind::List(ListType::default()), name),
                other => match basic_kind(other) {
                    Some(kind) => (TypeKind::Basic(kind), kind.as_str()),
                    None => {
                        return Err(TransformError::IllegalTypeName {
                            name: other.to_string(),
                            token: declared.token,
                        })
                    }
                },
            };
            let (members, component) = (
                matches!(kind, TypeKind::Structure(_)),
                matches!(kind, TypeKind::List(_)),
            );
            let id = self.create(scope, parent, path, node_name, attributes, kind);
            self.add_definitions(scope, id, &definitions_path, schema)?;
            let populate = if members {
                Populate::Members(id)
            } else if component {
                Populate::Component(id)
            } else {
                Populate::Nothing
            };
            (TypeRef::node(id), true, populate)
        };

        self.register(scope, parent, path, &result, fresh, schema);
        if is_root {
            self.graph.set_scope_root(scope, result.clone());
            if let Some(document) = self.graph.scope(scope).document().cloned() {
                self.cache_root(document, result.clone());
            }
        }
        if fresh {
            if let Some(id) = result.id() {
                self.graph.node_mut(id).schema_origin = true;
            }
        }

        match populate {
            Populate::Members(id) => self.add_properties(scope, id, path, schema)?,
            Populate::Component(id) => self.assign_component(scope, id, path, name, schema)?,
            Populate::Nothing => {}
        }
        Ok(result)
    }

    // =========================================================================
    // Node creation
    // =========================================================================

    pub(crate) fn create(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        name: &str,
        attributes: TypeAttributes,
        kind: TypeKind,
    ) -> TypeId {
        let document = self.graph.scope(scope).document().cloned();
        self.graph.add_node(
            TypeNode::new(name, path, parent, attributes, kind).with_document(document),
        )
    }

    pub(crate) fn dynamic(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
    ) -> TypeRef {
        let kind = BasicKind::Dynamic;
        TypeRef::node(self.create(
            scope,
            parent,
            path,
            kind.as_str(),
            TypeAttributes::default(),
            TypeKind::Basic(kind),
        ))
    }

    pub(crate) fn errant(&mut self, scope: ScopeId, name: &str) -> TypeRef {
        let document = self.graph.scope(scope).document().cloned();
        TypeRef::node(self.graph.add_errant(name, document))
    }

    /// Record a nested declaration (structure, list, enum or union built
    /// inline under `parent`) as a named child of `parent`
    pub(crate) fn adopt_child(&mut self, parent: TypeId, name: &str, ty: &TypeRef) {
        let Some(id) = ty.id() else { return };
        let node = self.graph.node(id);
        let declares = matches!(
            node.kind(),
            TypeKind::Structure(_) | TypeKind::List(_) | TypeKind::Enum(_) | TypeKind::Union(_)
        );
        if declares && node.parent() == Some(parent) {
            self.graph.add_child(parent, name, id);
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    fn register(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        result: &TypeRef,
        fresh: bool,
        schema: &SchemaObject,
    ) {
        let reporter = parent.or_else(|| result.id().filter(|_| fresh));

        if !path.is_empty() {
            if fresh {
                trace!(path = %path, "Registering type");
                let registered = self
                    .graph
                    .scope_mut(scope)
                    .register_path(path, result.clone());
                if let Err(existing) = registered {
                    let existing = self.graph.type_name(&existing);
                    warn!(path = %path, existing = %existing, "Duplicate qualified name");
                    self.graph.report(
                        scope,
                        reporter,
                        Issue::error(
                            None,
                            format!("Type name '{}' already assigned to type '{}'", path, existing),
                        ),
                    );
                }
            } else {
                trace!(path = %path, "Registering alias");
                self.graph.scope_mut(scope).alias_path(path, result.clone());
            }
        }

        let Some((id, token)) = declared_id(schema) else { return };
        if id.is_empty() {
            self.graph.report(
                scope,
                reporter,
                Issue::error(token, "Relative 'id' is invalid: empty"),
            );
            return;
        }
        if let Some(existing) = self.graph.lookup_id(scope, id) {
            if existing.target != result.target {
                let existing = self.graph.type_name(&existing);
                warn!(id = %id, existing = %existing, "Duplicate id");
                self.graph.report(
                    scope,
                    reporter,
                    Issue::error(
                        token,
                        format!("Id '{}' already assigned to type '{}'", id, existing),
                    ),
                );
            }
            return;
        }
        trace!(id = %id, "Registering id");
        let _ = self.graph.scope_mut(scope).register_id(id, result.clone());
        if fresh {
            if let Some(node) = result.id() {
                self.graph.node_mut(node).declared_id = Some(id.to_string());
            }
        }
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Transform `definitions` (or `$defs`) entries under `path`
    fn transform_definitions(
        &mut self,
        scope: ScopeId,
        owner: Option<TypeId>,
        path: &str,
        schema: &SchemaObject,
    ) -> Result<Vec<TypeRef>> {
        let Some(definitions) = schema
            .get_object(JSCH_DEFINITIONS)
            .or_else(|| schema.get_object(JSCH_DEFS))
        else {
            return Ok(Vec::new());
        };

        let mut result = Vec::with_capacity(definitions.len());
        for (key, spanned) in definitions.iter() {
            let definition_path = join_path(path, key);
            match &spanned.value {
                SchemaValue::Object(obj) => {
                    let ty = self.transform_type(scope, owner, &definition_path, key, obj, None)?;
                    if let Some(id) = ty.id() {
                        let node = self.graph.node_mut(id);
                        if node.qualified_name == definition_path && node.token.is_none() {
                            node.token = spanned.token;
                        }
                    }
                    result.push(ty);
                }
                _ => self.graph.report(
                    scope,
                    owner,
                    Issue::error(
                        spanned.token,
                        format!("Expecting '{{' for schema of definition '{}'", key),
                    ),
                ),
            }
        }
        Ok(result)
    }

    fn add_definitions(
        &mut self,
        scope: ScopeId,
        owner: TypeId,
        path: &str,
        schema: &SchemaObject,
    ) -> Result<()> {
        let definitions = self.transform_definitions(scope, Some(owner), path, schema)?;
        self.graph.node_mut(owner).definitions.extend(definitions);
        Ok(())
    }

    /// Hang definitions transformed ahead of their owner onto it. A shared
    /// reference target is never modified; its definitions go to the parent.
    fn adopt_definitions(
        &mut self,
        parent: Option<TypeId>,
        result: &TypeRef,
        fresh: bool,
        definitions: Vec<TypeRef>,
    ) {
        if definitions.is_empty() {
            return;
        }
        let owner = result
            .id()
            .filter(|id| fresh && !self.graph.node(*id).is_errant())
            .or(parent);
        let Some(owner) = owner else { return };
        for definition in &definitions {
            if let Some(id) = definition.id() {
                self.graph.attach(id, owner);
            }
        }
        self.graph.node_mut(owner).definitions.extend(definitions);
    }

    /// Re-raise an errant result's issues on the owner, at the `$ref`
    pub(crate) fn transfer_errant_issues(
        &mut self,
        parent: Option<TypeId>,
        result: &TypeRef,
        schema: &SchemaObject,
    ) {
        let (Some(parent), Some(id)) = (parent, result.id()) else { return };
        if id == parent || !self.graph.node(id).is_errant() {
            return;
        }
        let token = schema.token(JSCH_REF);
        let issues: Vec<Issue> = self.graph.node(id).issues.iter().map(|i| i.at(token)).collect();
        for issue in issues {
            self.graph.add_issue(parent, issue);
        }
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Members from `properties`, then the `required` set
    pub(crate) fn add_properties(
        &mut self,
        scope: ScopeId,
        id: TypeId,
        path: &str,
        schema: &SchemaObject,
    ) -> Result<()> {
        let Some(properties) = schema.get_object(JSCH_PROPERTIES) else {
            if schema.contains_key(JSCH_REQUIRED) {
                self.add_required(id, required_names(schema));
            }
            return Ok(());
        };

        for (key, spanned) in properties.iter() {
            let member_path = join_path(path, key);
            let existing = self
                .graph
                .node(id)
                .as_structure()
                .and_then(|s| s.members.get(key))
                .map(|m| m.ty.clone());
            if existing.is_some() {
                self.graph.scope_mut(scope).remove_path(&member_path);
            }

            let ty = match &spanned.value {
                SchemaValue::Object(obj) => {
                    self.transform_type(scope, Some(id), &member_path, key, obj, None)?
                }
                SchemaValue::Bool(true) => self.dynamic(scope, Some(id), &member_path),
                _ => {
                    self.graph.add_issue(
                        id,
                        Issue::error(
                            spanned.token,
                            format!("Expecting '{{' for schema of property '{}'", key),
                        ),
                    );
                    self.errant(scope, key)
                }
            };
            let ty = match existing {
                Some(existing) => {
                    self.merge_member(scope, id, &member_path, key, existing, ty, spanned.token)
                }
                None => {
                    self.adopt_child(id, key, &ty);
                    ty
                }
            };
            if let TypeKind::Structure(structure) = &mut self.graph.node_mut(id).kind {
                structure.add_member(key.clone(), ty, spanned.token);
            }
        }
        self.add_required(id, required_names(schema));
        Ok(())
    }

    /// Fold a repeated member (e.g. refined by a later `allOf` branch) into
    /// the one already declared. Dynamic gives way to the more specific
    /// type; types that cannot be merged are an error and become dynamic.
    #[allow(clippy::too_many_arguments)]
    fn merge_member(
        &mut self,
        scope: ScopeId,
        id: TypeId,
        member_path: &str,
        key: &str,
        existing: TypeRef,
        ty: TypeRef,
        token: Option<Token>,
    ) -> TypeRef {
        let merged = if self.is_dynamic(&ty) || self.same_reference(&existing, &ty) {
            Some(existing.clone())
        } else if self.is_dynamic(&existing) {
            Some(ty.clone())
        } else {
            self.graph.merge_types(&existing, &ty)
        };

        let merged = match merged {
            Some(merged) => merged,
            None => {
                let (before, after) = (self.graph.type_name(&existing), self.graph.type_name(&ty));
                warn!(member = %key, existing = %before, other = %after, "Member types disagree");
                self.graph.add_issue(
                    id,
                    Issue::error(
                        token,
                        format!("Types disagree for '{}': {} vs: {}", key, after, before),
                    ),
                );
                self.dynamic(scope, Some(id), member_path)
            }
        };

        let superseded = existing
            .id()
            .filter(|old| merged.id() != Some(*old))
            .is_some_and(|old| self.graph.node(id).children.get(key) == Some(&old));
        if superseded {
            self.graph.node_mut(id).children.shift_remove(key);
        }
        self.adopt_child(id, key, &merged);
        self.graph.scope_mut(scope).replace_path(member_path, merged.clone());
        merged
    }

    fn is_dynamic(&self, ty: &TypeRef) -> bool {
        ty.id()
            .and_then(|id| self.graph.node(id).as_basic())
            .is_some_and(|kind| kind == BasicKind::Dynamic)
    }

    /// Two pending references to the same fragment of the same document
    fn same_reference(&self, a: &TypeRef, b: &TypeRef) -> bool {
        if a.target == b.target {
            return true;
        }
        match (a.lazy_id(), b.lazy_id()) {
            (Some(x), Some(y)) => {
                let (x, y) = (self.graph.lazy(x), self.graph.lazy(y));
                x.scope == y.scope && x.fragment == y.fragment
            }
            _ => false,
        }
    }

    pub(crate) fn add_required(&mut self, id: TypeId, names: Vec<String>) {
        if let TypeKind::Structure(structure) = &mut self.graph.node_mut(id).kind {
            structure.add_required(names);
        }
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    /// Component type from `items`: a schema, or a list of schemas that must
    /// all agree (else dynamic). No `items` means dynamic.
    fn assign_component(
        &mut self,
        scope: ScopeId,
        id: TypeId,
        path: &str,
        name: &str,
        schema: &SchemaObject,
    ) -> Result<()> {
        let items_path = join_path(path, JSCH_ITEMS);
        let component = match schema.get_spanned(JSCH_ITEMS) {
            None => self.dynamic(scope, Some(id), &items_path),
            Some(spanned) => match &spanned.value {
                SchemaValue::Object(obj) => {
                    let ty = self.transform_type(scope, Some(id), &items_path, name, obj, None)?;
                    self.adopt_child(id, name, &ty);
                    ty
                }
                SchemaValue::Array(entries) => {
                    let mut common: Option<TypeRef> = None;
                    let mut agree = true;
                    for (i, entry) in entries.iter().enumerate() {
                        let Some(obj) = entry.value.as_object() else {
                            agree = false;
                            break;
                        };
                        let entry_path = join_path(&items_path, &i.to_string());
                        let part = self.transform_type(scope, Some(id), &entry_path, name, obj, None)?;
                        match &common {
                            None => common = Some(part),
                            Some(first) if self.graph.same_type(first, &part) => {}
                            Some(_) => {
                                agree = false;
                                break;
                            }
                        }
                    }
                    match common {
                        Some(common) if agree => {
                            self.adopt_child(id, name, &common);
                            common
                        }
                        _ => self.dynamic(scope, Some(id), &items_path),
                    }
                }
                _ => {
                    self.graph.add_issue(
                        id,
                        Issue::error(
                            spanned.token,
                            "Expecting '{' or '[' for object or array to contain array component type",
                        ),
                    );
                    self.errant(scope, name)
                }
            },
        };
        if let TypeKind::List(list) = &mut self.graph.node_mut(id).kind {
            list.component = Some(component);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: serde_json::Value) -> SchemaObject {
        match SchemaValue::from(value) {
            SchemaValue::Object(obj) => obj,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_declared_type_string() {
        let schema = obj(json!({"type": "string"}));
        let declared = declared_type(&schema);
        assert_eq!(declared.name, Some("string"));
        assert_eq!(declared.nullable, None);
    }

    #[test]
    fn test_declared_type_array() {
        let schema = obj(json!({"type": ["integer", "null"]}));
        let declared = declared_type(&schema);
        assert_eq!(declared.name, Some("integer"));
        assert_eq!(declared.nullable, Some(true));

        let schema = obj(json!({"type": ["null"]}));
        assert_eq!(declared_type(&schema).name, Some("null"));

        let schema = obj(json!({"type": ["string", "integer"]}));
        assert_eq!(declared_type(&schema).name, Some("integer"));
        assert_eq!(declared_type(&schema).nullable, None);

        let schema = obj(json!({"type": ["boolean", "null", "number"]}));
        assert_eq!(declared_type(&schema).name, Some("number"));
        assert_eq!(declared_type(&schema).nullable, Some(true));
    }

    #[test]
    fn test_declared_id_prefers_dollar_id() {
        let schema = obj(json!({"$id": "#a", "id": "b"}));
        assert_eq!(declared_id(&schema).map(|(id, _)| id), Some("#a"));
        let schema = obj(json!({"id": "b"}));
        assert_eq!(declared_id(&schema).map(|(id, _)| id), Some("b"));
        let schema = obj(json!({"id": 5}));
        assert!(declared_id(&schema).is_none());
    }

    #[test]
    fn test_combination_detection() {
        assert!(is_combination(&obj(json!({"anyOf": []}))));
        assert!(!is_combination(&obj(json!({"anyOf": [], "properties": {}}))));
        assert!(is_required_only(&obj(json!({"required": ["a"]}))));
        assert!(!is_required_only(&obj(json!({"required": ["a"], "type": "object"}))));
        assert_eq!(required_names(&obj(json!({"required": ["a", 1, "b"]}))), vec!["a", "b"]);
    }

    #[test]
    fn test_basic_kind_names() {
        assert_eq!(basic_kind("integer"), Some(BasicKind::Integer));
        assert_eq!(basic_kind("any"), Some(BasicKind::Dynamic));
        assert_eq!(basic_kind("bogus"), None);
    }
}
