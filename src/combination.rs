//! Combination Transformer
//!
//! `allOf` builds a structure whose supertypes are the referenced and enum
//! branches, with the members of `properties` branches merged in directly.
//! `anyOf` and `oneOf` are treated alike and build a union of their
//! branches, except that a pair of one schema and `{"type": "null"}` is just
//! the nullable schema.

use crate::attributes::{either_true, TypeAttributes};
use crate::builder::{
    has_combination, has_properties, is_required_only, required_names, JSCH_ALL_OF, JSCH_ANY_OF,
    JSCH_ONE_OF,
};
use crate::error::Result;
use crate::graph::{ScopeId, StructureType, TypeId, TypeKind, TypeRef, UnionType};
use crate::naming::{disambiguate, join_path};
use crate::session::Session;
use crate::value::{SchemaObject, Spanned};

const JSCH_TYPE: &str = "type";
const JSCH_NULLABLE: &str = "nullable";
const JSCH_ENUM: &str = "enum";
const JSCH_CONST: &str = "const";
const TYPE_NULL: &str = "null";

fn declares_null(schema: &SchemaObject) -> bool {
    schema.get_str(JSCH_TYPE) == Some(TYPE_NULL)
}

fn branch_objects(branches: &[Spanned]) -> impl Iterator<Item = &SchemaObject> {
    branches.iter().filter_map(|b| b.value.as_object())
}

impl Session<'_> {
    /// `allOf`, else `anyOf`, else `oneOf`. `None` when the schema has none
    /// of them or no branch contributes anything.
    pub(crate) fn transform_combination(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        name: &str,
        schema: &SchemaObject,
        nullable: Option<bool>,
    ) -> Result<Option<TypeRef>> {
        if let Some(branches) = schema.get_array(JSCH_ALL_OF) {
            return self.build_hierarchy(scope, parent, path, name, branches, schema, nullable);
        }
        for key in [JSCH_ANY_OF, JSCH_ONE_OF] {
            if let Some(branches) = schema.get_array(key) {
                return self.build_union(scope, parent, path, name, branches, schema, nullable);
            }
        }
        Ok(None)
    }

    // =========================================================================
    // allOf
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    fn build_hierarchy(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        name: &str,
        branches: &[Spanned],
        schema: &SchemaObject,
        nullable: Option<bool>,
    ) -> Result<Option<TypeRef>> {
        let mut structure: Option<TypeId> = None;
        let mut contributes = false;
        let mut inner = 0;

        for branch in branch_objects(branches) {
            let id = match structure {
                Some(id) => id,
                None => {
                    let id = self.create(
                        scope,
                        parent,
                        path,
                        name,
                        TypeAttributes::from_schema(nullable, schema),
                        TypeKind::Structure(StructureType::default()),
                    );
                    structure = Some(id);
                    id
                }
            };

            if is_required_only(branch) {
                self.add_required(id, required_names(branch));
                continue;
            }

            if let Some(reference) = self.find_reference(scope, Some(id), branch)? {
                self.transfer_errant_issues(Some(id), &reference, branch);
                self.add_super(id, reference);
                contributes = true;
            } else if branch.contains_key(JSCH_ENUM) || branch.contains_key(JSCH_CONST) {
                let enum_name = format!("enum{}", inner);
                inner += 1;
                let enum_path = join_path(path, &enum_name);
                let attributes = TypeAttributes::nullable(nullable);
                let derived =
                    self.derive_enum(scope, Some(id), &enum_path, &enum_name, branch, attributes);
                self.transfer_errant_issues(Some(id), &derived, branch);
                self.adopt_child(id, &enum_name, &derived);
                self.add_super(id, derived);
                contributes = true;
            } else if has_properties(branch) {
                self.add_properties(scope, id, path, branch)?;
                let layered = TypeAttributes::from_schema(branch.get_bool(JSCH_NULLABLE), branch);
                let node = self.graph.node_mut(id);
                node.attributes = node.attributes.override_with(&layered);
                contributes = true;
            } else if has_combination(branch) {
                let combo_name = format!("Combo{}", inner);
                inner += 1;
                let combo_path = join_path(path, &combo_name);
                let combo = self.transform_combination(
                    scope,
                    Some(id),
                    &combo_path,
                    &combo_name,
                    branch,
                    nullable,
                )?;
                if let Some(combo) = combo {
                    self.transfer_errant_issues(Some(id), &combo, branch);
                    self.adopt_child(id, &combo_name, &combo);
                    self.add_super(id, combo);
                    contributes = true;
                }
            }
        }

        Ok(structure.filter(|_| contributes).map(TypeRef::node))
    }

    fn add_super(&mut self, id: TypeId, ty: TypeRef) {
        if let TypeKind::Structure(structure) = &mut self.graph.node_mut(id).kind {
            structure.add_super(ty);
        }
    }

    // =========================================================================
    // anyOf / oneOf
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    fn build_union(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        name: &str,
        branches: &[Spanned],
        schema: &SchemaObject,
        nullable: Option<bool>,
    ) -> Result<Option<TypeRef>> {
        if let Some(single) = self.single_nullable(scope, parent, path, name, branches)? {
            return Ok(Some(single));
        }

        let has_null = branch_objects(branches).any(declares_null).then_some(true);
        let union = self.create(
            scope,
            parent,
            path,
            name,
            TypeAttributes::from_schema(either_true(nullable, has_null), schema),
            TypeKind::Union(UnionType::default()),
        );

        let mut option = 0;
        let mut position = 0;
        for branch in branch_objects(branches) {
            if is_required_only(branch) {
                continue;
            }
            let synthetic = format!("Option{}", option);
            option += 1;
            // Registered by position: a reused synthetic name must not collide
            let branch_path = join_path(path, &format!("Option{}", position));
            position += 1;
            let part = self.transform_type(scope, Some(union), &branch_path, &synthetic, branch, None)?;

            let actual = self.graph.type_name(&part);
            if actual != synthetic {
                option -= 1;
            }
            self.transfer_errant_issues(Some(union), &part, branch);
            self.adopt_child(union, &actual, &part);
            if let TypeKind::Union(u) = &mut self.graph.node_mut(union).kind {
                let key = disambiguate(&actual, |k| u.constituents.contains_key(k));
                u.constituents.insert(key, part);
            }
        }

        let empty = self
            .graph
            .node(union)
            .as_union()
            .map(|u| u.constituents.is_empty())
            .unwrap_or(true);
        Ok((!empty).then(|| TypeRef::node(union)))
    }

    /// `[T, {"type": "null"}]` in either order is `T` made nullable
    fn single_nullable(
        &mut self,
        scope: ScopeId,
        parent: Option<TypeId>,
        path: &str,
        name: &str,
        branches: &[Spanned],
    ) -> Result<Option<TypeRef>> {
        let objects: Vec<&SchemaObject> = branch_objects(branches).collect();
        if branches.len() != 2 || objects.len() != 2 {
            return Ok(None);
        }
        let other = match (declares_null(objects[0]), declares_null(objects[1])) {
            (true, false) => objects[1],
            (false, true) => objects[0],
            _ => return Ok(None),
        };
        self.transform_type(scope, parent, path, name, other, Some(true))
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatRegistry;
    use crate::graph::BasicKind;
    use crate::loader::MemoryLoader;
    use crate::value::SchemaValue;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> SchemaObject {
        match SchemaValue::from(value) {
            SchemaValue::Object(obj) => obj,
            _ => panic!("expected object"),
        }
    }

    fn transform(
        session: &mut Session<'_>,
        value: serde_json::Value,
    ) -> Option<TypeRef> {
        let scope = session.open_scope(None);
        session
            .transform_combination(scope, None, "Thing", "Thing", &schema(value), None)
            .unwrap()
    }

    #[test]
    fn test_string_or_null_is_nullable_string() {
        let loader = MemoryLoader::new();
        let formats = FormatRegistry::with_defaults();
        let mut session = Session::new(&loader, &formats);

        let ty = transform(
            &mut session,
            json!({"anyOf": [{"type": "string"}, {"type": "null"}]}),
        )
        .unwrap();
        let graph = session.graph();
        assert_eq!(graph.node(ty.id().unwrap()).as_basic(), Some(BasicKind::String));
        assert_eq!(graph.effective_attributes(&ty).nullable, Some(true));
    }

    #[test]
    fn test_union_option_names() {
        let loader = MemoryLoader::new();
        let formats = FormatRegistry::with_defaults();
        let mut session = Session::new(&loader, &formats);

        let ty = transform(
            &mut session,
            json!({"oneOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}},
                {"required": ["a"]},
                {"type": "integer"},
                {"type": "array", "items": {"type": "string"}},
                {"type": "null"}
            ]}),
        )
        .unwrap();
        let graph = session.graph();
        let node = graph.node(ty.id().unwrap());
        let union = node.as_union().unwrap();
        let keys: Vec<&str> = union.constituents.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Option0", "integer", "Option1", "null"]);
        assert_eq!(node.attributes().nullable, Some(true));
        assert_eq!(node.children().len(), 2);
    }

    #[test]
    fn test_empty_union_is_absent() {
        let loader = MemoryLoader::new();
        let formats = FormatRegistry::with_defaults();
        let mut session = Session::new(&loader, &formats);
        assert!(transform(&mut session, json!({"anyOf": [{"required": ["a"]}]})).is_none());
        assert!(transform(&mut session, json!({"anyOf": []})).is_none());
    }

    #[test]
    fn test_hierarchy_with_ref_and_enum() {
        let loader = MemoryLoader::new();
        let formats = FormatRegistry::with_defaults();
        let mut session = Session::new(&loader, &formats);

        let ty = transform(
            &mut session,
            json!({"allOf": [
                {"$ref": "#/definitions/Base"},
                {"enum": ["a", "b"]},
                {"required": ["x"]}
            ]}),
        )
        .unwrap();
        let graph = session.graph();
        let structure = graph.node(ty.id().unwrap()).as_structure().unwrap();
        assert_eq!(structure.supertypes.len(), 2);
        assert!(structure.supertypes[0].is_lazy());
        let derived = graph.node(structure.supertypes[1].id().unwrap());
        assert_eq!(derived.name(), "enum0");
        assert_eq!(derived.as_enum().unwrap().constants.len(), 2);
        assert!(structure.is_required("x"));
    }

    #[test]
    fn test_hierarchy_merges_properties() {
        let loader = MemoryLoader::new();
        let formats = FormatRegistry::with_defaults();
        let mut session = Session::new(&loader, &formats);

        let ty = transform(
            &mut session,
            json!({"allOf": [
                {"properties": {"a": {"type": "string"}}},
                {"properties": {"b": {"type": "integer"}}, "nullable": true}
            ]}),
        )
        .unwrap();
        let graph = session.graph();
        let node = graph.node(ty.id().unwrap());
        let members: Vec<&str> = node
            .as_structure()
            .unwrap()
            .members
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(members, vec!["a", "b"]);
        assert_eq!(node.attributes().nullable, Some(true));
    }

    #[test]
    fn test_hierarchy_without_contribution_is_absent() {
        let loader = MemoryLoader::new();
        let formats = FormatRegistry::with_defaults();
        let mut session = Session::new(&loader, &formats);
        assert!(transform(&mut session, json!({"allOf": [{"required": ["a"]}]})).is_none());
    }
}
