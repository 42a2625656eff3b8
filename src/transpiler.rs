//! Transpile JSON Schema documents into named records and type expressions.
//!
//! The walk is a single-threaded recursion over the [`RefResolver`] arena.
//! Every node is typed at most once: the result is memoized per node, and
//! object nodes publish their record pointer *before* their properties are
//! visited, so self- and mutually-referential objects terminate.
//!
//! # Naming
//!
//! | Node | Default name |
//! |------|--------------|
//! | property | identifier form of the key (`address1` → `Address1`) |
//! | definition reached by `$ref` | identifier form of the definition key |
//! | array items | `<ArrayName>Items` |
//! | typed `additionalProperties` | `<ParentKey>Item` |
//! | first document | `Root` |
//! | later documents | identifier form of the title, else `Root` |
//! | anything else | `Anonymous<N>` |
//!
//! When a record name is already taken the parent's name is prefixed; if
//! that is taken too, an increasing numeric suffix is appended until the
//! name is free. `Root` is reserved for the primary document, so a nested
//! `root` property becomes `<Parent>Root`. Document names are unique across
//! records and aliases, and property keys that map to the same identifier
//! get numeric suffixes (`a-b`, `a_b` → `AB`, `AB2`).

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::model::{AdditionalType, Field, Primitive, Record, Transpiled, TypeExpr};
use crate::resolver::{NodeId, PathElement, RefResolver};
use crate::schema::Schema;
use crate::type_map::{enum_strings, quote_literal, schema_type_to_expr, to_identifier};

/// Name of the record produced for the primary document.
pub const ROOT_NAME: &str = "Root";

/// Name of the synthetic field that captures typed additional properties.
pub const ADDITIONAL_PROPERTIES_FIELD: &str = "AdditionalProperties";

/// Transpile one or more root documents.
///
/// The first document is the primary one and yields the `Root` record.
/// Further documents mostly serve as `$ref` targets; they are typed too,
/// under their title when they have one.
pub fn transpile(roots: &[Schema]) -> Result<Transpiled> {
    let mut resolver = RefResolver::new(roots);
    resolver.init();

    let mut transpiler = Transpiler::new(resolver);
    transpiler.run()?;

    tracing::debug!(
        records = transpiler.records.len(),
        aliases = transpiler.aliases.len(),
        "transpiled schema documents"
    );
    Ok(Transpiled {
        records: transpiler.records,
        aliases: transpiler.aliases,
    })
}

/// Per-call transpilation state.
struct Transpiler<'a> {
    resolver: RefResolver<'a>,
    records: BTreeMap<String, Record>,
    aliases: BTreeMap<String, Field>,
    /// Type memo, indexed by node.
    generated: Vec<Option<TypeExpr>>,
    /// Nodes whose typing has started but not finished.
    in_progress: HashSet<NodeId>,
    /// Record name -> node that defined it.
    owners: HashMap<String, NodeId>,
    anon_count: usize,
}

impl<'a> Transpiler<'a> {
    fn new(resolver: RefResolver<'a>) -> Self {
        let generated = vec![None; resolver.len()];
        Transpiler {
            resolver,
            records: BTreeMap::new(),
            aliases: BTreeMap::new(),
            generated,
            in_progress: HashSet::new(),
            owners: HashMap::new(),
            anon_count: 0,
        }
    }

    fn run(&mut self) -> Result<()> {
        let roots = self.resolver.root_ids().to_vec();
        for root in roots {
            let name = self.unique_root_name(root);
            let ty = self.process_schema(&name, root)?;

            let owns_record = matches!(&ty, TypeExpr::Pointer(n) if self.owners.get(n) == Some(&root));
            if owns_record {
                continue;
            }

            // A primary document that is only a `$ref` to an object takes
            // over that object's record.
            if name == ROOT_NAME && !self.records.contains_key(ROOT_NAME) {
                if let TypeExpr::Pointer(target) = &ty {
                    let target = target.clone();
                    let description = self.resolver.node(root).schema.description.clone();
                    if self.rekey_record(&target, ROOT_NAME, description) {
                        continue;
                    }
                }
            }

            let field = self.create_field(&name, ty, root);
            self.aliases.insert(name, field);
        }
        Ok(())
    }

    /// Move record `from` to `to`, replacing its description, and rewrite
    /// every type expression that pointed at it.
    fn rekey_record(&mut self, from: &str, to: &str, description: String) -> bool {
        let Some(mut record) = self.records.remove(from) else {
            return false;
        };
        tracing::debug!(from, to, "re-keying record referenced by the root document");
        record.name = to.to_string();
        record.description = description;
        self.records.insert(to.to_string(), record);

        if let Some(owner) = self.owners.remove(from) {
            self.owners.insert(to.to_string(), owner);
        }
        for record in self.records.values_mut() {
            for field in record.fields.values_mut() {
                field.ty.rename_record(from, to);
            }
            if let Some(AdditionalType::Typed(ty)) = &mut record.additional_type {
                ty.rename_record(from, to);
            }
        }
        for field in self.aliases.values_mut() {
            field.ty.rename_record(from, to);
        }
        for ty in self.generated.iter_mut().flatten() {
            ty.rename_record(from, to);
        }
        true
    }

    /// Returns the type of node `id`, typing it (and everything it reaches)
    /// on first use.
    fn process_schema(&mut self, name: &str, id: NodeId) -> Result<TypeExpr> {
        if let Some(ty) = &self.generated[id] {
            return Ok(ty.clone());
        }

        self.in_progress.insert(id);
        let result = self.dispatch(name, id);
        self.in_progress.remove(&id);

        let ty = result?;
        self.generated[id] = Some(ty.clone());
        Ok(ty)
    }

    fn dispatch(&mut self, name: &str, id: NodeId) -> Result<TypeExpr> {
        let schema = self.resolver.node(id).schema;
        tracing::trace!(name, path = %self.resolver.get_path(id), "typing schema");

        let (primary, multiple) = schema.primary_type();
        if multiple {
            return Err(Error::AmbiguousType {
                path: self.resolver.get_path(id),
                types: schema.type_value.tags().into_iter().map(String::from).collect(),
            });
        }

        match primary {
            None if !schema.reference.is_empty() => self.process_reference(id),
            None => Err(Error::MissingType {
                name: name.to_string(),
                path: self.resolver.get_path(id),
            }),
            Some("object") => self.process_object(name, id),
            Some("array") => self.process_array(name, id),
            Some(other) => schema_type_to_expr(other, None, false),
        }
    }

    fn process_reference(&mut self, id: NodeId) -> Result<TypeExpr> {
        let target = self.resolver.get_schema_by_reference(id)?;
        if let Some(ty) = &self.generated[target] {
            return Ok(ty.clone());
        }
        if self.in_progress.contains(&target) {
            return Err(Error::CyclicReference {
                reference: self.resolver.node(id).schema.reference.clone(),
                path: self.resolver.get_path(id),
            });
        }

        let name = self.schema_name("", target);
        self.process_schema(&name, target)
    }

    fn process_array(&mut self, name: &str, id: NodeId) -> Result<TypeExpr> {
        let node = self.resolver.node(id);
        let (schema, items, is_root) = (node.schema, node.items, node.parent.is_none());

        let Some(items) = items else {
            return Ok(TypeExpr::slice(TypeExpr::Primitive(Primitive::Any)));
        };

        let item_name = self.schema_name(&format!("{name}Items"), items);
        let elem = self.process_schema(&item_name, items)?;
        let ty = schema_type_to_expr("array", Some(elem), true)?;

        if is_root {
            let mut field = self.create_field(name, ty.clone(), id);
            field.required = schema.required.iter().any(|r| r == name);
            self.aliases.insert(name.to_string(), field);
        }
        Ok(ty)
    }

    fn process_object(&mut self, name: &str, id: NodeId) -> Result<TypeExpr> {
        let node = self.resolver.node(id);
        let schema = node.schema;
        let properties = node.properties.clone();
        let additional = node.additional_properties;
        let is_definition = node.path_element == PathElement::Definitions;

        // Objects that only carry typed additional properties are maps.
        if let Some(ap) = additional {
            if schema.properties.is_empty() {
                if is_definition {
                    return Err(Error::DefinitionOnlyAdditionalProperties {
                        path: self.resolver.get_path(id),
                    });
                }
                let ap_name = self.schema_name("", ap);
                let value = self.process_schema(&ap_name, ap)?;
                return Ok(TypeExpr::map(value));
            }
        }

        let name = self.unique_record_name(name, id);
        // Publish before descending so references back to this object resolve.
        self.generated[id] = Some(TypeExpr::Pointer(name.clone()));
        self.records
            .insert(name.clone(), Record::new(name.clone(), schema.description.clone()));
        self.owners.insert(name.clone(), id);

        let mut record = Record::new(name.clone(), schema.description.clone());

        for (key, child) in properties {
            let sub_name = self.schema_name(key, child);
            let ty = self.process_schema(&sub_name, child)?;

            let mut field_name = to_identifier(key);
            let reserved = additional.is_some() && field_name == ADDITIONAL_PROPERTIES_FIELD;
            if reserved || record.fields.contains_key(&field_name) {
                let renamed = free_field_name(&record.fields, &field_name);
                tracing::warn!(record = %name, key, field = %renamed, "property name collision");
                field_name = renamed;
            }

            let mut field = self.create_field(&field_name, ty, child);
            field.json_name = key.to_string();
            field.required = schema.required.iter().any(|r| r == key);
            if field.required {
                record.generate_code = true;
            }
            record.fields.insert(field_name, field);
        }

        if let Some(ap) = additional {
            let ap_name = self.schema_name("", ap);
            let value = self.process_schema(&ap_name, ap)?;
            let field = Field::new(ADDITIONAL_PROPERTIES_FIELD, TypeExpr::map(value.clone()));
            record.fields.insert(ADDITIONAL_PROPERTIES_FIELD.to_string(), field);
            record.generate_code = true;
            record.additional_type = Some(AdditionalType::Typed(value));
        }

        match schema.additional_properties_flag() {
            Some(true) => record.preserve_unknown_fields = true,
            Some(false) => {
                record.generate_code = true;
                record.additional_type = Some(AdditionalType::Forbidden);
            }
            None => {}
        }

        tracing::debug!(record = %name, fields = record.fields.len(), "registered record");
        self.records.insert(name.clone(), record);
        schema_type_to_expr("object", Some(TypeExpr::Named(name)), true)
    }

    /// Whether `name` is unavailable as a record name for node `id`.
    /// `Root` stays reserved for the primary document.
    fn name_taken(&self, name: &str, id: NodeId) -> bool {
        self.records.contains_key(name)
            || (name == ROOT_NAME && self.resolver.root_ids().first() != Some(&id))
    }

    /// Name for document root `id`, free among both records and aliases.
    fn unique_root_name(&mut self, id: NodeId) -> String {
        let base = self.schema_name("", id);
        let free = |t: &Self, name: &str| !t.name_taken(name, id) && !t.aliases.contains_key(name);
        if free(&*self, &base) {
            return base;
        }

        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}{suffix}");
            if free(&*self, &candidate) {
                tracing::debug!(name = %base, renamed = %candidate, "document name collision");
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Pick a free record name for node `id`, preferring `name`.
    fn unique_record_name(&mut self, name: &str, id: NodeId) -> String {
        if !self.name_taken(name, id) {
            return name.to_string();
        }

        let parent = self.resolver.node(id).parent;
        let base = match parent {
            Some(parent) => {
                let parent_name = self.schema_name("", parent);
                let prefixed = to_identifier(&format!("{parent_name}{name}"));
                if !self.name_taken(&prefixed, id) {
                    tracing::debug!(name, renamed = %prefixed, "record name collision");
                    return prefixed;
                }
                prefixed
            }
            None => name.to_string(),
        };

        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}{suffix}");
            if !self.name_taken(&candidate, id) {
                tracing::debug!(name, renamed = %candidate, "record name collision");
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Default name for node `id`. An explicit `key` always wins.
    fn schema_name(&mut self, key: &str, id: NodeId) -> String {
        if !key.is_empty() {
            return to_identifier(key);
        }
        let node = self.resolver.node(id);
        let Some(parent) = node.parent else {
            return self.root_name(id);
        };
        if !node.json_key.is_empty() {
            return to_identifier(&node.json_key);
        }
        let parent_key = &self.resolver.node(parent).json_key;
        if !parent_key.is_empty() {
            return to_identifier(&format!("{parent_key}Item"));
        }
        self.anon_count += 1;
        format!("Anonymous{}", self.anon_count)
    }

    /// Name of a document root: `Root` for the primary document, the title
    /// for the others when it yields an identifier.
    fn root_name(&self, id: NodeId) -> String {
        let node = self.resolver.node(id);
        if node.document > 0 {
            let title = to_identifier(&node.schema.title);
            if !title.is_empty() {
                return title;
            }
        }
        ROOT_NAME.to_string()
    }

    /// Build a field carrying the metadata of node `id`.
    fn create_field(&self, name: &str, ty: TypeExpr, id: NodeId) -> Field {
        let schema = self.resolver.node(id).schema;
        let mut field = Field::new(name, ty);
        field.title = schema.title.clone();
        field.description = schema.description.clone();
        field.default = schema.default.clone();
        field.minimum = schema.minimum;
        field.maximum = schema.maximum;
        field.multiple_of = schema.multiple_of;
        field.pattern = schema.pattern.clone();

        if let Some(values) = &schema.enum_values {
            field.enum_values = enum_strings(values);
            if schema.primary_type() == (Some("string"), false) {
                for value in &mut field.enum_values {
                    *value = quote_literal(value);
                }
            }
        }
        field
    }
}

/// First `<base><n>` with `n` from 2 that is not a field of the record.
fn free_field_name(fields: &BTreeMap<String, Field>, base: &str) -> String {
    let mut suffix = 2usize;
    loop {
        let candidate = format!("{base}{suffix}");
        if !fields.contains_key(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(json: &str) -> Result<Transpiled> {
        transpile(&[Schema::parse(json.as_bytes()).unwrap()])
    }

    #[test]
    fn anonymous_names_when_no_key_is_available() {
        let out = run(
            r#"{
                "properties": {"a": {"type": "string"}},
                "additionalProperties": {
                    "type": "object",
                    "properties": {"x": {"type": "string"}}
                }
            }"#,
        )
        .unwrap();
        assert!(out.records.contains_key("Anonymous1"));
        let root = &out.records["Root"];
        assert_eq!(
            root.fields[ADDITIONAL_PROPERTIES_FIELD].ty.to_string(),
            "map[string]*Anonymous1"
        );
    }

    #[test]
    fn anonymous_counter_is_per_call() {
        let json = r#"{
            "properties": {"a": {"type": "string"}},
            "additionalProperties": {"properties": {"x": {"type": "string"}}}
        }"#;
        let first = run(json).unwrap();
        let second = run(json).unwrap();
        assert_eq!(first, second);
        assert!(second.records.contains_key("Anonymous1"));
    }

    #[test]
    fn numeric_suffix_after_parent_prefix_is_taken() {
        // Definitions `a` and `b` both contain an `item` object, and a
        // third object named `BItem` already exists, so the second `Item`
        // must fall through to a numeric suffix.
        let out = run(
            r##"{
                "properties": {
                    "a": {"$ref": "#/definitions/a"},
                    "bItem": {"type": "object"},
                    "c": {"$ref": "#/definitions/b"}
                },
                "definitions": {
                    "a": {"properties": {"item": {"properties": {"x": {"type": "string"}}}}},
                    "b": {"properties": {"item": {"properties": {"y": {"type": "string"}}}}}
                }
            }"##,
        )
        .unwrap();

        assert!(out.records.contains_key("Item"));
        assert!(out.records.contains_key("BItem"));
        assert!(out.records.contains_key("BItem2"));
        assert_eq!(out.records["B"].fields["Item"].ty.to_string(), "*BItem2");
        assert!(out.records["BItem2"].fields.contains_key("Y"));
    }

    #[test]
    fn colliding_property_identifiers_keep_both_fields() {
        let out = run(
            r#"{
                "properties": {
                    "a-b": {"type": "string"},
                    "a_b": {"type": "integer"}
                }
            }"#,
        )
        .unwrap();
        let root = &out.records["Root"];
        assert_eq!(root.fields.len(), 2);
        assert_eq!(root.fields["AB"].json_name, "a-b");
        assert_eq!(root.fields["AB"].ty.to_string(), "string");
        assert_eq!(root.fields["AB2"].name, "AB2");
        assert_eq!(root.fields["AB2"].json_name, "a_b");
        assert_eq!(root.fields["AB2"].ty.to_string(), "int");
    }

    #[test]
    fn property_named_like_the_additional_properties_field_is_renamed() {
        let out = run(
            r#"{
                "properties": {"additionalProperties": {"type": "boolean"}},
                "additionalProperties": {"type": "string"}
            }"#,
        )
        .unwrap();
        let root = &out.records["Root"];
        assert_eq!(root.fields[ADDITIONAL_PROPERTIES_FIELD].ty.to_string(), "map[string]string");
        let renamed = &root.fields["AdditionalProperties2"];
        assert_eq!(renamed.json_name, "additionalProperties");
        assert_eq!(renamed.ty.to_string(), "bool");
    }

    #[test]
    fn pure_reference_loop_is_an_error() {
        let err = run(
            r##"{
                "properties": {"a": {"$ref": "#/definitions/a"}},
                "definitions": {
                    "a": {"$ref": "#/definitions/b"},
                    "b": {"$ref": "#/definitions/a"}
                }
            }"##,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CyclicReference { .. }), "{err}");
    }

    #[test]
    fn self_referencing_array_root_is_an_error() {
        let err = run(r##"{"type": "array", "items": {"$ref": "#"}}"##).unwrap_err();
        assert!(matches!(err, Error::CyclicReference { .. }), "{err}");
    }

    #[test]
    fn shared_inline_object_is_registered_once() {
        let out = run(
            r##"{
                "properties": {
                    "first": {"$ref": "#/definitions/list"},
                    "second": {"$ref": "#/definitions/list"}
                },
                "definitions": {
                    "list": {"type": "array", "items": {"properties": {"v": {"type": "integer"}}}}
                }
            }"##,
        )
        .unwrap();
        let root = &out.records["Root"];
        assert_eq!(root.fields["First"].ty, root.fields["Second"].ty);
        assert_eq!(out.records.len(), 2, "{:?}", out.records.keys().collect::<Vec<_>>());
    }

    #[test]
    fn field_metadata_comes_from_the_property_node() {
        let out = run(
            r##"{
                "properties": {
                    "size": {
                        "$ref": "#/definitions/size",
                        "title": "Size",
                        "description": "how big",
                        "default": 3
                    }
                },
                "definitions": {"size": {"type": "integer", "minimum": 1, "description": "ignored"}}
            }"##,
        )
        .unwrap();
        let size = &out.records["Root"].fields["Size"];
        assert_eq!(size.ty.to_string(), "int");
        assert_eq!(size.title, "Size");
        assert_eq!(size.description, "how big");
        assert_eq!(size.default, Some(serde_json::json!(3)));
        assert_eq!(size.minimum, None);
    }
}
