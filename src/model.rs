//! The typed model produced by the transpiler and consumed by renderers.
//!
//! Type expressions render to a fixed textual convention (`*Name`, `[]T`,
//! `map[string]T`, `string`, ...). Renderers and the transpiler's own alias
//! checks compare on this rendering, so [`TypeExpr`]'s `Display` output is
//! part of the contract and must not change.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int,
    Float64,
    String,
    Nil,
    /// Unconstrained value, e.g. the elements of an array without `items`.
    Any,
}

impl Primitive {
    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int => "int",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Nil => "nil",
            Primitive::Any => "any",
        }
    }
}

/// A field or alias type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Primitive(Primitive),
    /// Reference to a record in the output table, rendered `*Name`.
    Pointer(String),
    /// Rendered `[]T`.
    Slice(Box<TypeExpr>),
    /// String-keyed map, rendered `map[string]T`.
    Map(Box<TypeExpr>),
    /// Reference to a record by value, rendered `Name`.
    Named(String),
}

impl TypeExpr {
    pub fn slice(elem: TypeExpr) -> TypeExpr {
        TypeExpr::Slice(Box::new(elem))
    }

    pub fn map(value: TypeExpr) -> TypeExpr {
        TypeExpr::Map(Box::new(value))
    }

    /// The record this expression ultimately points at, looking through
    /// slices and maps.
    pub fn record_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Primitive(_) => None,
            TypeExpr::Pointer(name) | TypeExpr::Named(name) => Some(name),
            TypeExpr::Slice(inner) | TypeExpr::Map(inner) => inner.record_name(),
        }
    }

    /// Replace every reference to record `from` with `to`. Returns whether
    /// anything changed.
    pub fn rename_record(&mut self, from: &str, to: &str) -> bool {
        match self {
            TypeExpr::Primitive(_) => false,
            TypeExpr::Pointer(name) | TypeExpr::Named(name) => {
                if name == from {
                    *name = to.to_string();
                    true
                } else {
                    false
                }
            }
            TypeExpr::Slice(inner) | TypeExpr::Map(inner) => inner.rename_record(from, to),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p) => f.write_str(p.as_str()),
            TypeExpr::Pointer(name) => write!(f, "*{name}"),
            TypeExpr::Slice(inner) => write!(f, "[]{inner}"),
            TypeExpr::Map(inner) => write!(f, "map[string]{inner}"),
            TypeExpr::Named(name) => f.write_str(name),
        }
    }
}

impl Serialize for TypeExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How a record treats object keys that are not declared properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionalType {
    /// Extra keys are captured into a map with this value type.
    Typed(TypeExpr),
    /// `additionalProperties: false`.
    Forbidden,
}

impl fmt::Display for AdditionalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdditionalType::Typed(ty) => fmt::Display::fmt(ty, f),
            AdditionalType::Forbidden => f.write_str("false"),
        }
    }
}

impl Serialize for AdditionalType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single field of a record, or an alias entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Identifier-safe name, e.g. `Address1`.
    pub name: String,
    /// Original property key, e.g. `address1`. Empty for synthetic fields
    /// and aliases.
    pub json_name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    pub description: String,
    pub title: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Enum values as strings. Quoted literals when the field is a plain
    /// `string`.
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

impl Field {
    /// A bare field with no metadata.
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Field {
        Field {
            name: name.into(),
            json_name: String::new(),
            ty,
            description: String::new(),
            title: String::new(),
            required: false,
            default: None,
            minimum: None,
            maximum: None,
            multiple_of: None,
            pattern: None,
            enum_values: Vec::new(),
        }
    }
}

/// A named record type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub name: String,
    pub description: String,
    /// Fields keyed by [`Field::name`].
    pub fields: BTreeMap<String, Field>,
    /// Whether the renderer must emit custom (de)serialization: set when a
    /// field is required or extra keys need special handling.
    pub generate_code: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_type: Option<AdditionalType>,
    /// `additionalProperties: true`.
    pub preserve_unknown_fields: bool,
}

impl Record {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Record {
        Record {
            name: name.into(),
            description: description.into(),
            fields: BTreeMap::new(),
            generate_code: false,
            additional_type: None,
            preserve_unknown_fields: false,
        }
    }
}

/// Result of one transpilation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transpiled {
    /// Record table keyed by unique type name.
    pub records: BTreeMap<String, Record>,
    /// Root or root-array schemas whose type is not a record of their own.
    pub aliases: BTreeMap<String, Field>,
}

impl Transpiled {
    /// Every type expression in the model, field by field.
    pub fn type_exprs(&self) -> impl Iterator<Item = &TypeExpr> {
        self.records
            .values()
            .flat_map(|r| r.fields.values())
            .chain(self.aliases.values())
            .map(|f| &f.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_expr_rendering() {
        assert_eq!(TypeExpr::Primitive(Primitive::Float64).to_string(), "float64");
        assert_eq!(TypeExpr::Pointer("Address".into()).to_string(), "*Address");
        assert_eq!(
            TypeExpr::slice(TypeExpr::slice(TypeExpr::Pointer("Inner".into()))).to_string(),
            "[][]*Inner"
        );
        assert_eq!(
            TypeExpr::map(TypeExpr::Pointer("Property6Item".into())).to_string(),
            "map[string]*Property6Item"
        );
        assert_eq!(TypeExpr::slice(TypeExpr::Primitive(Primitive::Any)).to_string(), "[]any");
        assert_eq!(TypeExpr::Named("Root".into()).to_string(), "Root");
    }

    #[test]
    fn rename_record_looks_through_containers() {
        let mut ty = TypeExpr::slice(TypeExpr::map(TypeExpr::Pointer("Address".into())));
        assert!(ty.rename_record("Address", "Root"));
        assert_eq!(ty.to_string(), "[]map[string]*Root");
        assert!(!ty.rename_record("Address", "Root"));
        assert_eq!(ty.record_name(), Some("Root"));
    }

    #[test]
    fn serializes_with_textual_types() {
        let mut record = Record::new("Root", "the root");
        let tags = TypeExpr::slice(TypeExpr::Primitive(Primitive::String));
        record.fields.insert("Tags".into(), Field::new("Tags", tags));
        record.additional_type = Some(AdditionalType::Forbidden);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fields"]["Tags"]["type"], "[]string");
        assert_eq!(json["additionalType"], "false");
        assert_eq!(json["generateCode"], false);
        assert!(json["fields"]["Tags"].get("enum").is_none());
    }
}
