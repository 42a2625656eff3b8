//! JSON Schema object model.
//!
//! Only the keywords the transpiler turns into types are modelled:
//! `type`, `properties`, `items`, `additionalProperties`, `$ref`,
//! `definitions`, `required`, `enum`, `default`, `minimum`, `maximum`,
//! `multipleOf`, `pattern`, `description` and `title`. Every other keyword
//! is ignored by serde's default behaviour.
//!
//! Children are owned by their parent. Parent links, document positions and
//! the per-node type memo live in the [`crate::resolver::RefResolver`] arena,
//! never in the tree itself.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Result;

/// The `type` keyword of a schema node.
///
/// `Multiple` always holds two or more tags: a one-element list is read as
/// `Single` and an empty list as `Unset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeValue {
    #[default]
    Unset,
    Single(String),
    Multiple(Vec<String>),
}

impl TypeValue {
    /// All declared tags, in declaration order.
    pub fn tags(&self) -> Vec<&str> {
        match self {
            TypeValue::Unset => Vec::new(),
            TypeValue::Single(t) => vec![t.as_str()],
            TypeValue::Multiple(ts) => ts.iter().map(String::as_str).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for TypeValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(tag) => TypeValue::Single(tag),
            Raw::Many(mut tags) => match tags.len() {
                0 => TypeValue::Unset,
                1 => TypeValue::Single(tags.remove(0)),
                _ => TypeValue::Multiple(tags),
            },
        })
    }
}

/// The `additionalProperties` keyword: either a flag or a value schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<Schema>),
}

/// A parsed JSON Schema node.
///
/// Property and definition maps are `BTreeMap`s so that every walk over a
/// document visits children in the same order, which keeps generated names
/// stable across runs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Document identifier used for cross-document `$ref`s.
    #[serde(rename = "$id", alias = "id", default)]
    pub id: String,

    /// The `$schema` dialect URI. Informational only.
    #[serde(rename = "$schema", default)]
    pub schema_uri: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type", default)]
    pub type_value: TypeValue,

    #[serde(default)]
    pub properties: BTreeMap<String, Schema>,

    #[serde(default)]
    pub items: Option<Box<Schema>>,

    #[serde(default)]
    pub additional_properties: Option<AdditionalProperties>,

    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default, alias = "$defs")]
    pub definitions: BTreeMap<String, Schema>,

    #[serde(rename = "$ref", default)]
    pub reference: String,

    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub minimum: Option<f64>,

    #[serde(default)]
    pub maximum: Option<f64>,

    #[serde(default)]
    pub multiple_of: Option<f64>,

    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<Value>>,
}

impl Schema {
    /// Parse a schema document from raw bytes and normalize its types.
    pub fn parse(bytes: &[u8]) -> Result<Schema> {
        let mut schema: Schema = serde_json::from_slice(bytes)?;
        schema.normalize();
        Ok(schema)
    }

    /// Parse a schema document from a reader and normalize its types.
    pub fn from_reader<R: Read>(reader: R) -> Result<Schema> {
        let mut schema: Schema = serde_json::from_reader(reader)?;
        schema.normalize();
        Ok(schema)
    }

    /// Fill in missing `type` values throughout the tree where the shape
    /// makes the type obvious.
    pub fn normalize(&mut self) {
        self.fix_missing_type();
        for child in self.properties.values_mut() {
            child.normalize();
        }
        for child in self.definitions.values_mut() {
            child.normalize();
        }
        if let Some(items) = &mut self.items {
            items.normalize();
        }
        if let Some(AdditionalProperties::Schema(ap)) = &mut self.additional_properties {
            ap.normalize();
        }
    }

    /// Assign the inferred type to this node only, if it has none.
    pub fn fix_missing_type(&mut self) {
        if self.type_value == TypeValue::Unset {
            if let Some(tag) = self.inferred_type() {
                self.type_value = TypeValue::Single(tag.to_string());
            }
        }
    }

    /// Type implied by the node's shape. Nodes with a `$ref` never infer a
    /// type: they must be resolved through the reference instead.
    fn inferred_type(&self) -> Option<&'static str> {
        if !self.reference.is_empty() {
            return None;
        }
        if !self.properties.is_empty() || self.additional_properties.is_some() {
            Some("object")
        } else if self.items.is_some() {
            Some("array")
        } else {
            None
        }
    }

    /// Returns the primary type tag and whether the node declares more than
    /// one type. Multi-type nodes are only reported here, never rejected.
    pub fn primary_type(&self) -> (Option<&str>, bool) {
        match &self.type_value {
            TypeValue::Single(tag) => (Some(tag.as_str()), false),
            TypeValue::Multiple(tags) => (tags.first().map(String::as_str), true),
            TypeValue::Unset => (self.inferred_type(), false),
        }
    }

    /// The value schema of typed `additionalProperties`, if any.
    pub fn additional_properties_schema(&self) -> Option<&Schema> {
        match &self.additional_properties {
            Some(AdditionalProperties::Schema(s)) => Some(s),
            _ => None,
        }
    }

    /// The `additionalProperties` flag, if it was given as a boolean.
    pub fn additional_properties_flag(&self) -> Option<bool> {
        match self.additional_properties {
            Some(AdditionalProperties::Bool(b)) => Some(b),
            _ => None,
        }
    }
}
