//! Maps JSON Schema type tags to [`TypeExpr`]s and schema keys to
//! identifier-safe names.
//!
//! # Type Mapping Table
//!
//! | Schema type | Type expression | Notes |
//! |-------------|-----------------|-------|
//! | `array`   | `[]T` | Error when the element type is missing |
//! | `boolean` | `bool` | |
//! | `integer` | `int` | |
//! | `number`  | `float64` | |
//! | `null`    | `nil` | |
//! | `object`  | `*T` or `T` | Error when the record name is missing |
//! | `string`  | `string` | |
//! | anything else | | [`Error::UnsupportedType`] |

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Primitive, TypeExpr};

/// Map a schema type tag to a type expression.
///
/// `sub` is the element type for `array` and the record name for `object`;
/// it is ignored for scalar tags. `pointer` selects `*T` over `T` for
/// objects.
pub fn schema_type_to_expr(type_name: &str, sub: Option<TypeExpr>, pointer: bool) -> Result<TypeExpr> {
    let expr = match type_name {
        "array" => {
            let elem = sub.ok_or(Error::EmptySubtype { kind: "array" })?;
            TypeExpr::slice(elem)
        }
        "boolean" => TypeExpr::Primitive(Primitive::Bool),
        "integer" => TypeExpr::Primitive(Primitive::Int),
        "number" => TypeExpr::Primitive(Primitive::Float64),
        "null" => TypeExpr::Primitive(Primitive::Nil),
        "object" => match sub {
            Some(TypeExpr::Named(name)) | Some(TypeExpr::Pointer(name)) if pointer => {
                TypeExpr::Pointer(name)
            }
            Some(TypeExpr::Pointer(name)) => TypeExpr::Named(name),
            Some(other) => other,
            None => return Err(Error::EmptySubtype { kind: "object" }),
        },
        "string" => TypeExpr::Primitive(Primitive::String),
        other => {
            return Err(Error::UnsupportedType {
                type_name: other.to_string(),
            });
        }
    };
    Ok(expr)
}

/// Convert a schema key into an identifier-safe, capitalised name.
///
/// Every character that is not a letter or digit splits the key, and each
/// piece has its first letter upper-cased:
/// - `"camelCase"` → `"CamelCase"`
/// - `"key-name"` → `"KeyName"`
/// - `"a.b.c"` → `"ABC"`
/// - `"123ABC"` → `"_123ABC"` (identifiers cannot start with a digit)
pub fn to_identifier(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let pieces = s.split(|c: char| !c.is_alphanumeric()).filter(|p| !p.is_empty());
    for (i, piece) in pieces.enumerate() {
        if i == 0 && piece.starts_with(|c: char| c.is_ascii_digit()) {
            out.push('_');
        }
        out.push_str(&capitalise_first_letter(piece));
    }
    out
}

/// Upper-case the first character and leave the rest untouched.
pub fn capitalise_first_letter(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Stringify enum values for annotations.
///
/// Strings are kept verbatim, numbers and booleans use their JSON text,
/// `null` entries are dropped and composite values become compact JSON.
/// Floats with no fractional part print as integers (`1.0` → `1`).
pub fn enum_strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) if n.is_f64() => n.as_f64().map(|f| f.to_string()),
            other => Some(other.to_string()),
        })
        .collect()
}

/// Quote a string as a literal suitable for embedding in a validation
/// annotation.
///
/// Uses JSON string escaping: control characters become `\n`, `\t` or
/// `\u00XX` and non-ASCII text is kept as is. C-style escapes such as `\a`
/// or `\x..` are never produced.
pub fn quote_literal(s: &str) -> String {
    // Serializing a &str cannot fail.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
