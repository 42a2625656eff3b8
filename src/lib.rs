//! Transpile JSON Schema documents into a typed record model.
//!
//! `crdgen` reads one or more interlinked [JSON Schema](https://json-schema.org/)
//! documents and produces a deduplicated table of named records with typed
//! fields, ready for a renderer to turn into statically-typed source
//! declarations (for example Kubernetes CRD API types).
//!
//! # Features
//!
//! - Resolves same-document (`#/definitions/x`) and cross-document
//!   (`other#/definitions/x`) `$ref`s
//! - Terminates on self- and mutually-referential object schemas
//! - Collapses property-less objects with typed `additionalProperties` to maps
//! - Carries validation metadata (`minimum`, `maximum`, `multipleOf`,
//!   `pattern`, `enum`, `default`) onto fields
//! - Disambiguates colliding record names deterministically
//!
//! # Usage
//!
//! ```
//! use crdgen::schema::Schema;
//!
//! let schema = Schema::parse(br#"{
//!     "type": "object",
//!     "properties": {
//!         "name": {"type": "string"},
//!         "age": {"type": "integer"}
//!     },
//!     "required": ["name"]
//! }"#)?;
//!
//! let model = crdgen::transpiler::transpile(&[schema])?;
//! let root = &model.records["Root"];
//! assert_eq!(root.fields["Name"].ty.to_string(), "string");
//! assert!(root.fields["Name"].required);
//! assert_eq!(root.fields["Age"].ty.to_string(), "int");
//! # Ok::<(), crdgen::error::Error>(())
//! ```

pub mod error;
pub mod model;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod transpiler;
pub mod type_map;

pub use error::{Error, Result};
pub use model::{Field, Record, Transpiled, TypeExpr};
pub use schema::Schema;
pub use transpiler::transpile;
