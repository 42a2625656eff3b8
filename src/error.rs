//! Error types for the crdgen crate.

use std::path::PathBuf;

/// Errors that can occur while reading or transpiling JSON Schema documents.
///
/// Every variant is terminal for a [`crate::transpiler::transpile`] call:
/// partial record tables are never returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The schema document is not valid JSON or not shaped like a schema.
    #[error("failed to parse schema: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema node declares more than one type.
    #[error("multiple types in schema '{path}': {}", types.join(","))]
    AmbiguousType { path: String, types: Vec<String> },

    /// A schema node has neither a type nor a `$ref`.
    #[error("missing type in schema '{name}' at '{path}'")]
    MissingType { name: String, path: String },

    /// A `$ref` names a document or pointer that is not among the supplied roots.
    #[error("reference \"{reference}\" not found at \"{path}\"")]
    ReferenceNotFound { reference: String, path: String },

    /// A `$ref` chain loops back on itself without ever reaching a type.
    #[error("reference \"{reference}\" at \"{path}\" is part of a cycle with no concrete type")]
    CyclicReference { reference: String, path: String },

    /// A named definition only carries typed `additionalProperties`.
    #[error(
        "object '{path}' is a definition and only contains additional properties; \
         it cannot be represented as a named record"
    )]
    DefinitionOnlyAdditionalProperties { path: String },

    /// A container type was requested with no element type.
    #[error("can't create an {kind} of an empty subtype")]
    EmptySubtype { kind: &'static str },

    /// A type tag outside the supported primitive set.
    #[error("unsupported schema type '{type_name}'")]
    UnsupportedType { type_name: String },

    /// Failed to read a schema file from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the generated model.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Network error while fetching a schema document.
    #[cfg(feature = "download")]
    #[error("download failed: {0}")]
    Download(String),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
