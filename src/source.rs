//! Schema document retrieval, output writing and content digests.
//!
//! This is plumbing for the `crdgen` binary. The transpiler itself never
//! touches the filesystem or network: it receives already-parsed
//! [`Schema`] documents.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Default cap on downloaded schema documents (512 KiB).
pub const DEFAULT_MAX_SCHEMA_BYTES: usize = 512 * 1024;

/// Whether a schema source argument names a remote document.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Read the raw bytes of a schema file.
pub fn read_schema(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read and parse a schema file.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let bytes = read_schema(path)?;
    Schema::parse(&bytes)
}

/// SHA-256 over the given documents, in order, as lowercase hex.
pub fn digest<'b>(documents: impl IntoIterator<Item = &'b [u8]>) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc);
    }
    format!("{:x}", hasher.finalize())
}

/// Write content to a file, creating parent directories as needed.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, content).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Fetch a schema document over HTTP.
///
/// The body is read in chunks and rejected as soon as it exceeds
/// `max_bytes`.
#[cfg(feature = "download")]
pub async fn download_schema(url: &str, max_bytes: usize) -> Result<Vec<u8>> {
    tracing::info!(url, "downloading schema");

    let mut response = reqwest::get(url)
        .await
        .map_err(|e| Error::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Download(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::Download(format!("reading response body: {e}")))?
    {
        if body.len() + chunk.len() > max_bytes {
            return Err(Error::Download(format!(
                "GET {url}: body exceeds {max_bytes} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }

    tracing::debug!(url, bytes = body.len(), "downloaded schema");
    Ok(body)
}

/// Download a schema document and save it to disk.
///
/// The body must parse as a schema before anything is written.
#[cfg(feature = "download")]
pub async fn save_schema(url: &str, output_path: &Path, max_bytes: usize) -> Result<Schema> {
    let body = download_schema(url, max_bytes).await?;
    let schema = Schema::parse(&body)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(output_path, &body).map_err(|e| Error::Write {
        path: output_path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(url, path = %output_path.display(), "saved schema");
    Ok(schema)
}
