//! Canonical JSON serialization helpers.
//!
//! Reports and manifests are written with sorted object keys and stable
//! indentation so that two builds of the same input produce byte-identical
//! files that can be hashed and diffed.

use crate::errors::{ChurnError, Result};
use serde::Serialize;
use std::path::Path;

/// Render `value` as canonical JSON text.
///
/// Object keys come out sorted at every depth, since `serde_json::Value`
/// objects are ordered maps and struct fields pass through one on the way.
/// Indentation is two spaces and the text ends with a single newline.
pub fn canonical_json_string<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    Ok(text)
}

/// Read a JSON artifact, reporting an absent file as a missing artifact.
pub fn read_json<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if !path.exists() {
        return Err(ChurnError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)
        .map_err(ChurnError::io(format!("reading {}", path.display())))?;
    Ok(serde_json::from_str(&content)?)
}

/// BLAKE3 hex digest of arbitrary bytes.
pub fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}
