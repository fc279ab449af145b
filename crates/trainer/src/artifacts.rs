//! Published artifact layout
//!
//! ```text
//! <root>/
//!   CURRENT                    build id of the live generation
//!   generations/<build-id>/    one complete, immutable build
//! ```
//!
//! Readers resolve `CURRENT` once and read every file of a request from that
//! generation directory.

use churn_core::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CURRENT_POINTER: &str = "CURRENT";
pub const GENERATIONS_DIR: &str = "generations";
pub const STAGING_PREFIX: &str = ".staging-";

pub const CLEAN_CSV: &str = "clean.csv";
pub const X_TRAIN_CSV: &str = "X_train.csv";
pub const X_TEST_CSV: &str = "X_test.csv";
pub const Y_TRAIN_CSV: &str = "y_train.csv";
pub const Y_TEST_CSV: &str = "y_test.csv";
pub const MODEL_BIN: &str = "model.bin";
pub const MODEL_HASH: &str = "model.hash";
pub const SCHEMA_JSON: &str = "schema.json";
pub const METRICS_JSON: &str = "metrics.json";
pub const IMPORTANCE_JSON: &str = "importance.json";
pub const MANIFEST_JSON: &str = "manifest.json";

/// Files the scoring layer cannot work without.
pub const SCORING_ARTIFACTS: [&str; 4] = [SCHEMA_JSON, X_TRAIN_CSV, MODEL_BIN, MODEL_HASH];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current_pointer(&self) -> PathBuf {
        self.root.join(CURRENT_POINTER)
    }

    pub fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    pub fn generation_dir(&self, build_id: &str) -> PathBuf {
        self.generations_dir().join(build_id)
    }

    /// Build id named by `CURRENT`, if any.
    pub fn current_build_id(&self) -> Result<Option<String>> {
        let pointer = self.current_pointer();
        match std::fs::read_to_string(&pointer) {
            Ok(content) => {
                let id = content.trim();
                if id.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(id.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ChurnError::io(format!("reading {}", pointer.display()))(e)),
        }
    }

    /// Directory of the live generation.
    pub fn resolve_current(&self) -> Result<PathBuf> {
        let Some(build_id) = self.current_build_id()? else {
            return Err(ChurnError::MissingArtifact {
                path: self.current_pointer(),
            });
        };
        let dir = self.generation_dir(&build_id);
        if !dir.is_dir() {
            return Err(ChurnError::MissingArtifact { path: dir });
        }
        Ok(dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub raw: usize,
    pub clean: usize,
    pub train: usize,
    pub test: usize,
}

/// Provenance record written as `manifest.json` in every generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub build_id: String,
    pub created_at: String,
    pub version: String,
    /// BLAKE3 of the raw input bytes
    pub input_hash: String,
    pub schema_fingerprint: String,
    pub model_hash: String,
    pub feature_count: usize,
    pub rows: RowCounts,
    pub train_positive_rate: f64,
    pub test_positive_rate: f64,
    pub converged: bool,
    pub iterations: usize,
    /// BLAKE3 of each published file, by name
    pub files: BTreeMap<String, String>,
}
