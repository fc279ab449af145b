//! Read side of the published artifact root
//!
//! Every load resolves `CURRENT` once and reads all files from that
//! generation, then cross-checks them before anything is scored.

use churn_core::serialization::read_json;
use churn_core::{ChurnError, FeatureSchema, LogisticModel, Result};
use churn_trainer::artifacts::{
    ArtifactLayout, BuildManifest, CLEAN_CSV, IMPORTANCE_JSON, MANIFEST_JSON, METRICS_JSON,
    MODEL_BIN, MODEL_HASH, SCHEMA_JSON, SCORING_ARTIFACTS, X_TRAIN_CSV,
};
use churn_trainer::dataset::read_feature_header;
use churn_trainer::{EvaluationReport, GlobalImportance};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::context::ScoringContext;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: ArtifactLayout,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: ArtifactLayout::new(root),
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Load and verify the live generation's schema and model.
    pub fn load_context(&self, threshold: f64) -> Result<ScoringContext> {
        let dir = self.layout.resolve_current()?;
        for name in SCORING_ARTIFACTS {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(ChurnError::MissingArtifact { path });
            }
        }

        let schema: FeatureSchema = read_json(&dir.join(SCHEMA_JSON))?;
        let header = read_feature_header(&dir.join(X_TRAIN_CSV))?;
        if header.columns() != schema.columns() {
            return Err(ChurnError::SchemaMismatch(format!(
                "{} header disagrees with {}",
                X_TRAIN_CSV, SCHEMA_JSON
            )));
        }

        let model = LogisticModel::load(&dir.join(MODEL_BIN))?;
        let recorded = read_text(&dir.join(MODEL_HASH))?;
        let actual = model.hash_hex()?;
        if recorded.trim() != actual {
            return Err(ChurnError::data_integrity(
                "load",
                format!("{MODEL_BIN} hash {actual} does not match {MODEL_HASH} {}", recorded.trim()),
            ));
        }
        if model.metadata.schema_fingerprint != schema.fingerprint() {
            return Err(ChurnError::SchemaMismatch(
                "model was trained on a different feature schema".into(),
            ));
        }
        if model.coefficients.len() != schema.len() {
            return Err(ChurnError::SchemaMismatch(format!(
                "model has {} coefficients, schema has {} columns",
                model.coefficients.len(),
                schema.len()
            )));
        }

        let build_id = generation_name(&dir);
        info!(build_id = %build_id, features = schema.len(), "Loaded scoring context");
        Ok(ScoringContext::new(build_id, schema, Arc::new(model), threshold))
    }

    /// Path of the live canonical table.
    pub fn clean_table_path(&self) -> Result<PathBuf> {
        self.live_file(CLEAN_CSV)
    }

    pub fn load_importance(&self) -> Result<GlobalImportance> {
        read_json(&self.live_file(IMPORTANCE_JSON)?)
    }

    pub fn load_metrics(&self) -> Result<EvaluationReport> {
        read_json(&self.live_file(METRICS_JSON)?)
    }

    pub fn load_manifest(&self) -> Result<BuildManifest> {
        read_json(&self.live_file(MANIFEST_JSON)?)
    }

    fn live_file(&self, name: &str) -> Result<PathBuf> {
        Ok(self.layout.resolve_current()?.join(name))
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(ChurnError::io(format!("reading {}", path.display())))
}

fn generation_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
