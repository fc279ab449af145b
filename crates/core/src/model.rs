//! Linear probabilistic classifier and the classifier seam
//!
//! `LogisticModel` is the only model family the pipeline trains. The
//! `Classifier` trait exists so that evaluation and explanation can be
//! written against a seam, and so the explainer can refuse families whose
//! score is not an affine function of the input.

use crate::errors::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Broad model family, used to gate linear-only attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    Linear,
    TreeEnsemble,
    Other,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::TreeEnsemble => f.write_str("tree-ensemble"),
            Self::Other => f.write_str("non-linear"),
        }
    }
}

/// Coefficients of an affine log-odds model.
#[derive(Debug, Clone, Copy)]
pub struct LinearTerms<'a> {
    pub coefficients: &'a [f64],
    pub intercept: f64,
}

/// Anything that maps a schema-shaped row to a churn probability.
pub trait Classifier: Send + Sync {
    fn family(&self) -> ModelFamily;

    /// Number of features the classifier expects.
    fn feature_count(&self) -> usize;

    /// Probability of the positive (churn) class, in `[0, 1]`.
    fn predict_proba(&self, row: &[f64]) -> Result<f64>;

    /// Linear terms, only for models whose score is affine in the input.
    fn linear_terms(&self) -> Option<LinearTerms<'_>> {
        None
    }

    /// Hard class at the given probability threshold.
    fn predict(&self, row: &[f64], threshold: f64) -> Result<u8> {
        Ok(u8::from(self.predict_proba(row)? >= threshold))
    }
}

/// Fit diagnostics stored alongside the coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    /// Fingerprint of the feature schema the model was fitted on
    pub schema_fingerprint: String,
    pub iterations: usize,
    pub converged: bool,
    /// Per-class sample weights `[negative, positive]`
    pub class_weights: [f64; 2],
    pub inverse_regularization: f64,
    pub training_rows: usize,
}

/// Logistic regression over the feature schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub metadata: ModelMetadata,
}

impl LogisticModel {
    /// Log-odds of churn for one row.
    pub fn decision_function(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(ChurnError::SchemaMismatch(format!(
                "row has {} features, model expects {}",
                row.len(),
                self.coefficients.len()
            )));
        }
        Ok(self.intercept + dot(&self.coefficients, row))
    }

    /// Serialize into the opaque blob persisted as `model.bin`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// BLAKE3 hex of the serialized blob.
    pub fn hash_hex(&self) -> Result<String> {
        Ok(hex::encode(blake3::hash(&self.to_bytes()?).as_bytes()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)
            .map_err(ChurnError::io(format!("writing model {}", path.display())))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ChurnError::MissingArtifact {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)
            .map_err(ChurnError::io(format!("reading model {}", path.display())))?;
        Self::from_bytes(&bytes)
    }
}

impl Classifier for LogisticModel {
    fn family(&self) -> ModelFamily {
        ModelFamily::Linear
    }

    fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        Ok(sigmoid(self.decision_function(row)?))
    }

    fn linear_terms(&self) -> Option<LinearTerms<'_>> {
        Some(LinearTerms {
            coefficients: &self.coefficients,
            intercept: self.intercept,
        })
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Logistic function, stable for large `|z|`.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LogisticModel {
        LogisticModel {
            coefficients: vec![-0.05, 0.8, 1.2],
            intercept: -0.3,
            metadata: ModelMetadata {
                version: "test".into(),
                schema_fingerprint: "abc".into(),
                iterations: 7,
                converged: true,
                class_weights: [0.68, 1.87],
                inverse_regularization: 1.0,
                training_rows: 100,
            },
        }
    }

    #[test]
    fn sigmoid_is_bounded_and_symmetric() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(3.0) + sigmoid(-3.0) - 1.0).abs() < 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
    }

    #[test]
    fn wrong_width_is_a_schema_mismatch() {
        let err = model().predict_proba(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    }

    #[test]
    fn predict_applies_threshold() {
        let m = model();
        let row = [0.0, 1.0, 1.0];
        assert!(m.predict_proba(&row).unwrap() > 0.5);
        assert_eq!(m.predict(&row, 0.5).unwrap(), 1);
        assert_eq!(m.predict(&row, 0.99).unwrap(), 0);
    }

    #[test]
    fn saved_model_scores_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let original = model();
        original.save(&path).unwrap();
        let reloaded = LogisticModel::load(&path).unwrap();
        assert_eq!(original, reloaded);

        let row = [12.0, 1.0, 0.0];
        assert_eq!(
            original.predict_proba(&row).unwrap().to_bits(),
            reloaded.predict_proba(&row).unwrap().to_bits()
        );
        assert_eq!(original.hash_hex().unwrap(), reloaded.hash_hex().unwrap());
    }

    #[test]
    fn loading_absent_model_reports_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = LogisticModel::load(&dir.path().join("model.bin")).unwrap_err();
        assert!(err.is_missing_artifact());
    }
}
