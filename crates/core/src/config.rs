//! Pipeline configuration
//!
//! Every section has a `Default` matching the reference telco dataset, so a
//! TOML file only needs the keys it wants to change. Environment variables
//! prefixed with `CHURN_` override the file.

use crate::errors::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Complete build and serving configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub cleaning: CleanerConfig,
    pub split: SplitConfig,
    pub training: TrainingConfig,
    pub scoring: ScoringConfig,
}

/// Input and artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw customer CSV
    pub raw_data: PathBuf,
    /// Directory holding published build generations and the `CURRENT` pointer
    pub artifact_root: PathBuf,
}

/// Column names and label vocabulary of the raw table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    pub id_column: String,
    pub label_column: String,
    pub positive_label: String,
    pub negative_label: String,
    /// Free-text lifetime charge column, zero-filled when unparsable
    pub charge_column: String,
    /// Name of the derived 0/1 target
    pub target_column: String,
}

/// Stratified train/test split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

/// Class weighting policy for the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Weight each class by `n / (2 * n_class)`
    Balanced,
    Uniform,
}

/// Logistic regression optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_iterations: usize,
    /// Stop once every gradient component is below this magnitude
    pub tolerance: f64,
    /// Inverse L2 strength (`C`); larger means weaker regularization
    pub inverse_regularization: f64,
    pub class_weight: ClassWeight,
}

/// Inference settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Probability at or above which a customer is high risk
    pub decision_threshold: f64,
    /// Rebuild the pipeline once when artifacts are missing
    pub rebuild_on_missing: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("data/telco_churn.csv"),
            artifact_root: PathBuf::from("artifacts"),
        }
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            id_column: "customerID".to_string(),
            label_column: "Churn".to_string(),
            positive_label: "Yes".to_string(),
            negative_label: "No".to_string(),
            charge_column: "TotalCharges".to_string(),
            target_column: "churn".to_string(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            seed: 42,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-6,
            inverse_regularization: 1.0,
            class_weight: ClassWeight::Balanced,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            rebuild_on_missing: true,
        }
    }
}

impl PipelineConfig {
    /// Load a TOML file, apply `CHURN_*` overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(ChurnError::io(format!("reading config {}", path.display())))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = env::var("CHURN_RAW_DATA") {
            self.paths.raw_data = PathBuf::from(value);
        }
        if let Ok(value) = env::var("CHURN_ARTIFACT_ROOT") {
            self.paths.artifact_root = PathBuf::from(value);
        }
        if let Some(seed) = parse_env("CHURN_SEED")? {
            self.split.seed = seed;
        }
        if let Some(fraction) = parse_env("CHURN_TEST_FRACTION")? {
            self.split.test_fraction = fraction;
        }
        if let Some(iterations) = parse_env("CHURN_MAX_ITERATIONS")? {
            self.training.max_iterations = iterations;
        }
        if let Some(threshold) = parse_env("CHURN_DECISION_THRESHOLD")? {
            self.scoring.decision_threshold = threshold;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = self.split.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ChurnError::Config(format!(
                "split.test_fraction must be in (0, 1), got {fraction}"
            )));
        }
        if self.training.max_iterations == 0 {
            return Err(ChurnError::Config(
                "training.max_iterations must be positive".into(),
            ));
        }
        if !(self.training.tolerance > 0.0) {
            return Err(ChurnError::Config("training.tolerance must be positive".into()));
        }
        if !(self.training.inverse_regularization > 0.0) {
            return Err(ChurnError::Config(
                "training.inverse_regularization must be positive".into(),
            ));
        }
        let threshold = self.scoring.decision_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ChurnError::Config(format!(
                "scoring.decision_threshold must be in [0, 1], got {threshold}"
            )));
        }
        let c = &self.cleaning;
        if c.positive_label == c.negative_label {
            return Err(ChurnError::Config(
                "cleaning.positive_label and negative_label must differ".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ChurnError::Config(format!("{key}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}
