//! Loaded scoring state and risk assessments

use churn_core::{
    project, CanonicalTable, Classifier, CustomerProfile, FeatureSchema, Result, Scenario,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Low,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("HIGH"),
            Self::Low => f.write_str("LOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub probability: f64,
    pub level: RiskLevel,
}

impl RiskAssessment {
    pub fn new(probability: f64, threshold: f64) -> Self {
        let level = if probability >= threshold {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };
        Self { probability, level }
    }
}

/// Schema and classifier of one published build.
///
/// Immutable once loaded; clones share the same schema and model, so a
/// context can be handed to any number of scoring threads.
#[derive(Clone)]
pub struct ScoringContext {
    build_id: String,
    schema: Arc<FeatureSchema>,
    model: Arc<dyn Classifier>,
    threshold: f64,
}

impl ScoringContext {
    pub fn new(
        build_id: impl Into<String>,
        schema: FeatureSchema,
        model: Arc<dyn Classifier>,
        threshold: f64,
    ) -> Self {
        Self {
            build_id: build_id.into(),
            schema: Arc::new(schema),
            model,
            threshold,
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a named-feature scenario.
    pub fn score(&self, scenario: &Scenario) -> Result<RiskAssessment> {
        let projection = project(scenario, &self.schema)?;
        if !projection.dropped.is_empty() {
            debug!(dropped = ?projection.dropped, "Scenario keys outside the schema");
        }
        debug!(filled = projection.filled.len(), "Zero-filled schema columns");
        let probability = self.model.predict_proba(&projection.row)?;
        Ok(RiskAssessment::new(probability, self.threshold))
    }

    pub fn score_profile(&self, profile: &CustomerProfile) -> Result<RiskAssessment> {
        self.score(&profile.to_scenario())
    }

    /// Score every row of a canonical table.
    pub fn score_table(&self, table: &CanonicalTable) -> Result<Vec<RiskAssessment>> {
        (0..table.len())
            .map(|row| self.score(&self.schema.scenario_for_row(table, row)?))
            .collect()
    }
}

impl fmt::Debug for ScoringContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringContext")
            .field("build_id", &self.build_id)
            .field("features", &self.schema.len())
            .field("family", &self.model.family())
            .field("threshold", &self.threshold)
            .finish()
    }
}
