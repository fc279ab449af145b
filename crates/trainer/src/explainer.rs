//! Global feature attribution for linear models
//!
//! For a linear log-odds model the interventional attribution of feature j
//! on row i is `wⱼ · (xᵢⱼ − x̄ⱼ)`, with x̄ the training mean. Global
//! importance is the mean absolute attribution over the training rows.

use churn_core::{ChurnError, Classifier, FeatureSchema, ModelFamily, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
    pub coefficient: f64,
    /// Training mean the attribution is measured from
    pub baseline: f64,
}

/// Importances in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalImportance {
    pub features: Vec<FeatureImportance>,
}

impl GlobalImportance {
    /// Descending by importance; ties keep schema order.
    pub fn ranked(&self) -> Vec<&FeatureImportance> {
        let mut ranked: Vec<&FeatureImportance> = self.features.iter().collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
    }

    pub fn top(&self, k: usize) -> Vec<&FeatureImportance> {
        let mut ranked = self.ranked();
        ranked.truncate(k);
        ranked
    }
}

pub fn explain(
    model: &dyn Classifier,
    schema: &FeatureSchema,
    train_rows: &[Vec<f64>],
) -> Result<GlobalImportance> {
    let terms = match (model.family(), model.linear_terms()) {
        (ModelFamily::Linear, Some(terms)) => terms,
        (family, _) => {
            return Err(ChurnError::ModelFamily {
                family: family.to_string(),
            })
        }
    };
    if terms.coefficients.len() != schema.len() {
        return Err(ChurnError::SchemaMismatch(format!(
            "model has {} coefficients, schema has {} columns",
            terms.coefficients.len(),
            schema.len()
        )));
    }
    if train_rows.is_empty() {
        return Err(ChurnError::data_integrity(
            "explain",
            "no training rows to attribute over",
        ));
    }
    if let Some(row) = train_rows.iter().find(|r| r.len() != schema.len()) {
        return Err(ChurnError::SchemaMismatch(format!(
            "training row has {} features, schema has {}",
            row.len(),
            schema.len()
        )));
    }

    let n = train_rows.len() as f64;
    let features = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let weight = terms.coefficients[j];
            let baseline = train_rows.iter().map(|r| r[j]).sum::<f64>() / n;
            let importance = train_rows
                .iter()
                .map(|r| (weight * (r[j] - baseline)).abs())
                .sum::<f64>()
                / n;
            FeatureImportance {
                feature: name.clone(),
                importance,
                coefficient: weight,
                baseline,
            }
        })
        .collect();

    let importance = GlobalImportance { features };
    if let Some(first) = importance.ranked().first() {
        info!(feature = %first.feature, importance = first.importance, "Most influential feature");
    }
    Ok(importance)
}
