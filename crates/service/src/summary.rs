//! Headline figures of the canonical customer table

use churn_core::{CanonicalTable, ChurnError, Result};
use serde::{Deserialize, Serialize};

pub const TENURE_COLUMN: &str = "tenure";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub customers: usize,
    pub churn_rate: f64,
    /// Mean tenure in months
    pub mean_tenure: f64,
}

impl DatasetSummary {
    pub fn from_table(table: &CanonicalTable, target_column: &str) -> Result<Self> {
        if table.is_empty() {
            return Err(ChurnError::data_integrity("summary", "canonical table is empty"));
        }
        let numeric = |name: &str| {
            table.numeric(name).ok_or_else(|| {
                ChurnError::data_integrity("summary", format!("no numeric column '{name}'"))
            })
        };
        let target = numeric(target_column)?;
        let tenure = numeric(TENURE_COLUMN)?;
        let n = table.len() as f64;

        Ok(Self {
            customers: table.len(),
            churn_rate: target.iter().sum::<f64>() / n,
            mean_tenure: tenure.iter().sum::<f64>() / n,
        })
    }
}
