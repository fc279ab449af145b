//! Inference-time projection onto the feature schema
//!
//! Any schema column absent from a scenario is filled with `0.0`; any key the
//! schema does not know is dropped. Single-scenario and batch scoring both go
//! through [`project`], so no row can carry a feature the model never saw.

use crate::errors::{ChurnError, Result};
use crate::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named, possibly partial feature values for one customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario {
    values: BTreeMap<String, f64>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Scenario {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A schema-shaped row plus a record of what the projection changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub row: Vec<f64>,
    /// Schema columns absent from the scenario, zero-filled
    pub filled: Vec<String>,
    /// Scenario keys unknown to the schema
    pub dropped: Vec<String>,
}

/// Project a scenario onto the schema, in schema order.
pub fn project(scenario: &Scenario, schema: &FeatureSchema) -> Result<Projection> {
    if schema.is_empty() {
        return Err(ChurnError::SchemaMismatch(
            "feature schema is empty; no model has been trained".into(),
        ));
    }

    let mut row = Vec::with_capacity(schema.len());
    let mut filled = Vec::new();
    for column in schema.columns() {
        match scenario.get(column) {
            Some(value) if !value.is_finite() => {
                return Err(ChurnError::SchemaMismatch(format!(
                    "scenario value for '{column}' is not finite"
                )))
            }
            Some(value) => row.push(value),
            None => {
                row.push(0.0);
                filled.push(column.clone());
            }
        }
    }

    let dropped = scenario
        .iter()
        .filter(|(name, _)| schema.index_of(name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();

    Ok(Projection {
        row,
        filled,
        dropped,
    })
}

/// Name the schema-shaped row, the inverse of [`project`].
pub fn scenario_from_row(row: &[f64], schema: &FeatureSchema) -> Result<Scenario> {
    if row.len() != schema.len() {
        return Err(ChurnError::SchemaMismatch(format!(
            "row has {} values but schema has {} columns",
            row.len(),
            schema.len()
        )));
    }
    Ok(schema
        .columns()
        .iter()
        .cloned()
        .zip(row.iter().copied())
        .collect())
}
