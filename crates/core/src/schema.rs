//! Feature encoding and the feature schema contract
//!
//! The schema is the ordered list of numeric columns a trained model accepts:
//! numeric source columns verbatim in input order, then for each categorical
//! source column (input order) one indicator `<column>_<value>` per observed
//! value in lexical order, skipping the lexically first value which serves as
//! the reference category. The order never depends on hash-map iteration.

use crate::errors::{ChurnError, Result};
use crate::projector::Scenario;
use crate::table::{CanonicalTable, ColumnData};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

const STAGE: &str = "encode";

/// One-hot layout of a categorical source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    pub column: String,
    /// Dropped level, represented by all indicators being zero
    pub reference: String,
    /// Levels with an indicator column, lexically ordered
    pub levels: Vec<String>,
}

impl CategoricalEncoding {
    pub fn indicator_name(&self, level: &str) -> String {
        indicator_name(&self.column, level)
    }
}

/// Name of the indicator column for `column == level`.
pub fn indicator_name(column: &str, level: &str) -> String {
    format!("{column}_{level}")
}

/// Ordered, named feature contract shared by training and inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
    #[serde(default)]
    numeric: Vec<String>,
    #[serde(default)]
    categorical: Vec<CategoricalEncoding>,
}

impl FeatureSchema {
    /// Build a schema from its source layout.
    pub fn new(numeric: Vec<String>, categorical: Vec<CategoricalEncoding>) -> Result<Self> {
        let columns: Vec<String> = numeric
            .iter()
            .cloned()
            .chain(
                categorical
                    .iter()
                    .flat_map(|c| c.levels.iter().map(move |l| c.indicator_name(l))),
            )
            .collect();
        ensure_unique(&columns)?;
        Ok(Self {
            columns,
            numeric,
            categorical,
        })
    }

    /// Recover the flat schema from the header of a persisted feature file.
    ///
    /// The header is authoritative for column order. The result carries no
    /// source layout, so it can project scenarios but not re-encode rows.
    pub fn from_header<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = names.into_iter().map(Into::into).collect();
        if columns.iter().any(|c| c.is_empty()) {
            return Err(ChurnError::SchemaMismatch("empty column name in header".into()));
        }
        ensure_unique(&columns)?;
        Ok(Self {
            columns,
            numeric: Vec::new(),
            categorical: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[CategoricalEncoding] {
        &self.categorical
    }

    /// Whether the schema knows how its columns were derived from source columns.
    pub fn has_source_layout(&self) -> bool {
        !self.numeric.is_empty() || !self.categorical.is_empty()
    }

    /// BLAKE3 hex over the ordered column names.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for column in &self.columns {
            hasher.update(column.as_bytes());
            hasher.update(&[0u8]);
        }
        hex::encode(hasher.finalize().as_bytes())
    }

    /// Re-express one canonical row as a named scenario.
    ///
    /// Numeric source columns contribute their value, categorical ones an
    /// indicator set to one. Source columns absent from the table contribute
    /// nothing and are zero-filled by the projector; levels unseen at training
    /// time produce an indicator the projector drops.
    pub fn scenario_for_row(&self, table: &CanonicalTable, row: usize) -> Result<Scenario> {
        if !self.has_source_layout() {
            return Err(ChurnError::SchemaMismatch(
                "schema has no source layout; load schema.json rather than a header".into(),
            ));
        }
        if row >= table.len() {
            return Err(ChurnError::SchemaMismatch(format!(
                "row {row} out of range for table of {} rows",
                table.len()
            )));
        }

        let mut scenario = Scenario::new();
        for name in &self.numeric {
            let Some(column) = table.column(name) else {
                continue;
            };
            let value = match &column.data {
                ColumnData::Numeric(values) => values[row],
                ColumnData::Text(values) => values[row].parse::<f64>().map_err(|_| {
                    ChurnError::SchemaMismatch(format!(
                        "column '{name}' was numeric at training time but holds '{}'",
                        values[row]
                    ))
                })?,
            };
            scenario.insert(name.clone(), value);
        }
        for encoding in &self.categorical {
            if let Some(column) = table.column(&encoding.column) {
                let level = column.data.render(row);
                scenario.insert(encoding.indicator_name(&level), 1.0);
            }
        }
        Ok(scenario)
    }
}

fn ensure_unique(columns: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(ChurnError::SchemaMismatch(format!(
                "duplicate feature column '{column}'"
            )));
        }
    }
    Ok(())
}

/// Encoded feature matrix with its schema and binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDataset {
    pub schema: FeatureSchema,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl EncodedDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positive_rate(&self) -> f64 {
        positive_rate(&self.labels)
    }
}

/// Fraction of labels equal to one; zero for an empty slice.
pub fn positive_rate(labels: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    labels.iter().filter(|&&l| l == 1).count() as f64 / labels.len() as f64
}

/// Encode a canonical table into a numeric matrix and its schema.
pub fn encode(table: &CanonicalTable, target: &str) -> Result<EncodedDataset> {
    let labels = match table.column(target).map(|c| &c.data) {
        Some(ColumnData::Numeric(values)) => values
            .iter()
            .enumerate()
            .map(|(row, &v)| match v {
                v if v == 0.0 => Ok(0u8),
                v if v == 1.0 => Ok(1u8),
                other => Err(ChurnError::data_integrity(
                    STAGE,
                    format!("target '{target}' row {} holds {other}", row + 1),
                )),
            })
            .collect::<Result<Vec<u8>>>()?,
        Some(ColumnData::Text(_)) => {
            return Err(ChurnError::data_integrity(
                STAGE,
                format!("target column '{target}' is not numeric"),
            ))
        }
        None => {
            return Err(ChurnError::data_integrity(
                STAGE,
                format!("target column '{target}' not found"),
            ))
        }
    };

    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for column in table.columns().iter().filter(|c| c.name != target) {
        match &column.data {
            ColumnData::Numeric(_) => numeric.push(column.name.clone()),
            ColumnData::Text(values) => {
                let mut levels: Vec<String> = values
                    .iter()
                    .map(String::as_str)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let reference = if levels.is_empty() {
                    String::new()
                } else {
                    levels.remove(0)
                };
                debug!(
                    column = %column.name,
                    reference = %reference,
                    indicators = levels.len(),
                    "Encoded categorical column"
                );
                categorical.push(CategoricalEncoding {
                    column: column.name.clone(),
                    reference,
                    levels,
                });
            }
        }
    }

    let schema = FeatureSchema::new(numeric, categorical)
        .map_err(|e| ChurnError::data_integrity(STAGE, e.to_string()))?;

    let rows = (0..table.len())
        .map(|r| encode_row(table, &schema, r))
        .collect();

    info!(
        rows = table.len(),
        features = schema.len(),
        "Encoded canonical table"
    );
    Ok(EncodedDataset {
        schema,
        rows,
        labels,
    })
}

fn encode_row(table: &CanonicalTable, schema: &FeatureSchema, row: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(schema.len());
    for name in schema.numeric_columns() {
        out.push(table.numeric(name).map_or(0.0, |values| values[row]));
    }
    for encoding in schema.categorical_columns() {
        let value = table
            .column(&encoding.column)
            .map(|c| c.data.render(row))
            .unwrap_or_default();
        out.extend(
            encoding
                .levels
                .iter()
                .map(|level| if *level == value { 1.0 } else { 0.0 }),
        );
    }
    out
}
