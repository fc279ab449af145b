//! Raw → canonical cleaning
//!
//! Steps, in order:
//! 1. trim every cell
//! 2. map the label column onto a 0/1 target (unknown labels are fatal)
//! 3. coerce the charge column to numbers, zero-filling blanks
//! 4. drop the identifier column
//! 5. type the remaining columns by content and refuse any missing value
//!
//! Cleaning a table that is already canonical returns it unchanged.

use crate::config::CleanerConfig;
use crate::errors::{ChurnError, Result};
use crate::table::{CanonicalColumn, CanonicalTable, ColumnData, RawTable};
use tracing::{debug, info, instrument};

const STAGE: &str = "clean";

/// Clean a labelled raw table into the canonical form used for training.
#[instrument(skip_all, fields(rows = raw.len()))]
pub fn clean(raw: &RawTable, config: &CleanerConfig) -> Result<CanonicalTable> {
    let table = clean_inner(raw, config, true)?;
    info!(
        rows = table.len(),
        columns = table.columns().len(),
        "Cleaned raw table"
    );
    Ok(table)
}

/// Clean a table whose label column is optional.
///
/// Used for batch inference on customers whose outcome is unknown. When the
/// label is present it is still validated and emitted as the target.
pub fn clean_unlabeled(raw: &RawTable, config: &CleanerConfig) -> Result<CanonicalTable> {
    clean_inner(raw, config, false)
}

fn clean_inner(raw: &RawTable, config: &CleanerConfig, require_label: bool) -> Result<CanonicalTable> {
    let label_idx = raw.column_index(&config.label_column);
    let target_idx = raw.column_index(&config.target_column);
    let charge_idx = raw.column_index(&config.charge_column);

    if charge_idx.is_none() {
        return Err(missing_column(&config.charge_column));
    }
    if require_label && label_idx.is_none() && target_idx.is_none() {
        return Err(missing_column(&config.label_column));
    }

    let mut columns = Vec::with_capacity(raw.headers().len());
    let mut missing: Vec<(String, usize)> = Vec::new();

    for (idx, name) in raw.headers().iter().enumerate() {
        if *name == config.id_column || Some(idx) == label_idx {
            continue;
        }
        // A fresh label takes precedence over a stale target column.
        if Some(idx) == target_idx && label_idx.is_some() {
            continue;
        }

        let cells: Vec<&str> = raw.column(idx).map(str::trim).collect();
        let data = if Some(idx) == charge_idx {
            coerce_charges(name, &cells)
        } else if Some(idx) == target_idx {
            ColumnData::Numeric(parse_target(&cells)?)
        } else {
            let (data, blanks) = infer_column(&cells);
            if blanks > 0 {
                missing.push((name.clone(), blanks));
            }
            data
        };
        columns.push(CanonicalColumn {
            name: name.clone(),
            data,
        });
    }

    if let Some(idx) = label_idx {
        let target = map_labels(raw, idx, config)?;
        columns.push(CanonicalColumn {
            name: config.target_column.clone(),
            data: ColumnData::Numeric(target),
        });
    }

    if !missing.is_empty() {
        let listing = missing
            .iter()
            .map(|(name, count)| format!("{name} ({count})"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ChurnError::data_integrity(
            STAGE,
            format!("missing values remain after cleaning in: {listing}"),
        ));
    }

    CanonicalTable::new(columns)
}

fn missing_column(name: &str) -> ChurnError {
    ChurnError::data_integrity(STAGE, format!("required column '{name}' not found"))
}

fn map_labels(raw: &RawTable, idx: usize, config: &CleanerConfig) -> Result<Vec<f64>> {
    raw.column(idx)
        .map(str::trim)
        .enumerate()
        .map(|(row, value)| {
            if value == config.positive_label {
                Ok(1.0)
            } else if value == config.negative_label {
                Ok(0.0)
            } else {
                Err(ChurnError::data_integrity(
                    STAGE,
                    format!(
                        "unexpected value '{value}' in {} at row {}; expected '{}' or '{}'",
                        config.label_column,
                        row + 1,
                        config.positive_label,
                        config.negative_label
                    ),
                ))
            }
        })
        .collect()
}

fn parse_target(cells: &[&str]) -> Result<Vec<f64>> {
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| match cell.parse::<f64>() {
            Ok(v) if v == 0.0 || v == 1.0 => Ok(v),
            _ => Err(ChurnError::data_integrity(
                STAGE,
                format!("target value '{cell}' at row {} is not 0 or 1", row + 1),
            )),
        })
        .collect()
}

/// Unparsable or blank charges mean no charges accrued yet.
fn coerce_charges(name: &str, cells: &[&str]) -> ColumnData {
    let mut coerced = 0usize;
    let values = cells
        .iter()
        .map(|cell| match parse_finite(cell) {
            Some(v) => v,
            None => {
                coerced += 1;
                0.0
            }
        })
        .collect();
    if coerced > 0 {
        debug!(column = name, coerced, "Zero-filled unparsable charges");
    }
    ColumnData::Numeric(values)
}

/// Numeric when every non-blank cell parses; blanks are counted as missing.
fn infer_column(cells: &[&str]) -> (ColumnData, usize) {
    let blanks = cells.iter().filter(|c| c.is_empty()).count();
    let non_blank = cells.len() - blanks;
    let parsed: Option<Vec<f64>> = cells
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| parse_finite(c))
        .collect();

    match parsed {
        Some(values) if non_blank > 0 && blanks == 0 => (ColumnData::Numeric(values), 0),
        Some(_) if non_blank > 0 => {
            // Keep the numeric type; the blanks fail the missing-value check.
            (ColumnData::Numeric(Vec::new()), blanks)
        }
        _ => (
            ColumnData::Text(cells.iter().map(|c| c.to_string()).collect()),
            blanks,
        ),
    }
}

fn parse_finite(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn sample() -> RawTable {
        raw(
            &["customerID", "gender", "tenure", "Contract", "TotalCharges", "Churn"],
            &[
                &["0001-A", " Female ", "1", "Month-to-month", "29.85", "No"],
                &["0002-B", "Male", "0", " Two year", " ", "Yes"],
                &["0003-C", "Male", "45", "One year", "1840.75", " No "],
            ],
        )
    }

    #[test]
    fn blank_charge_becomes_zero_and_label_maps_to_one() {
        let table = clean(&sample(), &CleanerConfig::default()).unwrap();
        assert_eq!(table.numeric("TotalCharges").unwrap(), &[29.85, 0.0, 1840.75]);
        assert_eq!(table.numeric("churn").unwrap(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn identifier_and_text_label_are_dropped() {
        let table = clean(&sample(), &CleanerConfig::default()).unwrap();
        assert_eq!(
            table.column_names(),
            vec!["gender", "tenure", "Contract", "TotalCharges", "churn"]
        );
    }

    #[test]
    fn text_cells_are_trimmed_and_typed_by_content() {
        let table = clean(&sample(), &CleanerConfig::default()).unwrap();
        match &table.column("gender").unwrap().data {
            ColumnData::Text(values) => assert_eq!(values[0], "Female"),
            other => panic!("gender should be text, got {other:?}"),
        }
        assert_eq!(table.numeric("tenure").unwrap(), &[1.0, 0.0, 45.0]);
        match &table.column("Contract").unwrap().data {
            ColumnData::Text(values) => assert_eq!(values[1], "Two year"),
            other => panic!("Contract should be text, got {other:?}"),
        }
    }

    #[test]
    fn unknown_label_is_fatal() {
        let table = raw(
            &["customerID", "TotalCharges", "Churn"],
            &[&["1", "10", "Yes"], &["2", "20", "Maybe"]],
        );
        let err = clean(&table, &CleanerConfig::default()).unwrap_err();
        match err {
            ChurnError::DataIntegrity { stage, detail } => {
                assert_eq!(stage, "clean");
                assert!(detail.contains("'Maybe'"));
                assert!(detail.contains("row 2"));
            }
            other => panic!("expected DataIntegrity, got {other:?}"),
        }
    }

    #[test]
    fn residual_missing_values_list_offending_columns() {
        let table = raw(
            &["gender", "tenure", "TotalCharges", "Churn"],
            &[&["", "1", "10", "Yes"], &["Male", "", "20", "No"]],
        );
        let err = clean(&table, &CleanerConfig::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("gender (1)"));
        assert!(message.contains("tenure (1)"));
    }

    #[test]
    fn missing_required_columns_are_fatal() {
        let no_label = raw(&["TotalCharges"], &[&["1"]]);
        assert!(clean(&no_label, &CleanerConfig::default()).is_err());
        let no_charge = raw(&["Churn"], &[&["Yes"]]);
        assert!(clean(&no_charge, &CleanerConfig::default()).is_err());
    }

    #[test]
    fn cleaning_clean_output_is_a_no_op() {
        let config = CleanerConfig::default();
        let once = clean(&sample(), &config).unwrap();
        let twice = clean(&once.to_raw(), &config).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unlabeled_tables_clean_without_target() {
        let table = raw(
            &["customerID", "tenure", "TotalCharges"],
            &[&["1", "3", "90.5"]],
        );
        let config = CleanerConfig::default();
        assert!(clean(&table, &config).is_err());
        let cleaned = clean_unlabeled(&table, &config).unwrap();
        assert_eq!(cleaned.column_names(), vec!["tenure", "TotalCharges"]);
    }
}
