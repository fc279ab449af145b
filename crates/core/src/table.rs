//! Raw and canonical customer tables
//!
//! A `RawTable` is the delimited input exactly as read: a header and string
//! cells. A `CanonicalTable` is the cleaned, typed form that every later
//! stage consumes; it never contains a missing value.

use crate::errors::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Untyped customer records, one row per customer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a raw table, rejecting ragged rows and duplicate headers.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        for (i, name) in headers.iter().enumerate() {
            if headers[..i].contains(name) {
                return Err(ChurnError::data_integrity(
                    "load",
                    format!("duplicate column '{name}'"),
                ));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(ChurnError::data_integrity(
                    "load",
                    format!(
                        "row {} has {} cells, expected {}",
                        idx + 1,
                        row.len(),
                        headers.len()
                    ),
                ));
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Iterate the cells of one column.
    pub fn column<'a>(&'a self, idx: usize) -> impl Iterator<Item = &'a str> + 'a {
        self.rows.iter().map(move |row| row[idx].as_str())
    }
}

/// Typed cells of a canonical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    /// Render one cell the way it is written to delimited output.
    pub fn render(&self, row: usize) -> String {
        match self {
            Self::Numeric(values) => format_number(values[row]),
            Self::Text(values) => values[row].clone(),
        }
    }
}

/// A named canonical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalColumn {
    pub name: String,
    pub data: ColumnData,
}

/// Cleaned customer table: trimmed text, numeric charges, binary target.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    columns: Vec<CanonicalColumn>,
    rows: usize,
}

impl CanonicalTable {
    /// Assemble a canonical table; all columns must have the same length and
    /// numeric cells must be finite.
    pub fn new(columns: Vec<CanonicalColumn>) -> Result<Self> {
        let rows = columns.first().map_or(0, |c| c.data.len());
        for column in &columns {
            if column.data.len() != rows {
                return Err(ChurnError::data_integrity(
                    "canonical",
                    format!(
                        "column '{}' has {} rows, expected {}",
                        column.name,
                        column.data.len(),
                        rows
                    ),
                ));
            }
            if let ColumnData::Numeric(values) = &column.data {
                if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
                    return Err(ChurnError::data_integrity(
                        "canonical",
                        format!("column '{}' row {} is not a finite number", column.name, pos + 1),
                    ));
                }
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[CanonicalColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&CanonicalColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Numeric column values, if the column exists and is numeric.
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(values)) => Some(values),
            _ => None,
        }
    }

    /// Back to string cells, preserving column order.
    pub fn to_raw(&self) -> RawTable {
        let headers = self.columns.iter().map(|c| c.name.clone()).collect();
        let rows = (0..self.rows)
            .map(|r| self.columns.iter().map(|c| c.data.render(r)).collect())
            .collect();
        RawTable { headers, rows }
    }
}

/// Shortest representation that parses back to the same `f64`.
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn raw_table_rejects_ragged_rows() {
        let err = RawTable::new(strings(&["a", "b"]), vec![strings(&["1"])]).unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 cells"));
    }

    #[test]
    fn raw_table_rejects_duplicate_headers() {
        assert!(RawTable::new(strings(&["a", "a"]), vec![]).is_err());
    }

    #[test]
    fn canonical_table_rejects_uneven_columns() {
        let columns = vec![
            CanonicalColumn {
                name: "a".into(),
                data: ColumnData::Numeric(vec![1.0, 2.0]),
            },
            CanonicalColumn {
                name: "b".into(),
                data: ColumnData::Text(strings(&["x"])),
            },
        ];
        assert!(CanonicalTable::new(columns).is_err());
    }

    #[test]
    fn numbers_render_without_trailing_zeros() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(29.85), "29.85");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn to_raw_round_trips_cells() {
        let table = CanonicalTable::new(vec![
            CanonicalColumn {
                name: "tenure".into(),
                data: ColumnData::Numeric(vec![1.0, 34.0]),
            },
            CanonicalColumn {
                name: "Contract".into(),
                data: ColumnData::Text(strings(&["Month-to-month", "One year"])),
            },
        ])
        .unwrap();
        let raw = table.to_raw();
        assert_eq!(raw.headers(), &strings(&["tenure", "Contract"])[..]);
        assert_eq!(raw.rows()[1], strings(&["34", "One year"]));
    }
}
