//! CSV dataset loading and artifact encoding
//!
//! Reads the raw customer file into a `RawTable` and renders canonical
//! tables, feature matrices and label vectors as CSV bytes. Feature files
//! carry the schema as their header row.

use churn_core::table::format_number;
use churn_core::{CanonicalTable, ChurnError, CleanerConfig, FeatureSchema, RawTable, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Load a delimited file with a header row.
pub fn read_raw_csv(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(ChurnError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let context = format!("reading {}", path.display());
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(ChurnError::csv(context.clone()))?;
    read_raw(&mut reader, &context)
}

/// Parse delimited bytes with a header row.
pub fn parse_raw_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    read_raw(&mut reader, "parsing csv")
}

fn read_raw<R: std::io::Read>(reader: &mut csv::Reader<R>, context: &str) -> Result<RawTable> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(ChurnError::csv(context))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(ChurnError::csv(context))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    RawTable::new(headers, rows)
}

/// Shape and quality profile of a raw table, logged before cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: Vec<String>,
    /// Blank cells per column, only columns with at least one
    pub missing: BTreeMap<String, usize>,
    /// Share of each label value, when the label column exists
    pub label_distribution: Option<BTreeMap<String, f64>>,
}

impl DatasetProfile {
    pub fn of(raw: &RawTable, config: &CleanerConfig) -> Self {
        let missing = raw
            .headers()
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| {
                let blanks = raw.column(idx).filter(|c| c.trim().is_empty()).count();
                (blanks > 0).then(|| (name.clone(), blanks))
            })
            .collect();

        let label_distribution = raw.column_index(&config.label_column).map(|idx| {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for value in raw.column(idx) {
                *counts.entry(value.trim().to_string()).or_default() += 1;
            }
            let total = raw.len().max(1) as f64;
            counts
                .into_iter()
                .map(|(k, v)| (k, v as f64 / total))
                .collect()
        });

        Self {
            rows: raw.len(),
            columns: raw.headers().to_vec(),
            missing,
            label_distribution,
        }
    }

    pub fn log(&self) {
        info!(rows = self.rows, columns = self.columns.len(), "Raw dataset profile");
        for (column, count) in &self.missing {
            info!("  missing: {column} = {count}");
        }
        match &self.label_distribution {
            Some(distribution) => {
                for (label, share) in distribution {
                    info!("  label {label}: {:.3}", share);
                }
            }
            None => info!("  label column not found"),
        }
    }
}

fn write_rows<I>(headers: &[String], rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(headers)
        .map_err(ChurnError::csv("writing header"))?;
    for row in rows {
        writer
            .write_record(&row)
            .map_err(ChurnError::csv("writing row"))?;
    }
    writer
        .into_inner()
        .map_err(|e| ChurnError::io("flushing csv buffer")(e.into_error()))
}

/// Canonical table as CSV.
pub fn canonical_csv(table: &CanonicalTable) -> Result<Vec<u8>> {
    let raw = table.to_raw();
    write_rows(raw.headers(), raw.rows().iter().cloned())
}

/// Feature matrix as CSV whose header is the schema.
pub fn features_csv(schema: &FeatureSchema, rows: &[Vec<f64>]) -> Result<Vec<u8>> {
    write_rows(
        schema.columns(),
        rows.iter()
            .map(|row| row.iter().map(|v| format_number(*v)).collect()),
    )
}

/// Label vector as single-column CSV.
pub fn labels_csv(target: &str, labels: &[u8]) -> Result<Vec<u8>> {
    write_rows(
        &[target.to_string()],
        labels.iter().map(|l| vec![l.to_string()]),
    )
}

/// Read a feature file back; the header becomes the schema.
pub fn read_features_csv(path: &Path) -> Result<(FeatureSchema, Vec<Vec<f64>>)> {
    let raw = read_raw_csv(path)?;
    let schema = FeatureSchema::from_header(raw.headers().to_vec())?;
    let rows = raw
        .rows()
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .map(|cell| {
                    cell.trim().parse::<f64>().map_err(|_| {
                        ChurnError::data_integrity(
                            "load",
                            format!("{} row {}: '{cell}' is not numeric", path.display(), r + 1),
                        )
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((schema, rows))
}

/// Read only the header of a feature file.
pub fn read_feature_header(path: &Path) -> Result<FeatureSchema> {
    if !path.exists() {
        return Err(ChurnError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let context = format!("reading header of {}", path.display());
    let mut reader = csv::Reader::from_path(path).map_err(ChurnError::csv(context.clone()))?;
    let headers = reader.headers().map_err(ChurnError::csv(context))?;
    FeatureSchema::from_header(headers.iter().map(str::to_string))
}

/// Read a single-column label file.
pub fn read_labels_csv(path: &Path) -> Result<Vec<u8>> {
    let raw = read_raw_csv(path)?;
    if raw.headers().len() != 1 {
        return Err(ChurnError::data_integrity(
            "load",
            format!("{} should have one column", path.display()),
        ));
    }
    raw.rows()
        .iter()
        .map(|row| match row[0].trim() {
            "0" => Ok(0),
            "1" => Ok(1),
            other => Err(ChurnError::data_integrity(
                "load",
                format!("{}: label '{other}' is not 0 or 1", path.display()),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use churn_core::{clean, encode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RAW: &str = "customerID,gender,tenure,Contract,TotalCharges,Churn\n\
                       0001,Female,1,Month-to-month,29.85,No\n\
                       0002,Male,0,\"Two year\", ,Yes\n\
                       0003,Male,45,One year,1840.75,No\n";

    fn create_test_csv() -> anyhow::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(RAW.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_csv() -> anyhow::Result<()> {
        let file = create_test_csv()?;
        let raw = read_raw_csv(file.path())?;
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.headers()[5], "Churn");
        assert_eq!(raw.rows()[1][3], "Two year");
        assert_eq!(raw.rows()[1][4], " ");
        Ok(())
    }

    #[test]
    fn test_missing_file_is_missing_artifact() {
        let err = read_raw_csv(Path::new("/nonexistent/telco.csv")).unwrap_err();
        assert!(err.is_missing_artifact());
    }

    #[test]
    fn test_profile_counts_blanks_and_labels() -> anyhow::Result<()> {
        let raw = parse_raw_csv(RAW.as_bytes())?;
        let profile = DatasetProfile::of(&raw, &CleanerConfig::default());
        assert_eq!(profile.rows, 3);
        assert_eq!(profile.missing.get("TotalCharges"), Some(&1));
        let labels = profile.label_distribution.expect("label column present");
        assert!((labels["No"] - 2.0 / 3.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_feature_file_header_is_schema() -> anyhow::Result<()> {
        let raw = parse_raw_csv(RAW.as_bytes())?;
        let config = CleanerConfig::default();
        let encoded = encode(&clean(&raw, &config)?, &config.target_column)?;

        let mut file = NamedTempFile::new()?;
        file.write_all(&features_csv(&encoded.schema, &encoded.rows)?)?;
        file.flush()?;

        let (schema, rows) = read_features_csv(file.path())?;
        assert_eq!(schema.columns(), encoded.schema.columns());
        assert_eq!(rows, encoded.rows);
        assert_eq!(read_feature_header(file.path())?.columns(), encoded.schema.columns());
        Ok(())
    }

    #[test]
    fn test_labels_round_trip() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(&labels_csv("churn", &[0, 1, 1])?)?;
        file.flush()?;
        assert_eq!(read_labels_csv(file.path())?, vec![0, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_canonical_csv_is_stable() -> anyhow::Result<()> {
        let raw = parse_raw_csv(RAW.as_bytes())?;
        let table = clean(&raw, &CleanerConfig::default())?;
        let a = canonical_csv(&table)?;
        let b = canonical_csv(&table)?;
        assert_eq!(a, b);
        let text = String::from_utf8(a)?;
        assert!(text.starts_with("gender,tenure,Contract,TotalCharges,churn\n"));
        assert!(text.contains("Male,0,Two year,0,1\n"));
        Ok(())
    }
}
