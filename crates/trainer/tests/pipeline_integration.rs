//! Integration tests for the churn pipeline build
//!
//! Builds from the bundled sample dataset and checks the published
//! generation end to end.

use anyhow::Result;
use churn_core::{
    clean, project, Classifier, ContractType, CustomerProfile, FeatureSchema, InternetService,
    LogisticModel, PipelineConfig,
};
use churn_trainer::artifacts::{
    ArtifactLayout, METRICS_JSON, MODEL_BIN, SCHEMA_JSON, X_TEST_CSV, X_TRAIN_CSV, Y_TEST_CSV,
};
use churn_trainer::dataset::{parse_raw_csv, read_feature_header, read_labels_csv};
use churn_trainer::{build_pipeline, run, EvaluationReport};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SAMPLE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/telco_sample.csv");

fn config_for(raw: &Path, root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.raw_data = raw.to_path_buf();
    config.paths.artifact_root = root.to_path_buf();
    config
}

fn sample_build() -> Result<(TempDir, PipelineConfig)> {
    let dir = tempfile::tempdir()?;
    let config = config_for(Path::new(SAMPLE), &dir.path().join("artifacts"));
    Ok((dir, config))
}

#[test]
fn test_blank_charges_become_zero_and_yes_becomes_one() -> Result<()> {
    let raw = parse_raw_csv(
        b"customerID,tenure,Contract,TotalCharges,Churn\n0001,0,Month-to-month,,Yes\n",
    )?;
    let table = clean(&raw, &PipelineConfig::default().cleaning)?;
    assert_eq!(table.numeric("TotalCharges"), Some(&[0.0][..]));
    assert_eq!(table.numeric("churn"), Some(&[1.0][..]));
    assert!(table.column("customerID").is_none());
    Ok(())
}

#[test]
fn test_unknown_label_publishes_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let content = std::fs::read_to_string(SAMPLE)?;
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let last = lines.len() - 1;
    lines[last] = format!("{}Maybe", lines[last].trim_end_matches("Yes").trim_end_matches("No"));
    let raw_path = dir.path().join("bad.csv");
    std::fs::write(&raw_path, lines.join("\n"))?;

    let root = dir.path().join("artifacts");
    let err = build_pipeline(&config_for(&raw_path, &root)).unwrap_err();
    assert!(err.to_string().contains("Maybe"), "{err}");
    assert!(!root.exists(), "a failed build must not create artifacts");
    Ok(())
}

#[test]
fn test_new_short_tenure_fiber_customer_is_high_risk() -> Result<()> {
    let (_dir, config) = sample_build()?;
    let published = build_pipeline(&config)?;

    let schema: FeatureSchema = churn_core::serialization::read_json(
        &published.generation_dir.join(SCHEMA_JSON),
    )?;
    let model = LogisticModel::load(&published.generation_dir.join(MODEL_BIN))?;

    let profile = CustomerProfile {
        tenure: 0,
        monthly_charges: 70.0,
        contract: ContractType::MonthToMonth,
        internet_service: InternetService::FiberOptic,
        paperless_billing: true,
        senior_citizen: false,
    };
    let projection = project(&profile.to_scenario(), &schema)?;
    let probability = model.predict_proba(&projection.row)?;
    assert!(probability >= 0.5, "probability {probability}");
    assert_eq!(model.predict(&projection.row, 0.5)?, 1);
    Ok(())
}

#[test]
fn test_confusion_counts_cover_test_set() -> Result<()> {
    let (_dir, config) = sample_build()?;
    let published = build_pipeline(&config)?;
    let dir = &published.generation_dir;

    let metrics: EvaluationReport = churn_core::serialization::read_json(&dir.join(METRICS_JSON))?;
    let y_test = read_labels_csv(&dir.join(Y_TEST_CSV))?;
    assert_eq!(metrics.confusion.total(), y_test.len());
    assert_eq!(published.manifest.rows.test, y_test.len());
    assert!(metrics.roc_auc > 0.5);
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    Ok(())
}

#[test]
fn test_feature_files_share_the_schema_header() -> Result<()> {
    let (_dir, config) = sample_build()?;
    let published = build_pipeline(&config)?;
    let dir = &published.generation_dir;

    let schema: FeatureSchema = churn_core::serialization::read_json(&dir.join(SCHEMA_JSON))?;
    let train_header = read_feature_header(&dir.join(X_TRAIN_CSV))?;
    let test_header = read_feature_header(&dir.join(X_TEST_CSV))?;
    assert_eq!(train_header.columns(), schema.columns());
    assert_eq!(test_header.columns(), schema.columns());
    assert!(schema.index_of("Contract_One year").is_some());
    assert!(schema.index_of("Contract_Month-to-month").is_none());
    assert!(schema.index_of("customerID").is_none());
    Ok(())
}

#[test]
fn test_rebuild_is_bit_identical() -> Result<()> {
    let (_dir, config) = sample_build()?;
    let first = build_pipeline(&config)?;
    let train_a = std::fs::read(first.generation_dir.join(X_TRAIN_CSV))?;
    let model_a = std::fs::read(first.generation_dir.join(MODEL_BIN))?;

    let second = build_pipeline(&config)?;
    assert_eq!(first.build_id, second.build_id);
    assert_eq!(std::fs::read(second.generation_dir.join(X_TRAIN_CSV))?, train_a);
    assert_eq!(std::fs::read(second.generation_dir.join(MODEL_BIN))?, model_a);

    let layout = ArtifactLayout::new(&config.paths.artifact_root);
    assert_eq!(layout.resolve_current()?, second.generation_dir);
    Ok(())
}

#[test]
fn test_in_memory_runs_agree() -> Result<()> {
    let bytes = std::fs::read(SAMPLE)?;
    let config = PipelineConfig::default();
    let a = run(&bytes, &config)?;
    let b = run(&bytes, &config)?;
    assert_eq!(a.schema, b.schema);
    assert_eq!(a.partition, b.partition);
    assert_eq!(a.model, b.model);
    assert!(a.model.metadata.converged);

    let full = a.partition.train.len() + a.partition.test.len();
    assert_eq!(full, a.clean.len());
    Ok(())
}

#[test]
fn test_different_seed_changes_the_build() -> Result<()> {
    let (_dir, config) = sample_build()?;
    let first = build_pipeline(&config)?;

    let mut reseeded = config.clone();
    reseeded.split.seed = 7;
    let second = build_pipeline(&reseeded)?;
    assert_ne!(first.build_id, second.build_id);

    // The previous generation is kept as a fallback
    let generations: Vec<PathBuf> = std::fs::read_dir(
        ArtifactLayout::new(&config.paths.artifact_root).generations_dir(),
    )?
    .map(|e| e.map(|e| e.path()))
    .collect::<std::io::Result<_>>()?;
    assert_eq!(generations.len(), 2);
    Ok(())
}

#[test]
fn test_missing_input_is_missing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir.path().join("absent.csv"), dir.path());
    let err = build_pipeline(&config).unwrap_err();
    assert!(err.is_missing_artifact());
}
