//! Integration tests for the churn scoring service

use anyhow::Result;
use churn_core::{
    ChurnError, ContractType, CustomerProfile, FeatureSchema, InternetService, PipelineConfig,
};
use churn_service::{ArtifactStore, ChurnService, RiskLevel};
use churn_trainer::artifacts::{MODEL_HASH, SCHEMA_JSON};
use churn_trainer::dataset::parse_raw_csv;
use std::path::Path;
use tempfile::TempDir;

const SAMPLE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/telco_sample.csv");

fn service_in(dir: &TempDir) -> ChurnService {
    let mut config = PipelineConfig::default();
    config.paths.raw_data = Path::new(SAMPLE).to_path_buf();
    config.paths.artifact_root = dir.path().join("artifacts");
    ChurnService::new(config)
}

fn new_fiber_customer() -> CustomerProfile {
    CustomerProfile {
        tenure: 0,
        monthly_charges: 70.0,
        contract: ContractType::MonthToMonth,
        internet_service: InternetService::FiberOptic,
        paperless_billing: true,
        senior_citizen: false,
    }
}

#[test]
fn test_missing_artifacts_trigger_exactly_one_rebuild() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    assert_eq!(service.rebuilds(), 0);

    let assessment = service.score_profile(&new_fiber_customer())?;
    assert!(assessment.probability >= 0.5);
    assert_eq!(assessment.level, RiskLevel::High);
    assert_eq!(service.rebuilds(), 1);

    // Later calls reuse the loaded context
    service.score_profile(&new_fiber_customer())?;
    assert_eq!(service.rebuilds(), 1);

    // A fresh service finds the published build and does not rebuild
    let again = service_in(&dir);
    let second = again.score_profile(&new_fiber_customer())?;
    assert_eq!(again.rebuilds(), 0);
    assert_eq!(second.probability.to_bits(), assessment.probability.to_bits());
    Ok(())
}

#[test]
fn test_rebuild_can_be_disabled() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = PipelineConfig::default();
    config.paths.raw_data = Path::new(SAMPLE).to_path_buf();
    config.paths.artifact_root = dir.path().join("artifacts");
    config.scoring.rebuild_on_missing = false;

    let service = ChurnService::new(config);
    let err = service.score_profile(&new_fiber_customer()).unwrap_err();
    assert!(err.is_missing_artifact());
    assert_eq!(service.rebuilds(), 0);
    Ok(())
}

#[test]
fn test_concurrent_scoring_is_consistent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    let context = service.context()?;
    let expected = context.score_profile(&new_fiber_customer())?.probability;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let context = context.clone();
                scope.spawn(move || {
                    let mut profile = new_fiber_customer();
                    profile.tenure = i;
                    let varied = context.score_profile(&profile).map(|a| a.probability);
                    let fixed = context
                        .score_profile(&new_fiber_customer())
                        .map(|a| a.probability);
                    (varied, fixed)
                })
            })
            .collect();
        for handle in handles {
            let (varied, fixed) = handle.join().expect("scoring thread panicked");
            assert!(varied.is_ok());
            assert_eq!(fixed.unwrap().to_bits(), expected.to_bits());
        }
    });
    Ok(())
}

#[test]
fn test_batch_scoring_matches_profile_scoring() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);

    // Same customer as the profile: every other field at its reference level
    let raw = parse_raw_csv(
        b"customerID,gender,SeniorCitizen,Partner,tenure,Contract,PaperlessBilling,\
InternetService,PaymentMethod,MonthlyCharges,TotalCharges\n\
X-1,Female,0,No,0,Month-to-month,Yes,Fiber optic,Bank transfer (automatic),70, \n\
X-2,Male,0,Yes,70,Two year,No,No,Mailed check,20,1400\n",
    )?;
    let batch = service.score_batch(&raw)?;
    assert_eq!(batch.len(), 2);

    let single = service.score_profile(&new_fiber_customer())?;
    assert_eq!(batch[0].probability.to_bits(), single.probability.to_bits());
    assert_eq!(batch[1].level, RiskLevel::Low);
    Ok(())
}

#[test]
fn test_batch_scores_the_labelled_sample() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    let raw = parse_raw_csv(&std::fs::read(SAMPLE)?)?;
    let batch = service.score_batch(&raw)?;
    assert_eq!(batch.len(), raw.len());
    assert!(batch.iter().all(|a| (0.0..=1.0).contains(&a.probability)));
    Ok(())
}

#[test]
fn test_summary_matches_clean_table() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    let summary = service.summary()?;

    let raw = parse_raw_csv(&std::fs::read(SAMPLE)?)?;
    assert_eq!(summary.customers, raw.len());
    let churn_idx = raw.column_index("Churn").unwrap();
    let churned = raw.column(churn_idx).filter(|v| v.trim() == "Yes").count();
    assert!((summary.churn_rate - churned as f64 / raw.len() as f64).abs() < 1e-12);
    assert!(summary.mean_tenure > 0.0);
    Ok(())
}

#[test]
fn test_importance_lists_schema_features() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    let importance = service.importance()?;
    let context = service.context()?;
    assert_eq!(importance.features.len(), context.schema().len());
    let ranked = importance.ranked();
    assert!(ranked
        .windows(2)
        .all(|pair| pair[0].importance >= pair[1].importance));
    assert_eq!(importance.top(3).len(), 3);
    Ok(())
}

#[test]
fn test_tampered_schema_is_a_mismatch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    let generation = service.rebuild()?;

    let store = ArtifactStore::new(dir.path().join("artifacts"));
    let live = store.layout().resolve_current()?;
    assert!(live.ends_with(generation.build_id()));

    let other = FeatureSchema::from_header(["tenure", "MonthlyCharges"])?;
    std::fs::write(
        live.join(SCHEMA_JSON),
        churn_core::serialization::canonical_json_string(&other)?,
    )?;
    let err = store.load_context(0.5).unwrap_err();
    assert!(matches!(err, ChurnError::SchemaMismatch(_)), "{err}");
    Ok(())
}

#[test]
fn test_tampered_model_hash_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    service.rebuild()?;

    let store = ArtifactStore::new(dir.path().join("artifacts"));
    let live = store.layout().resolve_current()?;
    std::fs::write(live.join(MODEL_HASH), "0".repeat(64))?;
    let err = store.load_context(0.5).unwrap_err();
    assert!(matches!(err, ChurnError::DataIntegrity { .. }), "{err}");
    Ok(())
}

#[test]
fn test_missing_model_file_is_missing_artifact() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    service.rebuild()?;

    let store = ArtifactStore::new(dir.path().join("artifacts"));
    let live = store.layout().resolve_current()?;
    std::fs::remove_file(live.join("model.bin"))?;
    assert!(store.load_context(0.5).unwrap_err().is_missing_artifact());
    Ok(())
}

#[test]
fn test_missing_model_file_is_rebuilt_and_scored() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let expected = service_in(&dir).rebuild()?;
    let live = expected.schema();
    let generation = ArtifactStore::new(dir.path().join("artifacts"))
        .layout()
        .resolve_current()?;
    std::fs::remove_file(generation.join("model.bin"))?;

    let service = service_in(&dir);
    let assessment = service.score_profile(&new_fiber_customer())?;
    assert_eq!(service.rebuilds(), 1);
    assert_eq!(service.context()?.build_id(), expected.build_id());
    assert_eq!(service.context()?.schema().fingerprint(), live.fingerprint());
    assert!(generation.join("model.bin").is_file());
    assert_eq!(
        assessment.probability.to_bits(),
        expected.score_profile(&new_fiber_customer())?.probability.to_bits()
    );
    Ok(())
}

#[test]
fn test_manifest_describes_the_live_build() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let service = service_in(&dir);
    let context = service.rebuild()?;

    let manifest = service.store().load_manifest()?;
    assert_eq!(manifest.build_id, context.build_id());
    assert_eq!(manifest.schema_fingerprint, context.schema().fingerprint());
    assert_eq!(manifest.feature_count, context.schema().len());
    assert_eq!(manifest.rows.train + manifest.rows.test, manifest.rows.clean);
    assert!(manifest.files.contains_key("model.bin"));
    Ok(())
}
