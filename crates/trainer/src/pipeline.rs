//! End-to-end build: clean, encode, split, fit, evaluate, explain, publish
//!
//! `run` does all the work in memory and touches no files, so a build that
//! fails at any stage leaves the artifact root exactly as it was. `publish`
//! then writes the finished build into a staging directory, moves it into
//! `generations/` and swaps the `CURRENT` pointer by rename.

use churn_core::serialization::{canonical_json_string, hash_hex};
use churn_core::{
    clean, encode, CanonicalTable, ChurnError, FeatureSchema, LogisticModel, PipelineConfig,
    Result, VERSION,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::artifacts::{
    ArtifactLayout, BuildManifest, RowCounts, CLEAN_CSV, IMPORTANCE_JSON, MANIFEST_JSON,
    METRICS_JSON, MODEL_BIN, MODEL_HASH, SCHEMA_JSON, STAGING_PREFIX, X_TEST_CSV, X_TRAIN_CSV,
    Y_TEST_CSV, Y_TRAIN_CSV,
};
use crate::dataset::{canonical_csv, features_csv, labels_csv, parse_raw_csv, DatasetProfile};
use crate::evaluator::{evaluate, EvaluationReport};
use crate::explainer::{explain, GlobalImportance};
use crate::split::{stratified_split, Partition};
use crate::trainer::LogisticTrainer;

/// Everything a build produces, before anything is written.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub profile: DatasetProfile,
    pub input_hash: String,
    pub clean: CanonicalTable,
    pub target_column: String,
    pub schema: FeatureSchema,
    pub partition: Partition,
    pub model: LogisticModel,
    pub metrics: EvaluationReport,
    pub importance: GlobalImportance,
}

/// Location and provenance of a published build.
#[derive(Debug, Clone)]
pub struct PublishedBuild {
    pub build_id: String,
    pub generation_dir: PathBuf,
    pub manifest: BuildManifest,
}

/// Run every stage on raw CSV bytes.
#[instrument(skip_all, fields(bytes = raw_csv.len()))]
pub fn run(raw_csv: &[u8], config: &PipelineConfig) -> Result<BuildOutput> {
    config.validate()?;
    let raw = parse_raw_csv(raw_csv)?;
    let profile = DatasetProfile::of(&raw, &config.cleaning);
    profile.log();

    let table = clean(&raw, &config.cleaning)?;
    let target = config.cleaning.target_column.clone();
    let encoded = encode(&table, &target)?;
    info!(
        features = encoded.schema.len(),
        positive_rate = encoded.positive_rate(),
        "Encoded feature matrix"
    );

    let partition = stratified_split(&encoded, &config.split)?;

    let trainer = LogisticTrainer::new(config.training.clone());
    let model = trainer.train(
        &partition.train.rows,
        &partition.train.labels,
        &encoded.schema.fingerprint(),
    )?;

    let metrics = evaluate(
        &model,
        &partition.test.rows,
        &partition.test.labels,
        config.scoring.decision_threshold,
    )?;
    info!("Classification report:\n{metrics}");

    let importance = explain(&model, &encoded.schema, &partition.train.rows)?;
    for entry in importance.top(10) {
        debug!("  {}: {:.4}", entry.feature, entry.importance);
    }

    Ok(BuildOutput {
        profile,
        input_hash: hash_hex(raw_csv),
        clean: table,
        target_column: target,
        schema: encoded.schema,
        partition,
        model,
        metrics,
        importance,
    })
}

impl BuildOutput {
    /// Serialized artifact files in publish order, manifest excluded.
    fn render_files(&self) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let model_bytes = self.model.to_bytes()?;
        let model_hash = hash_hex(&model_bytes);
        Ok(vec![
            (CLEAN_CSV, canonical_csv(&self.clean)?),
            (
                X_TRAIN_CSV,
                features_csv(&self.schema, &self.partition.train.rows)?,
            ),
            (
                X_TEST_CSV,
                features_csv(&self.schema, &self.partition.test.rows)?,
            ),
            (
                Y_TRAIN_CSV,
                labels_csv(&self.target_column, &self.partition.train.labels)?,
            ),
            (
                Y_TEST_CSV,
                labels_csv(&self.target_column, &self.partition.test.labels)?,
            ),
            (MODEL_BIN, model_bytes),
            (MODEL_HASH, model_hash.into_bytes()),
            (SCHEMA_JSON, canonical_json_string(&self.schema)?.into_bytes()),
            (METRICS_JSON, canonical_json_string(&self.metrics)?.into_bytes()),
            (
                IMPORTANCE_JSON,
                canonical_json_string(&self.importance)?.into_bytes(),
            ),
        ])
    }
}

/// Content address of a build: schema, split matrices and model parameters.
fn build_id(schema: &FeatureSchema, files: &[(&'static str, Vec<u8>)]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(schema.fingerprint().as_bytes());
    for (name, bytes) in files {
        if matches!(
            *name,
            X_TRAIN_CSV | X_TEST_CSV | Y_TRAIN_CSV | Y_TEST_CSV | MODEL_BIN
        ) {
            hasher.update(name.as_bytes());
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
    }
    hex::encode(&hasher.finalize().as_bytes()[..8])
}

/// Atomically publish a finished build under `layout`.
#[instrument(skip_all, fields(root = %layout.root().display()))]
pub fn publish(output: &BuildOutput, layout: &ArtifactLayout) -> Result<PublishedBuild> {
    let files = output.render_files()?;
    let build_id = build_id(&output.schema, &files);

    let manifest = BuildManifest {
        build_id: build_id.clone(),
        created_at: chrono::Utc::now().to_rfc3339(),
        version: VERSION.to_string(),
        input_hash: output.input_hash.clone(),
        schema_fingerprint: output.schema.fingerprint(),
        model_hash: output.model.hash_hex()?,
        feature_count: output.schema.len(),
        rows: RowCounts {
            raw: output.profile.rows,
            clean: output.clean.len(),
            train: output.partition.train.len(),
            test: output.partition.test.len(),
        },
        train_positive_rate: output.partition.train.positive_rate(),
        test_positive_rate: output.partition.test.positive_rate(),
        converged: output.model.metadata.converged,
        iterations: output.model.metadata.iterations,
        files: files
            .iter()
            .map(|(name, bytes)| (name.to_string(), hash_hex(bytes)))
            .collect::<BTreeMap<_, _>>(),
    };

    let root = layout.root();
    fs::create_dir_all(layout.generations_dir()).map_err(ChurnError::io(format!(
        "creating {}",
        layout.generations_dir().display()
    )))?;
    let previous = layout.current_build_id()?;
    let target = layout.generation_dir(&build_id);

    if generation_intact(&target, &files) {
        info!(build_id = %build_id, "Generation already published; reusing it");
    } else {
        stage_generation(root, &target, &files, &manifest)?;
    }

    swap_pointer(layout, &build_id)?;
    info!(build_id = %build_id, dir = %target.display(), "Published build");

    prune_generations(layout, &build_id, previous.as_deref());

    Ok(PublishedBuild {
        build_id,
        generation_dir: target,
        manifest,
    })
}

/// True when `dir` holds every file of this build, byte for byte, plus a manifest.
fn generation_intact(dir: &Path, files: &[(&'static str, Vec<u8>)]) -> bool {
    if !dir.join(MANIFEST_JSON).is_file() {
        return false;
    }
    files.iter().all(|(name, bytes)| match fs::read(dir.join(name)) {
        Ok(found) => found == *bytes,
        Err(_) => false,
    })
}

/// Move a damaged generation under a scratch directory that removes it on drop.
fn retire_generation(root: &Path, target: &Path) -> Result<()> {
    let scratch = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)
        .map_err(ChurnError::io(format!("creating scratch dir in {}", root.display())))?;
    fs::rename(target, scratch.path().join("retired")).map_err(ChurnError::io(format!(
        "moving aside {}",
        target.display()
    )))?;
    Ok(())
}

fn stage_generation(
    root: &Path,
    target: &Path,
    files: &[(&'static str, Vec<u8>)],
    manifest: &BuildManifest,
) -> Result<()> {
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)
        .map_err(ChurnError::io(format!("creating staging dir in {}", root.display())))?;

    let manifest_json = canonical_json_string(manifest)?;
    let entries = files
        .iter()
        .map(|(name, bytes)| (*name, bytes.as_slice()))
        .chain(std::iter::once((MANIFEST_JSON, manifest_json.as_bytes())));
    for (name, bytes) in entries {
        let path = staging.path().join(name);
        fs::write(&path, bytes).map_err(ChurnError::io(format!("writing {}", path.display())))?;
        debug!("  staged {name} ({} bytes)", bytes.len());
    }

    if target.exists() {
        warn!("Generation {} is incomplete; replacing it", target.display());
        retire_generation(root, target)?;
    }

    // The emptied TempDir guard has nothing left to remove once renamed
    if let Err(e) = fs::rename(staging.path(), target) {
        if target.is_dir() {
            warn!("Generation {} appeared concurrently; keeping it", target.display());
        } else {
            return Err(ChurnError::io(format!(
                "moving {} to {}",
                staging.path().display(),
                target.display()
            ))(e));
        }
    }
    Ok(())
}

fn swap_pointer(layout: &ArtifactLayout, build_id: &str) -> Result<()> {
    let root = layout.root();
    let pointer = layout.current_pointer();
    let mut temp = NamedTempFile::new_in(root)
        .map_err(ChurnError::io(format!("creating temp pointer in {}", root.display())))?;
    writeln!(temp, "{build_id}")
        .map_err(ChurnError::io("writing temp pointer"))?;
    temp.as_file()
        .sync_all()
        .map_err(ChurnError::io("syncing temp pointer"))?;
    temp.persist(&pointer)
        .map_err(|e| ChurnError::io(format!("replacing {}", pointer.display()))(e.error))?;
    Ok(())
}

/// Keep the live and the previous generation; failures only warn.
fn prune_generations(layout: &ArtifactLayout, current: &str, previous: Option<&str>) {
    let entries = match fs::read_dir(layout.generations_dir()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list generations for pruning: {e}");
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == current || Some(name.as_ref()) == previous {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => debug!("Pruned generation {name}"),
            Err(e) => warn!("Failed to prune generation {name}: {e}"),
        }
    }
}

/// Read the configured raw file, build and publish.
pub fn build_pipeline(config: &PipelineConfig) -> Result<PublishedBuild> {
    let raw_path = &config.paths.raw_data;
    if !raw_path.exists() {
        return Err(ChurnError::MissingArtifact {
            path: raw_path.clone(),
        });
    }
    info!("Loading dataset from: {}", raw_path.display());
    let bytes =
        fs::read(raw_path).map_err(ChurnError::io(format!("reading {}", raw_path.display())))?;
    let output = run(&bytes, config)?;
    publish(&output, &ArtifactLayout::new(&config.paths.artifact_root))
}
