//! Churn scoring service
//!
//! Owns the configuration and a cached `ScoringContext`. When the published
//! artifacts are absent the service runs the build in-process and retries the
//! load exactly once.

use churn_core::{
    clean, clean_unlabeled, CustomerProfile, PipelineConfig, RawTable, Result,
};
use churn_trainer::dataset::read_raw_csv;
use churn_trainer::{build_pipeline, EvaluationReport, GlobalImportance, PublishedBuild};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::{RiskAssessment, ScoringContext};
use crate::store::ArtifactStore;
use crate::summary::DatasetSummary;

pub struct ChurnService {
    config: PipelineConfig,
    store: ArtifactStore,
    context: RwLock<Option<Arc<ScoringContext>>>,
    rebuilds: AtomicUsize,
}

impl ChurnService {
    pub fn new(config: PipelineConfig) -> Self {
        let store = ArtifactStore::new(&config.paths.artifact_root);
        Self {
            config,
            store,
            context: RwLock::new(None),
            rebuilds: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Number of in-process builds this service has triggered.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Current scoring context, loading or rebuilding it when needed.
    pub fn context(&self) -> Result<Arc<ScoringContext>> {
        if let Some(context) = self.context.read().as_ref() {
            return Ok(Arc::clone(context));
        }

        let mut slot = self.context.write();
        if let Some(context) = slot.as_ref() {
            return Ok(Arc::clone(context));
        }
        let context = Arc::new(self.load_or_rebuild()?);
        *slot = Some(Arc::clone(&context));
        Ok(context)
    }

    fn load_or_rebuild(&self) -> Result<ScoringContext> {
        let threshold = self.config.scoring.decision_threshold;
        match self.store.load_context(threshold) {
            Err(e) if e.is_missing_artifact() && self.config.scoring.rebuild_on_missing => {
                warn!("{e}; rebuilding the pipeline");
                self.run_build()?;
                self.store.load_context(threshold)
            }
            other => other,
        }
    }

    fn run_build(&self) -> Result<PublishedBuild> {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        build_pipeline(&self.config)
    }

    /// Build unconditionally and switch to the new generation.
    pub fn rebuild(&self) -> Result<Arc<ScoringContext>> {
        let published = self.run_build()?;
        let context = Arc::new(
            self.store
                .load_context(self.config.scoring.decision_threshold)?,
        );
        info!(build_id = %published.build_id, "Scoring context replaced");
        *self.context.write() = Some(Arc::clone(&context));
        Ok(context)
    }

    pub fn score_profile(&self, profile: &CustomerProfile) -> Result<RiskAssessment> {
        self.context()?.score_profile(profile)
    }

    /// Score customers of a raw table; a label column is optional.
    pub fn score_batch(&self, raw: &RawTable) -> Result<Vec<RiskAssessment>> {
        let context = self.context()?;
        let table = clean_unlabeled(raw, &self.config.cleaning)?;
        let assessments = context.score_table(&table)?;
        info!(rows = assessments.len(), build_id = context.build_id(), "Scored batch");
        Ok(assessments)
    }

    /// Headline figures of the live canonical table.
    pub fn summary(&self) -> Result<DatasetSummary> {
        self.context()?;
        let raw = read_raw_csv(&self.store.clean_table_path()?)?;
        let table = clean(&raw, &self.config.cleaning)?;
        DatasetSummary::from_table(&table, &self.config.cleaning.target_column)
    }

    pub fn importance(&self) -> Result<GlobalImportance> {
        self.context()?;
        self.store.load_importance()
    }

    pub fn metrics(&self) -> Result<EvaluationReport> {
        self.context()?;
        self.store.load_metrics()
    }
}
