//! Churn Trainer - Deterministic offline build of the churn pipeline
//!
//! Turns a raw customer CSV into a published, content-addressed generation
//! of artifacts: canonical table, encoded split, fitted classifier, held-out
//! metrics and global feature importance.

pub mod artifacts;
pub mod dataset;
pub mod evaluator;
pub mod explainer;
pub mod linalg;
pub mod pipeline;
pub mod split;
pub mod trainer;

pub use artifacts::{ArtifactLayout, BuildManifest};
pub use dataset::{read_raw_csv, DatasetProfile};
pub use evaluator::{evaluate, roc_auc, ClassMetrics, ConfusionMatrix, EvaluationReport};
pub use explainer::{explain, FeatureImportance, GlobalImportance};
pub use pipeline::{build_pipeline, publish, run, BuildOutput, PublishedBuild};
pub use split::{stratified_split, Partition, Subset};
pub use trainer::LogisticTrainer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
