//! Churn Pipeline Core
//!
//! Deterministic building blocks shared by the offline build and the
//! serving layer.
//!
//! Modules:
//! - `table`: raw and canonical customer tables
//! - `cleaner`: raw → canonical normalization with integrity checks
//! - `schema`: categorical encoding and the feature schema contract
//! - `projector`: inference-time projection onto the schema
//! - `scenario`: simulator profiles expressed as named features
//! - `model`: logistic classifier and the `Classifier` seam
//! - `serialization`: canonical JSON and hashing helpers
//! - `config`: pipeline configuration
//! - `errors`: error taxonomy

pub mod cleaner;
pub mod config;
pub mod errors;
pub mod model;
pub mod projector;
pub mod scenario;
pub mod schema;
pub mod serialization;
pub mod table;

pub use cleaner::{clean, clean_unlabeled};
pub use config::{
    ClassWeight, CleanerConfig, PathsConfig, PipelineConfig, ScoringConfig, SplitConfig,
    TrainingConfig,
};
pub use errors::{ChurnError, Result};
pub use model::{sigmoid, Classifier, LinearTerms, LogisticModel, ModelFamily, ModelMetadata};
pub use projector::{project, Projection, Scenario};
pub use scenario::{ContractType, CustomerProfile, InternetService};
pub use schema::{encode, positive_rate, CategoricalEncoding, EncodedDataset, FeatureSchema};
pub use table::{CanonicalColumn, CanonicalTable, ColumnData, RawTable};

/// Crate version string recorded in model metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
