//! Churn Service Layer
//!
//! Serving side of the churn pipeline:
//! - verified loading of the live artifact generation
//! - single-profile and batch risk scoring
//! - dataset summary and feature importance for presentation
//! - in-process rebuild when artifacts are missing

pub mod context;
pub mod service;
pub mod store;
pub mod summary;

pub use context::{RiskAssessment, RiskLevel, ScoringContext};
pub use service::ChurnService;
pub use store::ArtifactStore;
pub use summary::DatasetSummary;

/// Service version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
