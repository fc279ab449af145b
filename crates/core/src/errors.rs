//! Error types for the churn pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by any stage of the churn pipeline.
///
/// `DataIntegrity` is fatal for a build, `SchemaMismatch` and
/// `MissingArtifact` are meant to be handled at the serving boundary.
#[derive(Error, Debug)]
pub enum ChurnError {
    /// Unexpected label values, residual missing values, missing source columns
    #[error("data integrity violation in {stage}: {detail}")]
    DataIntegrity { stage: &'static str, detail: String },

    /// A row cannot be projected onto the trained feature space
    #[error("schema mismatch: {0} (rebuild the pipeline first)")]
    SchemaMismatch(String),

    /// A published artifact required for inference is absent
    #[error("missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Attribution was requested for a model that is not linear
    #[error("linear explainer cannot attribute a {family} model")]
    ModelFamily { family: String },

    /// Optimizer or training-set failure
    #[error("training failed: {0}")]
    Training(String),

    /// Metric computation failure
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Invalid pipeline configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error with the path or operation that failed
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed delimited file
    #[error("CSV error ({context}): {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary model blob encoding error
    #[error("model encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Configuration file parse error
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ChurnError {
    pub fn data_integrity(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::DataIntegrity {
            stage,
            detail: detail.into(),
        }
    }

    /// Adapter for `map_err` on I/O results.
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    /// Adapter for `map_err` on CSV results.
    pub fn csv(context: impl Into<String>) -> impl FnOnce(csv::Error) -> Self {
        let context = context.into();
        move |source| Self::Csv { context, source }
    }

    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, Self::MissingArtifact { .. })
    }
}

/// Result type for churn pipeline operations
pub type Result<T> = std::result::Result<T, ChurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_integrity_message_names_stage() {
        let err = ChurnError::data_integrity("clean", "unexpected label 'Maybe' at row 3");
        assert_eq!(
            err.to_string(),
            "data integrity violation in clean: unexpected label 'Maybe' at row 3"
        );
    }

    #[test]
    fn io_adapter_keeps_context() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ChurnError::io("reading model.bin")(source);
        assert!(err.to_string().contains("reading model.bin"));
        assert!(!err.is_missing_artifact());
    }
}
