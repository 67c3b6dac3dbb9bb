//! Error taxonomy for the bundle engine

use polars::prelude::PolarsError;

/// Errors surfaced by the bundle engine
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// A required column is absent from the input table
    #[error("input schema error: missing required column '{column}'")]
    InputSchema { column: String },

    /// Training data cannot support a classifier fit
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// The outcome column holds values that do not form a binary label
    #[error("invalid outcome labels: {reason}")]
    InvalidLabels { reason: String },

    /// The model artifact is missing, unreadable or inconsistent
    #[error("model load error: {reason}")]
    ModelLoad { reason: String },

    #[error("model training failed: {0}")]
    Training(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("plotting failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl BundleError {
    pub(crate) fn missing_column(column: &str) -> Self {
        BundleError::InputSchema {
            column: column.to_string(),
        }
    }

    pub(crate) fn model_load(reason: impl Into<String>) -> Self {
        BundleError::ModelLoad {
            reason: reason.into(),
        }
    }
}
