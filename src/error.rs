//! Error types for rust_rfpipe

use thiserror::Error;

/// Main error type for the QC / feature selection / classification pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Insufficient groups for {stage}: found {found}, at least {required} required")]
    InsufficientGroups {
        stage: String,
        found: usize,
        required: usize,
    },

    #[error(
        "Insufficient samples for class '{class}': found {found}, at least {required} required"
    )]
    InsufficientSamples {
        class: String,
        found: usize,
        required: usize,
    },

    #[error(
        "Degenerate class weight: class '{class}' makes up every training sample, its weight is 0"
    )]
    DegenerateWeight { class: String },

    #[error("Schema mismatch at feature '{feature}': {reason}")]
    SchemaMismatch { feature: String, reason: String },

    #[error("Numeric degeneracy in feature '{feature}': {reason}")]
    NumericDegeneracy { feature: String, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid expression matrix: {reason}")]
    InvalidExpressionMatrix { reason: String },

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
