//! Error types for the orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, AutoMlError>;

/// Main error type
///
/// Configuration and misuse errors (`Configuration`, `NotFitted`) propagate to the caller.
/// `MissingDependency` never leaves an adapter: it selects the baseline fallback.
/// `EngineFailure` is contained by the coordinator and recorded on the engine's result.
#[derive(Error, Debug)]
pub enum AutoMlError {
    #[error("Configuration error: unknown {kind} {names:?}")]
    UnknownNames { kind: &'static str, names: Vec<String> },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing dependency: backend for engine '{engine}' is not available")]
    MissingDependency { engine: String },

    #[error("Engine '{engine}' failed: {reason}")]
    EngineFailure { engine: String, reason: String },

    #[error("Model not fitted. Call fit() first")]
    NotFitted,

    #[error("No viable engine: {attempted} attempted, none produced a usable model")]
    NoViableEngine { attempted: usize },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Target file must contain a single column, found {0}")]
    MultiColumnTarget(usize),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AutoMlError {
    /// Whether this error must abort the whole run rather than a single engine
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AutoMlError::UnknownNames { .. }
                | AutoMlError::Configuration(_)
                | AutoMlError::NotFitted
                | AutoMlError::NoViableEngine { .. }
                | AutoMlError::InvalidTransition { .. }
        )
    }
}

impl From<polars::error::PolarsError> for AutoMlError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutoMlError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AutoMlError {
    fn from(err: serde_json::Error) -> Self {
        AutoMlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutoMlError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutoMlError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
