//! AutoML Orchestrator
//!
//! Runs several AutoML search engines against one tabular regression dataset, each within
//! its own wall-clock budget, and keeps the best model as champion.
//!
//! # Modules
//!
//! ## Orchestration
//! - [`engines`] - Engine adapter contract, capability probe, engine registry
//! - [`coordinator`] - Run state machine, execution strategies, champion selection
//! - [`validation`] - Search-space validation before any engine starts
//!
//! ## Search
//! - [`optimizer`] - TPE, genetic and successive-halving search backends
//! - [`catalog`] - Model families, preprocessing steps, metrics and their hyperparameters
//! - [`pipeline`] - Two-stage preprocessing + model pipelines
//! - [`models`] - Native regression estimators
//! - [`preprocessing`] - Scalers, PCA, quantile transform, outlier filters
//! - [`evaluation`] - Metrics and cross-validation
//!
//! ## Services
//! - [`data`] - CSV / Parquet loading
//! - [`config`] - Run configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Search
pub mod catalog;
pub mod models;
pub mod preprocessing;
pub mod pipeline;
pub mod evaluation;
pub mod optimizer;

// Orchestration
pub mod validation;
pub mod engines;
pub mod coordinator;

// Services
pub mod data;
pub mod cli;

pub use error::{AutoMlError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{AutoMlError, Result};

    pub use crate::catalog::{Metric, ModelFamily, PreprocessorKind};
    pub use crate::config::{RunConfig, Strategy};

    pub use crate::engines::{
        load_model, Capabilities, Engine, EngineDescriptor, EngineKind, EngineRegistry, EngineSettings, FitOptions,
        FitStatus, RunInfo,
    };
    pub use crate::coordinator::{
        select_champion, ChampionSelection, ComparisonRow, Coordinator, EngineResult, EngineStatus, RunReport, RunState,
    };

    pub use crate::pipeline::{Pipeline, PipelineSpec};
    pub use crate::validation::validate;
}
