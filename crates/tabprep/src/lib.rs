//! Tabular Data Cleaning and Analysis Library
//!
//! Deterministic data preparation and statistics built on Polars.
//!
//! # Overview
//!
//! - **Dataset**: an immutable table of named columns, each with a declared
//!   semantic type (numeric, text, timestamp, boolean, categorical)
//! - **Cleaning Pipeline**: type coercion, missing values, IQR outliers,
//!   normalization, text cleanup and deduplication, each optional and run
//!   in a fixed order
//! - **Analysis**: descriptive statistics, correlation matrices, t-tests and
//!   ANOVA, OLS regression, k-means clustering, and the binned data plots
//!   are drawn from
//!
//! The library does no I/O. Callers build a [`Dataset`] from a polars
//! `DataFrame` and export the result with [`Dataset::into_frame`].
//!
//! # Quick Start
//!
//! ```rust
//! use tabprep::{CleaningConfig, CleaningPipeline, ColumnSelector, Dataset, MissingStrategy};
//! use tabprep::config::NormalizationMethod;
//! use polars::prelude::*;
//!
//! let raw = Dataset::new(df![
//!     "age" => [Some(23.0), None, Some(41.0), Some(35.0)],
//!     "city" => ["  Berlin", "paris ", "Berlin", "ROME"],
//! ].unwrap()).unwrap();
//!
//! let config = CleaningConfig::builder()
//!     .missing_strategy(MissingStrategy::Median)
//!     .normalize(NormalizationMethod::MinMax, ColumnSelector::column("age"))
//!     .normalize_text(ColumnSelector::All)
//!     .build()
//!     .unwrap();
//!
//! let outcome = CleaningPipeline::builder()
//!     .config(config)
//!     .build()
//!     .unwrap()
//!     .run(raw)
//!     .unwrap();
//!
//! assert_eq!(outcome.dataset.missing_count("age").unwrap(), 0);
//! for step in outcome.steps() {
//!     println!("{}", step);
//! }
//! ```
//!
//! # Errors
//!
//! Every fallible operation returns [`PrepError`]. A failed pipeline stage
//! is reported as a [`PipelineFailure`] that also carries the dataset
//! produced by the last stage that succeeded.

pub mod analysis;
pub mod cleaner;
pub mod config;
pub mod dataset;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use analysis::{
    CorrelationMethod, KMeansConfig, RegressionOptions, TTestKind, anova, box_plot,
    correlation_matrix, describe, histogram, kmeans, linear_regression, t_test, value_counts,
};
pub use cleaner::{CoercionReport, Deduplicator, TextNormalizer, TypeCoercer};
pub use config::{
    CharacterRemoval, CleaningConfig, CleaningConfigBuilder, CoercionConfig, CoercionFailurePolicy,
    ColumnTarget, ConfigValidationError, DedupConfig, FillValue, KeepPolicy, MissingConfig,
    MissingStrategy, NormalizationConfig, NormalizationMethod, OutlierConfig, TargetType,
    TextCleaningConfig, TimestampFormat,
};
pub use dataset::{CellValue, ColumnSelector, Dataset, SemanticType};
pub use error::{ErrorKind, PrepError, Result, ResultExt};
pub use imputers::MissingValueResolver;
pub use pipeline::{
    CleaningPipeline, CleaningPipelineBuilder, CleaningStage, ClosureProgressReporter,
    FittedScaler, Normalizer, OutlierFilter, ProgressReporter, StageStatus, StageUpdate,
};
pub use types::{CleaningOutcome, PipelineFailure, StageSummary};
