//! Progress reporting for the cleaning pipeline.
//!
//! A reporter receives a [`StageUpdate`] whenever a stage starts, finishes,
//! is skipped or fails.
//!
//! # Example
//!
//! ```rust
//! use tabprep::{CleaningConfig, CleaningPipeline, Dataset};
//! use polars::prelude::*;
//!
//! let dataset = Dataset::new(df!["x" => [1.0, 2.0]].unwrap()).unwrap();
//! let outcome = CleaningPipeline::builder()
//!     .config(CleaningConfig::default())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()
//!     .unwrap()
//!     .run(dataset)
//!     .unwrap();
//! assert_eq!(outcome.dataset.height(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of the cleaning pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    /// Converting columns to their declared types
    Coercion,
    /// Filling or dropping missing values
    MissingValues,
    /// Removing IQR outliers
    Outliers,
    /// Rescaling numeric columns
    Normalization,
    /// Normalizing text columns
    Text,
    /// Removing duplicate rows
    Dedup,
}

impl CleaningStage {
    /// All stages in the order the pipeline runs them.
    pub const ORDER: [CleaningStage; 6] = [
        Self::Coercion,
        Self::MissingValues,
        Self::Outliers,
        Self::Normalization,
        Self::Text,
        Self::Dedup,
    ];

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Coercion => "Coercing Types",
            Self::MissingValues => "Resolving Missing Values",
            Self::Outliers => "Removing Outliers",
            Self::Normalization => "Normalizing Columns",
            Self::Text => "Cleaning Text",
            Self::Dedup => "Removing Duplicates",
        }
    }

    /// Zero-based position in [`CleaningStage::ORDER`].
    pub fn index(&self) -> usize {
        match self {
            Self::Coercion => 0,
            Self::MissingValues => 1,
            Self::Outliers => 2,
            Self::Normalization => 3,
            Self::Text => 4,
            Self::Dedup => 5,
        }
    }

    /// Overall progress when this stage starts (0.0 - 1.0).
    pub fn base_progress(&self) -> f32 {
        self.index() as f32 / Self::ORDER.len() as f32
    }
}

impl fmt::Display for CleaningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// What happened to a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Started,
    Completed,
    /// The stage had no configuration section
    Skipped,
    Failed,
}

/// Progress update sent to a [`ProgressReporter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageUpdate {
    pub stage: CleaningStage,
    pub status: StageStatus,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Dataset height after the stage, for completed stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

static_assertions::assert_impl_all!(StageUpdate: Send, Sync);

impl StageUpdate {
    pub fn started(stage: CleaningStage) -> Self {
        Self {
            stage,
            status: StageStatus::Started,
            progress: stage.base_progress(),
            message: format!("{}...", stage.display_name()),
            rows: None,
        }
    }

    pub fn completed(stage: CleaningStage, rows: usize) -> Self {
        Self {
            stage,
            status: StageStatus::Completed,
            progress: Self::end_progress(stage),
            message: format!("{}: done ({} rows)", stage.display_name(), rows),
            rows: Some(rows),
        }
    }

    pub fn skipped(stage: CleaningStage) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            progress: Self::end_progress(stage),
            message: format!("{}: skipped", stage.display_name()),
            rows: None,
        }
    }

    pub fn failed(stage: CleaningStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            progress: stage.base_progress(),
            message: message.into(),
            rows: None,
        }
    }

    fn end_progress(stage: CleaningStage) -> f32 {
        ((stage.index() + 1) as f32 / CleaningStage::ORDER.len() as f32).clamp(0.0, 1.0)
    }
}

/// Trait for receiving progress updates during cleaning.
///
/// Implementations must be `Send + Sync` so a pipeline can run on a
/// background thread while reporting to another.
pub trait ProgressReporter: Send + Sync {
    /// Called once per stage transition. Implementations should be cheap
    /// and non-blocking.
    fn report(&self, update: StageUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(StageUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(StageUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(StageUpdate) + Send + Sync,
{
    fn report(&self, update: StageUpdate) {
        (self.callback)(update);
    }
}
