use crate::cleaner::CoercionReport;
use crate::dataset::Dataset;
use crate::error::PrepError;
use crate::pipeline::{CleaningStage, FittedScaler, OutlierReport};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What one pipeline stage did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: CleaningStage,
    /// The stage had no configuration section and did nothing.
    pub skipped: bool,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    /// Human-readable description of each action taken.
    pub steps: Vec<String>,
}

impl StageSummary {
    pub fn skipped(stage: CleaningStage, dataset: &Dataset) -> Self {
        Self {
            stage,
            skipped: true,
            rows_before: dataset.height(),
            rows_after: dataset.height(),
            columns_before: dataset.width(),
            columns_after: dataset.width(),
            steps: Vec::new(),
        }
    }

    pub fn completed(stage: CleaningStage, before: &Dataset, after: &Dataset, steps: Vec<String>) -> Self {
        Self {
            stage,
            skipped: false,
            rows_before: before.height(),
            rows_after: after.height(),
            columns_before: before.width(),
            columns_after: after.width(),
            steps,
        }
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    /// The cleaned dataset.
    pub dataset: Dataset,
    /// One summary per stage, in execution order, skipped stages included.
    pub stages: Vec<StageSummary>,
    pub coercion: Option<CoercionReport>,
    pub outliers: Option<OutlierReport>,
    /// Parameters of the normalization stage, reusable on new data.
    pub scaler: Option<FittedScaler>,
    pub duration: Duration,
}

impl CleaningOutcome {
    pub fn stage(&self, stage: CleaningStage) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// All step descriptions across stages, in order.
    pub fn steps(&self) -> Vec<String> {
        self.stages.iter().flat_map(|s| s.steps.iter().cloned()).collect()
    }
}

/// A stage failed. Carries the dataset produced by the last successful
/// stage (or the input) so the caller can fix the configuration and retry
/// from there.
#[derive(Debug, thiserror::Error)]
#[error("Cleaning stage '{stage}' failed: {error}")]
pub struct PipelineFailure {
    pub stage: CleaningStage,
    #[source]
    pub error: PrepError,
    pub last_good: Dataset,
    /// Summaries of the stages that ran before the failure.
    pub completed: Vec<StageSummary>,
}
