//! Cleaning pipeline orchestration.
//!
//! This module contains the pipeline that runs the cleaning stages in
//! order, the numeric stages it owns (outlier removal and normalization),
//! and progress reporting.

mod builder;
mod outliers;
pub mod progress;
mod scaling;

pub use builder::{CleaningPipeline, CleaningPipelineBuilder};
pub use outliers::{ColumnBounds, OutlierFilter, OutlierReport};
pub use progress::{
    CleaningStage, ClosureProgressReporter, ProgressReporter, StageStatus, StageUpdate,
};
pub use scaling::{ColumnScaling, FittedScaler, Normalizer, ScaleParams};
