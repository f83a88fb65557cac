//! Main cleaning pipeline module.
//!
//! This module provides the `CleaningPipeline` struct and builder that run
//! the configured stages in their fixed order.

use crate::cleaner::{CoercionReport, Deduplicator, TextNormalizer, TypeCoercer};
use crate::config::CleaningConfig;
use crate::dataset::Dataset;
use crate::error::{PrepError, Result};
use crate::imputers::MissingValueResolver;
use crate::pipeline::outliers::{OutlierFilter, OutlierReport};
use crate::pipeline::progress::{
    CleaningStage, ClosureProgressReporter, ProgressReporter, StageUpdate,
};
use crate::pipeline::scaling::{FittedScaler, Normalizer};
use crate::types::{CleaningOutcome, PipelineFailure, StageSummary};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Output of one executed stage.
struct StageOutput {
    dataset: Dataset,
    steps: Vec<String>,
    coercion: Option<CoercionReport>,
    outliers: Option<OutlierReport>,
    scaler: Option<FittedScaler>,
}

impl StageOutput {
    fn new(dataset: Dataset, steps: Vec<String>) -> Self {
        Self {
            dataset,
            steps,
            coercion: None,
            outliers: None,
            scaler: None,
        }
    }
}

/// The cleaning pipeline.
///
/// Stages run in a fixed order: coercion, missing values, outliers,
/// normalization, text, dedup. A stage without a configuration section is
/// skipped. The first failing stage stops the run.
///
/// # Example
///
/// ```rust
/// use tabprep::{CleaningConfig, CleaningPipeline, ColumnSelector, Dataset, MissingStrategy};
/// use polars::prelude::*;
///
/// let raw = Dataset::new(df!["score" => [Some(10.0), None, Some(30.0)]].unwrap()).unwrap();
/// let config = CleaningConfig::builder()
///     .missing_strategy(MissingStrategy::Mean)
///     .deduplicate(ColumnSelector::All)
///     .build()
///     .unwrap();
///
/// let outcome = CleaningPipeline::builder()
///     .config(config)
///     .build()
///     .unwrap()
///     .run(raw)
///     .unwrap();
/// assert_eq!(outcome.dataset.missing_count("score").unwrap(), 0);
/// ```
pub struct CleaningPipeline {
    config: CleaningConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Ensure the pipeline can be moved to a worker thread
static_assertions::assert_impl_all!(CleaningPipeline: Send);

impl CleaningPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> CleaningPipelineBuilder {
        CleaningPipelineBuilder::default()
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Run every configured stage on `dataset`.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] naming the failed stage, the error, and
    /// the dataset produced by the last stage that succeeded.
    pub fn run(&self, dataset: Dataset) -> std::result::Result<CleaningOutcome, PipelineFailure> {
        let start_time = Instant::now();
        info!(
            "Starting cleaning pipeline on {} rows x {} columns",
            dataset.height(),
            dataset.width()
        );

        let mut current = dataset;
        let mut stages = Vec::with_capacity(CleaningStage::ORDER.len());
        let mut coercion = None;
        let mut outliers = None;
        let mut scaler = None;

        for stage in CleaningStage::ORDER {
            if !self.is_enabled(stage) {
                info!("Skipping {} (not configured)", stage.display_name());
                self.report_progress(StageUpdate::skipped(stage));
                stages.push(StageSummary::skipped(stage, &current));
                continue;
            }

            info!("{}...", stage.display_name());
            self.report_progress(StageUpdate::started(stage));

            match self.execute(stage, &current) {
                Ok(output) => {
                    self.report_progress(StageUpdate::completed(stage, output.dataset.height()));
                    stages.push(StageSummary::completed(
                        stage,
                        &current,
                        &output.dataset,
                        output.steps,
                    ));
                    coercion = output.coercion.or(coercion);
                    outliers = output.outliers.or(outliers);
                    scaler = output.scaler.or(scaler);
                    current = output.dataset;
                }
                Err(e) => {
                    error!("{} failed: {}", stage.display_name(), e);
                    self.report_progress(StageUpdate::failed(stage, e.to_string()));
                    return Err(PipelineFailure {
                        stage,
                        error: e,
                        last_good: current,
                        completed: stages,
                    });
                }
            }
        }

        let duration = start_time.elapsed();
        info!(
            "Cleaning pipeline finished in {:?}: {} rows x {} columns",
            duration,
            current.height(),
            current.width()
        );

        Ok(CleaningOutcome {
            dataset: current,
            stages,
            coercion,
            outliers,
            scaler,
            duration,
        })
    }

    fn is_enabled(&self, stage: CleaningStage) -> bool {
        match stage {
            CleaningStage::Coercion => self.config.coercion.is_some(),
            CleaningStage::MissingValues => self.config.missing.is_some(),
            CleaningStage::Outliers => self.config.outliers.is_some(),
            CleaningStage::Normalization => self.config.normalization.is_some(),
            CleaningStage::Text => self.config.text.is_some(),
            CleaningStage::Dedup => self.config.dedup.is_some(),
        }
    }

    fn execute(&self, stage: CleaningStage, dataset: &Dataset) -> Result<StageOutput> {
        let missing_section = || PrepError::Internal(format!("{} has no configuration", stage));

        match stage {
            CleaningStage::Coercion => {
                let config = self.config.coercion.as_ref().ok_or_else(missing_section)?;
                let (out, report) = TypeCoercer::new(config.clone()).apply(dataset)?;
                let steps = report
                    .columns
                    .iter()
                    .map(|c| {
                        format!(
                            "Coerced '{}' to {} ({} failed cell(s))",
                            c.column,
                            c.target.name(),
                            c.failed_rows.len()
                        )
                    })
                    .collect();
                let mut output = StageOutput::new(out, steps);
                output.coercion = Some(report);
                Ok(output)
            }
            CleaningStage::MissingValues => {
                let config = self.config.missing.as_ref().ok_or_else(missing_section)?;
                let missing_before = total_missing(dataset)?;
                let out = MissingValueResolver::from_config(config).resolve(dataset)?;
                let steps = vec![format!(
                    "Resolved missing values with {} ({} missing cell(s) before, {} after)",
                    config.strategy.name(),
                    missing_before,
                    total_missing(&out)?
                )];
                Ok(StageOutput::new(out, steps))
            }
            CleaningStage::Outliers => {
                let config = self.config.outliers.as_ref().ok_or_else(missing_section)?;
                let (out, report) = OutlierFilter::from_config(config)?.apply(dataset)?;
                let mut steps: Vec<String> = report
                    .columns
                    .iter()
                    .map(|b| {
                        format!(
                            "'{}' bounds [{:.4}, {:.4}] flagged {} row(s)",
                            b.column, b.lower, b.upper, b.flagged
                        )
                    })
                    .collect();
                steps.push(format!(
                    "Removed {} row(s) containing outliers",
                    report.rows_removed
                ));
                let mut output = StageOutput::new(out, steps);
                output.outliers = Some(report);
                Ok(output)
            }
            CleaningStage::Normalization => {
                let config = self.config.normalization.as_ref().ok_or_else(missing_section)?;
                let (out, fitted) = Normalizer::from_config(config).fit_transform(dataset)?;
                let steps = fitted
                    .columns
                    .iter()
                    .map(|c| format!("Applied {} to '{}'", config.method.name(), c.column))
                    .collect();
                let mut output = StageOutput::new(out, steps);
                output.scaler = Some(fitted);
                Ok(output)
            }
            CleaningStage::Text => {
                let config = self.config.text.as_ref().ok_or_else(missing_section)?;
                let out = TextNormalizer::new(config.clone()).apply(dataset)?;
                Ok(StageOutput::new(out, vec!["Normalized text columns".to_string()]))
            }
            CleaningStage::Dedup => {
                let config = self.config.dedup.as_ref().ok_or_else(missing_section)?;
                let out = Deduplicator::from_config(config).apply(dataset)?;
                let removed = dataset.height() - out.height();
                let steps = vec![format!("Removed {} duplicate row(s)", removed)];
                Ok(StageOutput::new(out, steps))
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: StageUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

fn total_missing(dataset: &Dataset) -> Result<usize> {
    dataset
        .column_names()
        .iter()
        .map(|name| dataset.missing_count(name))
        .sum()
}

/// Builder for creating a [`CleaningPipeline`] instance.
#[derive(Default)]
pub struct CleaningPipelineBuilder {
    config: Option<CleaningConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(CleaningPipelineBuilder: Send);

impl CleaningPipelineBuilder {
    /// Set the pipeline configuration. Without one every stage is skipped.
    pub fn config(mut self, config: CleaningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(StageUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<CleaningPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(CleaningPipeline {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MissingStrategy, NormalizationMethod, TargetType};
    use crate::dataset::{ColumnSelector, SemanticType};
    use crate::error::ErrorKind;
    use crate::pipeline::progress::StageStatus;
    use polars::prelude::*;
    use std::sync::Mutex;

    fn raw() -> Dataset {
        Dataset::new(
            df![
                "price" => ["10", "20", "n/a", "30", "20"],
                "city" => ["  Oslo", "ROME!", "Paris", "oslo ", "rome"],
            ]
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_config_skips_every_stage() {
        let outcome = CleaningPipeline::builder()
            .build()
            .unwrap()
            .run(raw())
            .unwrap();
        assert_eq!(outcome.stages.len(), 6);
        assert!(outcome.stages.iter().all(|s| s.skipped));
        assert_eq!(outcome.dataset.height(), 5);
        assert!(outcome.coercion.is_none());
    }

    #[test]
    fn test_full_run() {
        let config = CleaningConfig::builder()
            .coerce("price", TargetType::Float)
            .missing_strategy(MissingStrategy::Median)
            .normalize_text(ColumnSelector::All)
            .deduplicate(ColumnSelector::All)
            .build()
            .unwrap();

        let outcome = CleaningPipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run(raw())
            .unwrap();

        let ds = &outcome.dataset;
        assert_eq!(ds.semantic_type("price").unwrap(), SemanticType::Numeric);
        assert_eq!(ds.missing_count("price").unwrap(), 0);
        // ("20", "rome") appears twice after text cleaning
        assert_eq!(ds.height(), 4);
        assert_eq!(outcome.stage(CleaningStage::Dedup).unwrap().rows_removed(), 1);
        assert!(outcome.stage(CleaningStage::Outliers).unwrap().skipped);
        assert!(outcome.coercion.is_some());
        assert!(!outcome.steps().is_empty());
    }

    #[test]
    fn test_failure_returns_last_good_dataset() {
        // normalization of a text column fails after coercion succeeded
        let config = CleaningConfig::builder()
            .coerce("price", TargetType::Float)
            .normalize(NormalizationMethod::Standard, ColumnSelector::column("city"))
            .build()
            .unwrap();

        let failure = CleaningPipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run(raw())
            .unwrap_err();

        assert_eq!(failure.stage, CleaningStage::Normalization);
        assert_eq!(failure.error.kind(), ErrorKind::Strategy);
        assert_eq!(
            failure.last_good.semantic_type("price").unwrap(),
            SemanticType::Numeric
        );
        // coercion, missing (skipped), outliers (skipped)
        assert_eq!(failure.completed.len(), 3);
    }

    #[test]
    fn test_progress_updates_in_order() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();

        let config = CleaningConfig::builder()
            .deduplicate(ColumnSelector::All)
            .build()
            .unwrap();
        CleaningPipeline::builder()
            .config(config)
            .on_progress(move |u| sink.lock().unwrap().push((u.stage, u.status)))
            .build()
            .unwrap()
            .run(raw())
            .unwrap();

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 7);
        assert_eq!(updates[0], (CleaningStage::Coercion, StageStatus::Skipped));
        assert_eq!(updates[5], (CleaningStage::Dedup, StageStatus::Started));
        assert_eq!(updates[6], (CleaningStage::Dedup, StageStatus::Completed));
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        let mut config = CleaningConfig::default();
        config.outliers = Some(crate::config::OutlierConfig {
            columns: ColumnSelector::All,
            multiplier: -1.0,
        });
        let err = CleaningPipeline::builder().config(config).build().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
