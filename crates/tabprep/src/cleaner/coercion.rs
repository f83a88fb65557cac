//! Explicit, per-column type coercion.

use super::converters::convert_cells;
use crate::config::{CoercionConfig, CoercionFailurePolicy, TargetType};
use crate::dataset::Dataset;
use crate::error::{PrepError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of coercing one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCoercion {
    pub column: String,
    pub target: TargetType,
    /// Rows whose cells could not be parsed.
    pub failed_rows: Vec<usize>,
    /// Non-missing cells after conversion.
    pub converted: usize,
}

/// Per-column record of a coercion stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoercionReport {
    pub columns: Vec<ColumnCoercion>,
}

impl CoercionReport {
    /// Total number of failed cells across all columns.
    pub fn total_failures(&self) -> usize {
        self.columns.iter().map(|c| c.failed_rows.len()).sum()
    }

    /// Failed rows for one column, if it was coerced.
    pub fn failures_for(&self, column: &str) -> Option<&[usize]> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.failed_rows.as_slice())
    }
}

/// Converts columns to their declared target types.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    config: CoercionConfig,
}

impl TypeCoercer {
    pub fn new(config: CoercionConfig) -> Self {
        Self { config }
    }

    /// Convert every configured column.
    ///
    /// With [`CoercionFailurePolicy::SetMissing`] unparsable cells become
    /// missing and are listed in the report. With
    /// [`CoercionFailurePolicy::Abort`] the first column with failures
    /// fails the stage.
    pub fn apply(&self, dataset: &Dataset) -> Result<(Dataset, CoercionReport)> {
        self.config.validate()?;

        let mut out = dataset.clone();
        let mut report = CoercionReport::default();

        for target in &self.config.targets {
            let column = target.column.as_str();
            let cells = out.cells(column)?;
            let conversion = convert_cells(
                column,
                &cells,
                target.target,
                &self.config.timestamp_format,
            )
            .context(format!("Coercing column '{}'", column))?;

            if !conversion.failed_rows.is_empty() {
                match self.config.on_failure {
                    CoercionFailurePolicy::Abort => {
                        return Err(PrepError::Coercion {
                            column: column.to_string(),
                            target: target.target.name().to_string(),
                            rows: conversion.failed_rows,
                            sample: conversion.sample.unwrap_or_default(),
                        });
                    }
                    CoercionFailurePolicy::SetMissing => {
                        warn!(
                            "{} cell(s) in '{}' could not be converted to {} and were set to missing",
                            conversion.failed_rows.len(),
                            column,
                            target.target.name()
                        );
                    }
                }
            }

            let converted = conversion.series.len() - conversion.series.null_count();
            debug!(
                "Coerced '{}' to {} ({} values)",
                column,
                target.target.name(),
                converted
            );

            out = out.with_column(conversion.series, target.target.semantic())?;
            report.columns.push(ColumnCoercion {
                column: column.to_string(),
                target: target.target,
                failed_rows: conversion.failed_rows,
                converted,
            });
        }

        info!(
            "Coerced {} column(s), {} failed cell(s)",
            report.columns.len(),
            report.total_failures()
        );
        Ok((out, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnTarget, TimestampFormat};
    use crate::dataset::SemanticType;
    use crate::error::ErrorKind;
    use polars::prelude::*;

    fn raw() -> Dataset {
        Dataset::new(
            df![
                "price" => ["10", "n/a", "abc", "$1,200"],
                "active" => ["yes", "no", "Y", ""],
                "joined" => ["2024-01-05", "01/06/2024", "2024/01/07 10:00:00", "soon"],
            ]
            .unwrap(),
        )
        .unwrap()
    }

    fn config(targets: &[(&str, TargetType)]) -> CoercionConfig {
        CoercionConfig::new(
            targets
                .iter()
                .map(|(c, t)| ColumnTarget {
                    column: c.to_string(),
                    target: *t,
                })
                .collect(),
        )
    }

    #[test]
    fn test_set_missing_records_failures() {
        let coercer = TypeCoercer::new(config(&[
            ("price", TargetType::Float),
            ("active", TargetType::Boolean),
            ("joined", TargetType::Timestamp),
        ]));
        let (out, report) = coercer.apply(&raw()).unwrap();

        assert_eq!(out.semantic_type("price").unwrap(), SemanticType::Numeric);
        assert_eq!(out.semantic_type("active").unwrap(), SemanticType::Boolean);
        assert_eq!(out.semantic_type("joined").unwrap(), SemanticType::Timestamp);

        assert_eq!(
            out.numeric_values("price").unwrap(),
            vec![Some(10.0), None, None, Some(1200.0)]
        );
        assert_eq!(report.failures_for("price"), Some(&[2usize][..]));
        assert_eq!(report.failures_for("active"), Some(&[][..]));
        assert_eq!(report.failures_for("joined"), Some(&[3usize][..]));
        assert_eq!(report.total_failures(), 2);
    }

    #[test]
    fn test_abort_fails_with_rows() {
        let mut cfg = config(&[("price", TargetType::Float)]);
        cfg.on_failure = CoercionFailurePolicy::Abort;
        let err = TypeCoercer::new(cfg).apply(&raw()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Coercion);
        match err {
            PrepError::Coercion { column, rows, sample, .. } => {
                assert_eq!(column, "price");
                assert_eq!(rows, vec![2]);
                assert_eq!(sample, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_input_is_untouched() {
        let ds = raw();
        let _ = TypeCoercer::new(config(&[("price", TargetType::Float)]))
            .apply(&ds)
            .unwrap();
        assert_eq!(ds.semantic_type("price").unwrap(), SemanticType::Text);
    }

    #[test]
    fn test_unknown_column() {
        let err = TypeCoercer::new(config(&[("salary", TargetType::Float)]))
            .apply(&raw())
            .unwrap_err();
        assert!(matches!(err, PrepError::ColumnNotFound(_)));
    }

    #[test]
    fn test_numeric_to_categorical() {
        let ds = Dataset::new(df!["zip" => [1010i64, 2020]].unwrap()).unwrap();
        let (out, _) = TypeCoercer::new(config(&[("zip", TargetType::Categorical)]))
            .apply(&ds)
            .unwrap();
        assert_eq!(out.semantic_type("zip").unwrap(), SemanticType::Categorical);
        assert_eq!(
            out.text_values("zip").unwrap(),
            vec![Some("1010".to_string()), Some("2020".to_string())]
        );
    }

    #[test]
    fn test_explicit_timestamp_format() {
        let ds = Dataset::new(df!["d" => ["05/01/2024", "2024-01-05"]].unwrap()).unwrap();
        let mut cfg = config(&[("d", TargetType::Timestamp)]);
        cfg.timestamp_format = TimestampFormat::Explicit("%d/%m/%Y".to_string());
        let (_, report) = TypeCoercer::new(cfg).apply(&ds).unwrap();
        assert_eq!(report.failures_for("d"), Some(&[1usize][..]));
    }
}
