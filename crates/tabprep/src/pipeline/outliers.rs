//! IQR-based outlier removal.
//!
//! Bounds for every selected column are computed on the input before any
//! row is removed, so the result does not depend on column order.

use crate::config::OutlierConfig;
use crate::dataset::{ColumnSelector, Dataset};
use crate::error::{PrepError, Result};
use crate::utils::quartiles;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fences computed for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBounds {
    pub column: String,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
    /// Rows whose value in this column lies outside the fences.
    pub flagged: usize,
}

impl ColumnBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// What the outlier filter did.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutlierReport {
    pub multiplier: f64,
    pub columns: Vec<ColumnBounds>,
    /// Rows removed because at least one column flagged them.
    pub rows_removed: usize,
}

impl OutlierReport {
    pub fn bounds_for(&self, column: &str) -> Option<&ColumnBounds> {
        self.columns.iter().find(|b| b.column == column)
    }
}

/// Removes rows with a value outside `[Q1 - k*IQR, Q3 + k*IQR]` in any
/// selected column.
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    columns: ColumnSelector,
    multiplier: f64,
}

impl OutlierFilter {
    /// Create a filter. `k` must be finite and non-negative.
    pub fn new(columns: ColumnSelector, multiplier: f64) -> Result<Self> {
        let config = OutlierConfig {
            columns,
            multiplier,
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &OutlierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            columns: config.columns.clone(),
            multiplier: config.multiplier,
        })
    }

    /// Compute the fences for one column's non-missing values.
    ///
    /// Returns `None` when the column has no values.
    pub fn bounds(&self, column: &str, values: &[f64]) -> Option<ColumnBounds> {
        let (q1, _, q3) = quartiles(values)?;
        let iqr = q3 - q1;
        Some(ColumnBounds {
            column: column.to_string(),
            q1,
            q3,
            iqr,
            lower: q1 - self.multiplier * iqr,
            upper: q3 + self.multiplier * iqr,
            flagged: 0,
        })
    }

    /// Filter the dataset. Missing cells never flag a row; row order is
    /// preserved.
    pub fn apply(&self, dataset: &Dataset) -> Result<(Dataset, OutlierReport)> {
        let columns = self.columns.resolve_numeric(dataset, |name, ty| PrepError::Strategy {
            column: name.to_string(),
            strategy: "iqr outlier removal".to_string(),
            column_type: ty.name().to_string(),
        })?;

        let mut keep = vec![true; dataset.height()];
        let mut report = OutlierReport {
            multiplier: self.multiplier,
            ..OutlierReport::default()
        };

        for name in &columns {
            let values = dataset.numeric_values(name)?;
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            let Some(mut bounds) = self.bounds(name, &present) else {
                debug!("Column '{}' has no values, skipping outlier check", name);
                continue;
            };

            for (row, value) in values.iter().enumerate() {
                if let Some(v) = value
                    && !bounds.contains(*v)
                {
                    bounds.flagged += 1;
                    keep[row] = false;
                }
            }

            debug!(
                "Outlier bounds for '{}': [{:.4}, {:.4}], {} row(s) flagged",
                name, bounds.lower, bounds.upper, bounds.flagged
            );
            report.columns.push(bounds);
        }

        let out = dataset.filter_rows(&keep)?;
        report.rows_removed = dataset.height() - out.height();
        Ok((out, report))
    }
}
