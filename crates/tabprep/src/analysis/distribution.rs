//! Binned counts, frequency tables and box-plot summaries for renderers.

use super::present_numeric;
use crate::dataset::Dataset;
use crate::error::{PrepError, Result};
use crate::utils::{quantile_sorted, sorted};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Equal-width histogram of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub column: String,
    /// `counts.len() + 1` ascending bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Frequency table of one column, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCounts {
    pub column: String,
    pub values: Vec<ValueCount>,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxPlotSummary {
    pub column: String,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    /// Smallest value at or above `q1 - 1.5 * iqr`
    pub lower_whisker: f64,
    /// Largest value at or below `q3 + 1.5 * iqr`
    pub upper_whisker: f64,
    /// Values beyond the whiskers, ascending
    pub outliers: Vec<f64>,
}

/// Count values into `bins` equal-width bins over `[min, max]`.
///
/// Bins are half-open except the last, which also holds `max`. A constant
/// column is binned over `[v - 0.5, v + 0.5]`.
pub fn histogram(dataset: &Dataset, column: &str, bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(PrepError::Configuration(
            "histogram needs at least one bin".to_string(),
        ));
    }
    let values = present_numeric(dataset, column, "histogram")?;
    if values.is_empty() {
        return Err(PrepError::insufficient(
            format!("histogram of column '{}'", column),
            1,
            0,
        ));
    }

    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &values {
        let index = (((v - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    let mut edges: Vec<f64> = (0..bins).map(|i| min + i as f64 * width).collect();
    edges.push(max);

    Ok(Histogram {
        column: column.to_string(),
        edges,
        counts,
        missing: dataset.height() - values.len(),
    })
}

/// Frequency of each distinct non-missing value. Ties keep the order in
/// which the values first appear.
pub fn value_counts(dataset: &Dataset, column: &str) -> Result<ValueCounts> {
    let series = dataset.column(column)?;
    let missing = series.null_count();
    let present = series.drop_nulls();
    if present.is_empty() {
        return Ok(ValueCounts {
            column: column.to_string(),
            values: Vec::new(),
            missing,
        });
    }

    // stable grouping keeps first-appearance order
    let frame = DataFrame::new(vec![present.into_column()])?;
    let groups = frame.group_by_stable([column])?;
    let counts = groups.get_groups().group_count();
    let keys = Dataset::new(DataFrame::new(groups.keys())?)?.cells(column)?;

    let mut values: Vec<ValueCount> = keys
        .iter()
        .zip(counts.into_iter())
        .map(|(key, count)| ValueCount {
            value: key.to_string(),
            count: count.unwrap_or(0) as usize,
        })
        .collect();

    // stable
    values.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(ValueCounts {
        column: column.to_string(),
        values,
        missing,
    })
}

/// Quartiles, Tukey whiskers and outlying points of a numeric column.
pub fn box_plot(dataset: &Dataset, column: &str) -> Result<BoxPlotSummary> {
    let s = sorted(&present_numeric(dataset, column, "box plot")?);
    let (Some(q1), Some(median), Some(q3)) = (
        quantile_sorted(&s, 0.25),
        quantile_sorted(&s, 0.5),
        quantile_sorted(&s, 0.75),
    ) else {
        return Err(PrepError::insufficient(
            format!("box plot of column '{}'", column),
            1,
            0,
        ));
    };

    let iqr = q3 - q1;
    let low_fence = q1 - 1.5 * iqr;
    let high_fence = q3 + 1.5 * iqr;
    let (inside, outliers): (Vec<f64>, Vec<f64>) = s
        .iter()
        .partition(|v| **v >= low_fence && **v <= high_fence);

    Ok(BoxPlotSummary {
        column: column.to_string(),
        q1,
        median,
        q3,
        iqr,
        lower_whisker: inside.first().copied().unwrap_or(q1),
        upper_whisker: inside.last().copied().unwrap_or(q3),
        outliers,
    })
}
