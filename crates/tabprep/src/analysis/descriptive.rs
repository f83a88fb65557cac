//! Per-column summary statistics.

use super::present_numeric;
use crate::dataset::{ColumnSelector, Dataset};
use crate::error::{PrepError, Result};
use crate::utils::{mean, quantile_sorted, sample_std, sorted};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Summary of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    /// Non-missing cells
    pub count: usize,
    pub missing: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation, `None` for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveSummary {
    pub columns: Vec<ColumnSummary>,
}

impl DescriptiveSummary {
    pub fn get(&self, column: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.column == column)
    }
}

/// Count, mean, spread and quartiles of each selected numeric column.
///
/// `All` selects every numeric column. Quartiles use the same linear
/// interpolation as the outlier filter.
pub fn describe(dataset: &Dataset, columns: &ColumnSelector) -> Result<DescriptiveSummary> {
    columns.validate("describe.columns")?;
    let names = columns.resolve_numeric(dataset, |name, ty| {
        PrepError::Configuration(format!(
            "descriptive statistics require numeric columns, but '{}' is {}",
            name, ty
        ))
    })?;
    if names.is_empty() {
        return Err(PrepError::Configuration(
            "no numeric columns to describe".to_string(),
        ));
    }

    let mut summaries = Vec::with_capacity(names.len());
    for name in names {
        summaries.push(summarize(dataset, &name)?);
    }
    Ok(DescriptiveSummary { columns: summaries })
}

fn summarize(dataset: &Dataset, name: &str) -> Result<ColumnSummary> {
    let values = present_numeric(dataset, name, "descriptive statistics")?;
    let missing = dataset.height() - values.len();
    let s = sorted(&values);

    let (Some(mean), Some(q1), Some(q2), Some(q3)) = (
        mean(&s),
        quantile_sorted(&s, 0.25),
        quantile_sorted(&s, 0.5),
        quantile_sorted(&s, 0.75),
    ) else {
        return Err(PrepError::insufficient(
            format!("descriptive statistics of column '{}'", name),
            1,
            0,
        ));
    };

    debug!("Described '{}': {} values, {} missing", name, s.len(), missing);
    Ok(ColumnSummary {
        column: name.to_string(),
        count: s.len(),
        missing,
        mean,
        median: q2,
        std: sample_std(&s),
        min: s[0],
        max: s[s.len() - 1],
        q1,
        q2,
        q3,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use approx::assert_relative_eq;
    use polars::prelude::*;

    fn sample() -> Dataset {
        Dataset::new(
            df![
                "a" => [Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)],
                "b" => [10i64, 20, 30, 40, 50],
                "name" => ["p", "q", "r", "s", "t"],
            ]
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_describe_all_numeric() {
        let summary = describe(&sample(), &ColumnSelector::All).unwrap();
        assert_eq!(summary.columns.len(), 2);

        let a = summary.get("a").unwrap();
        assert_eq!(a.count, 4);
        assert_eq!(a.missing, 1);
        assert_relative_eq!(a.mean, 2.5);
        assert_relative_eq!(a.median, 2.5);
        assert_relative_eq!(a.q1, 1.75);
        assert_relative_eq!(a.q3, 3.25);
        assert_relative_eq!(a.std.unwrap(), (5.0f64 / 3.0).sqrt());
        assert_eq!((a.min, a.max), (1.0, 4.0));

        let b = summary.get("b").unwrap();
        assert_relative_eq!(b.mean, 30.0);
        assert_eq!(b.missing, 0);
    }

    #[test]
    fn test_single_value_has_no_std() {
        let ds = Dataset::new(df!["x" => [Some(7.0), None]].unwrap()).unwrap();
        let summary = describe(&ds, &ColumnSelector::All).unwrap();
        assert_eq!(summary.columns[0].std, None);
        assert_eq!(summary.columns[0].q1, 7.0);
    }

    #[test]
    fn test_text_column_rejected() {
        let err = describe(&sample(), &ColumnSelector::column("name")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_all_missing_column() {
        let ds = Dataset::new(df!["x" => [None::<f64>, None]].unwrap()).unwrap();
        let err = describe(&ds, &ColumnSelector::All).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }
}
