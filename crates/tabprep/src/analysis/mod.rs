//! Statistical analysis of cleaned datasets.
//!
//! Every routine here is a stateless function of a [`Dataset`] that returns
//! a serializable result record. None of them modify the dataset and none
//! depend on each other.
//!
//! # Example
//!
//! ```rust
//! use tabprep::analysis::{correlation_matrix, CorrelationMethod};
//! use tabprep::{ColumnSelector, Dataset};
//! use polars::prelude::*;
//!
//! let dataset = Dataset::new(df![
//!     "x" => [1.0, 2.0, 3.0, 4.0],
//!     "y" => [2.0, 4.0, 6.0, 8.0],
//! ].unwrap()).unwrap();
//!
//! let matrix = correlation_matrix(&dataset, &ColumnSelector::All, CorrelationMethod::Pearson).unwrap();
//! assert!((matrix.get("x", "y").unwrap() - 1.0).abs() < 1e-12);
//! ```

mod clustering;
mod correlation;
mod descriptive;
mod distribution;
mod hypothesis;
mod rank;
mod regression;

pub use clustering::{KMeansConfig, KMeansResult, kmeans, kmeans_points};
pub use correlation::{
    CorrelationMatrix, CorrelationMethod, correlation_matrix, kendall, pearson, spearman,
};
pub use descriptive::{ColumnSummary, DescriptiveSummary, describe};
pub use distribution::{
    BoxPlotSummary, Histogram, ValueCount, ValueCounts, box_plot, histogram, value_counts,
};
pub use hypothesis::{
    AnovaResult, TTestKind, TTestResult, anova, one_way_anova, t_test, two_sample_t_test,
};
pub use regression::{Coefficient, RegressionOptions, RegressionResult, linear_regression};

use crate::dataset::{Dataset, SemanticType};
use crate::error::{PrepError, Result};

/// Values of a column that must be numeric for `method`.
fn numeric_column(dataset: &Dataset, name: &str, method: &str) -> Result<Vec<Option<f64>>> {
    let ty = dataset.semantic_type(name)?;
    if ty != SemanticType::Numeric {
        return Err(PrepError::Configuration(format!(
            "{} requires numeric columns, but '{}' is {}",
            method, name, ty
        )));
    }
    dataset.numeric_values(name)
}

/// Present values of a numeric column.
fn present_numeric(dataset: &Dataset, name: &str, method: &str) -> Result<Vec<f64>> {
    Ok(numeric_column(dataset, name, method)?
        .into_iter()
        .flatten()
        .collect())
}
