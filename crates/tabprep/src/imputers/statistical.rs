//! Statistical resolution of missing values.
//!
//! Provides mean, median, mode and constant fills plus row dropping. Fill
//! values are always computed from the non-missing cells of the column
//! being filled.

use crate::config::{FillValue, MissingConfig, MissingStrategy};
use crate::dataset::{CellValue, ColumnSelector, Dataset, SemanticType};
use crate::error::{PrepError, Result};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Fills or drops missing cells in the selected columns.
#[derive(Debug, Clone)]
pub struct MissingValueResolver {
    strategy: MissingStrategy,
    columns: ColumnSelector,
}

impl MissingValueResolver {
    pub fn new(strategy: MissingStrategy, columns: ColumnSelector) -> Self {
        Self { strategy, columns }
    }

    pub fn from_config(config: &MissingConfig) -> Self {
        Self::new(config.strategy.clone(), config.columns.clone())
    }

    /// Resolve missing values. `All` selects every column that has at least
    /// one missing cell.
    ///
    /// On success no selected column contains a missing cell.
    pub fn resolve(&self, dataset: &Dataset) -> Result<Dataset> {
        self.columns.validate("missing.columns")?;
        let columns = self.columns.resolve(dataset, |name, _| {
            dataset.missing_count(name).map(|n| n > 0).unwrap_or(false)
        })?;

        let out = match &self.strategy {
            MissingStrategy::Drop => self.drop_rows(dataset, &columns)?,
            _ => {
                let mut out = dataset.clone();
                for name in &columns {
                    out = self.fill_column(&out, name)?;
                }
                out
            }
        };

        for name in &columns {
            let remaining = out.missing_count(name)?;
            if remaining > 0 {
                return Err(PrepError::Internal(format!(
                    "column '{}' still has {} missing value(s) after {} resolution",
                    name,
                    remaining,
                    self.strategy.name()
                )));
            }
        }

        Ok(out)
    }

    fn drop_rows(&self, dataset: &Dataset, columns: &[String]) -> Result<Dataset> {
        let mut keep = vec![true; dataset.height()];
        for name in columns {
            let nulls = dataset.column(name)?.is_null();
            for (row, is_null) in nulls.into_iter().enumerate() {
                if is_null.unwrap_or(false) {
                    keep[row] = false;
                }
            }
        }

        let out = dataset.filter_rows(&keep)?;
        debug!(
            "Dropped {} row(s) with missing values in {} column(s)",
            dataset.height() - out.height(),
            columns.len()
        );
        Ok(out)
    }

    fn fill_column(&self, dataset: &Dataset, name: &str) -> Result<Dataset> {
        let strategy = &self.strategy;
        let semantic = dataset.semantic_type(name)?;
        let missing = dataset.missing_count(name)?;
        if missing == 0 {
            return Ok(dataset.clone());
        }

        let (series, fill) = match strategy {
            MissingStrategy::Mean | MissingStrategy::Median => {
                if semantic != SemanticType::Numeric {
                    return Err(self.strategy_error(name, semantic));
                }
                let numeric = dataset.column(name)?.cast(&DataType::Float64)?;
                let value = if matches!(strategy, MissingStrategy::Mean) {
                    numeric.mean()
                } else {
                    numeric.median()
                };
                let value = value.ok_or_else(|| self.no_values(name))?;
                (fill_numeric(&numeric, value)?, CellValue::Number(value))
            }
            MissingStrategy::Constant(FillValue::Number(value))
                if semantic == SemanticType::Numeric =>
            {
                let numeric = dataset.column(name)?.cast(&DataType::Float64)?;
                (fill_numeric(&numeric, *value)?, CellValue::Number(*value))
            }
            MissingStrategy::Mode => {
                let fill = mode(&dataset.cells(name)?).ok_or_else(|| self.no_values(name))?;
                (fill_cells(dataset, name, semantic, &fill)?, fill)
            }
            MissingStrategy::Constant(value) => {
                if !value.fits(semantic) {
                    return Err(self.strategy_error(name, semantic));
                }
                let fill = fill_cell(value);
                (fill_cells(dataset, name, semantic, &fill)?, fill)
            }
            MissingStrategy::Drop => {
                return Err(PrepError::Internal(
                    "drop is not a fill strategy".to_string(),
                ));
            }
        };

        debug!(
            "Filled {} missing value(s) in '{}' with {}: {}",
            missing,
            name,
            strategy.name(),
            fill
        );
        dataset.with_column(series, semantic)
    }

    fn strategy_error(&self, column: &str, semantic: SemanticType) -> PrepError {
        PrepError::Strategy {
            column: column.to_string(),
            strategy: self.strategy.name().to_string(),
            column_type: semantic.name().to_string(),
        }
    }

    fn no_values(&self, column: &str) -> PrepError {
        PrepError::insufficient(
            format!("{} fill of column '{}'", self.strategy.name(), column),
            1,
            0,
        )
    }
}

fn fill_numeric(numeric: &Series, value: f64) -> Result<Series> {
    Ok(numeric.f64()?.fill_null_with_values(value)?.into_series())
}

/// Replace missing cells one by one, for fills polars has no typed kernel for.
fn fill_cells(
    dataset: &Dataset,
    name: &str,
    semantic: SemanticType,
    fill: &CellValue,
) -> Result<Series> {
    let cells: Vec<CellValue> = dataset
        .cells(name)?
        .into_iter()
        .map(|c| if c.is_missing() { fill.clone() } else { c })
        .collect();
    Dataset::series_from_cells(name, semantic, &cells)
}

/// Most frequent non-missing value; ties go to the value seen first.
fn mode(cells: &[CellValue]) -> Option<CellValue> {
    let mut counts: HashMap<&CellValue, (usize, usize)> = HashMap::new();
    for (row, cell) in cells.iter().enumerate() {
        if cell.is_missing() {
            continue;
        }
        counts.entry(cell).or_insert((0, row)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(cell, _)| cell.clone())
}

fn fill_cell(value: &FillValue) -> CellValue {
    match value {
        FillValue::Number(v) => CellValue::Number(*v),
        FillValue::Text(s) => CellValue::Text(s.clone()),
        FillValue::Boolean(b) => CellValue::Boolean(*b),
        FillValue::Timestamp(ms) => CellValue::Timestamp(*ms),
    }
}
