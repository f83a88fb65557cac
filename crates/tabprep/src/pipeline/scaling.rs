//! Numeric rescaling with reusable fitted parameters.

use crate::config::{NormalizationConfig, NormalizationMethod};
use crate::dataset::{ColumnSelector, Dataset, SemanticType};
use crate::error::{PrepError, Result};
use crate::utils::{is_constant, mean, sample_std};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitted parameters for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScaleParams {
    Standard { mean: f64, std: f64 },
    MinMax { min: f64, max: f64 },
}

impl ScaleParams {
    pub fn forward(&self, x: f64) -> f64 {
        match *self {
            Self::Standard { mean, std } => (x - mean) / std,
            Self::MinMax { min, max } => (x - min) / (max - min),
        }
    }

    pub fn inverse(&self, y: f64) -> f64 {
        match *self {
            Self::Standard { mean, std } => y * std + mean,
            Self::MinMax { min, max } => y * (max - min) + min,
        }
    }
}

/// A scaled column and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaling {
    pub column: String,
    pub params: ScaleParams,
}

/// Per-column parameters of a normalization, reusable on new data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    pub method: NormalizationMethod,
    pub columns: Vec<ColumnScaling>,
}

impl FittedScaler {
    pub fn params_for(&self, column: &str) -> Option<&ScaleParams> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| &c.params)
    }

    /// Apply the fitted parameters to a dataset with the same columns.
    pub fn transform(&self, dataset: &Dataset) -> Result<Dataset> {
        self.map_columns(dataset, ScaleParams::forward)
    }

    /// Undo the scaling.
    pub fn inverse_transform(&self, dataset: &Dataset) -> Result<Dataset> {
        self.map_columns(dataset, ScaleParams::inverse)
    }

    fn map_columns(&self, dataset: &Dataset, f: fn(&ScaleParams, f64) -> f64) -> Result<Dataset> {
        let mut out = dataset.clone();
        for scaling in &self.columns {
            let ty = dataset.semantic_type(&scaling.column)?;
            if ty != SemanticType::Numeric {
                return Err(mismatch(&scaling.column, self.method, ty));
            }
            let values: Vec<Option<f64>> = dataset
                .numeric_values(&scaling.column)?
                .into_iter()
                .map(|v| v.map(|x| f(&scaling.params, x)))
                .collect();
            out = out.with_column(
                Series::new(scaling.column.as_str().into(), values),
                SemanticType::Numeric,
            )?;
        }
        Ok(out)
    }
}

/// Rescales numeric columns by standardization or min-max scaling.
#[derive(Debug, Clone)]
pub struct Normalizer {
    method: NormalizationMethod,
    columns: ColumnSelector,
}

impl Normalizer {
    pub fn new(method: NormalizationMethod, columns: ColumnSelector) -> Self {
        Self { method, columns }
    }

    pub fn from_config(config: &NormalizationConfig) -> Self {
        Self::new(config.method, config.columns.clone())
    }

    /// Compute per-column parameters without transforming.
    pub fn fit(&self, dataset: &Dataset) -> Result<FittedScaler> {
        self.columns.validate("normalization.columns")?;
        let method = self.method;
        let names = self
            .columns
            .resolve_numeric(dataset, |name, ty| mismatch(name, method, ty))?;

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let values = dataset.present_values(&name)?;
            let params = self.fit_column(&name, &values)?;
            debug!("Fitted {} for '{}': {:?}", self.method.name(), name, params);
            columns.push(ColumnScaling {
                column: name,
                params,
            });
        }

        Ok(FittedScaler {
            method: self.method,
            columns,
        })
    }

    /// Fit and transform in one step.
    ///
    /// Missing cells stay missing; scaled columns are Float64.
    pub fn fit_transform(&self, dataset: &Dataset) -> Result<(Dataset, FittedScaler)> {
        let scaler = self.fit(dataset)?;
        let out = scaler.transform(dataset)?;
        Ok((out, scaler))
    }

    fn fit_column(&self, name: &str, values: &[f64]) -> Result<ScaleParams> {
        match self.method {
            NormalizationMethod::Standard => {
                if values.len() < 2 {
                    return Err(PrepError::insufficient(
                        format!("standardization of column '{}'", name),
                        2,
                        values.len(),
                    ));
                }
                if is_constant(values) {
                    return Err(PrepError::degenerate(name, "standardization", "zero variance"));
                }
                let (Some(mean), Some(std)) = (mean(values), sample_std(values)) else {
                    return Err(PrepError::Internal(format!(
                        "could not compute moments of column '{}'",
                        name
                    )));
                };
                Ok(ScaleParams::Standard { mean, std })
            }
            NormalizationMethod::MinMax => {
                if values.is_empty() {
                    return Err(PrepError::insufficient(
                        format!("min-max scaling of column '{}'", name),
                        1,
                        0,
                    ));
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if max == min {
                    return Err(PrepError::degenerate(name, "min-max scaling", "max equals min"));
                }
                Ok(ScaleParams::MinMax { min, max })
            }
        }
    }
}

fn mismatch(column: &str, method: NormalizationMethod, ty: SemanticType) -> PrepError {
    PrepError::Strategy {
        column: column.to_string(),
        strategy: method.name().to_string(),
        column_type: ty.name().to_string(),
    }
}
