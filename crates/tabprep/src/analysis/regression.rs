//! Ordinary least squares regression.

use super::hypothesis::two_sided_p;
use super::numeric_column;
use crate::dataset::Dataset;
use crate::error::{PrepError, Result};
use crate::utils::is_constant;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionOptions {
    /// Add a constant term to the design matrix.
    #[serde(default = "default_fit_intercept")]
    pub fit_intercept: bool,
}

fn default_fit_intercept() -> bool {
    true
}

impl Default for RegressionOptions {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

/// One estimated parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    /// Two-sided, against a Student-t with the residual degrees of freedom
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub response: String,
    /// `None` when the model was fitted without a constant term.
    pub intercept: Option<Coefficient>,
    /// One per predictor, in the order given.
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub residual_std_error: f64,
    pub df_residual: usize,
    /// Rows used after dropping rows with any missing value
    pub n_observations: usize,
}

impl RegressionResult {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Fitted value for one row of predictor values, in predictor order.
    pub fn predict(&self, row: &[f64]) -> Option<f64> {
        if row.len() != self.coefficients.len() {
            return None;
        }
        let base = self.intercept.as_ref().map_or(0.0, |c| c.estimate);
        Some(
            base + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c.estimate * x)
                .sum::<f64>(),
        )
    }
}

/// Fit `response ~ predictors` by least squares.
///
/// Rows missing the response or any predictor are dropped. The system is
/// solved through a singular value decomposition of the design matrix; a
/// design whose numerical rank is below its column count is rejected rather
/// than solved with a pseudo-inverse.
pub fn linear_regression(
    dataset: &Dataset,
    response: &str,
    predictors: &[&str],
    options: RegressionOptions,
) -> Result<RegressionResult> {
    if predictors.is_empty() && !options.fit_intercept {
        return Err(PrepError::Configuration(
            "regression without an intercept needs at least one predictor".to_string(),
        ));
    }

    let y_column = numeric_column(dataset, response, "linear regression")?;
    let x_columns = predictors
        .iter()
        .map(|name| numeric_column(dataset, name, "linear regression"))
        .collect::<Result<Vec<_>>>()?;

    // listwise deletion
    let rows: Vec<usize> = (0..dataset.height())
        .filter(|&r| y_column[r].is_some() && x_columns.iter().all(|c| c[r].is_some()))
        .collect();

    let n = rows.len();
    let offset = usize::from(options.fit_intercept);
    let p = predictors.len() + offset;
    if n <= p {
        return Err(PrepError::insufficient(
            format!("linear regression of '{}' with {} parameters", response, p),
            p + 1,
            n,
        ));
    }

    let y = DVector::from_iterator(n, rows.iter().map(|&r| y_column[r].unwrap_or_default()));
    let x = DMatrix::from_fn(n, p, |i, j| {
        if j < offset {
            1.0
        } else {
            x_columns[j - offset][rows[i]].unwrap_or_default()
        }
    });

    if is_constant(y.as_slice()) {
        return Err(PrepError::degenerate(
            response,
            "linear regression",
            "constant response",
        ));
    }
    let y_mean = y.mean();
    let ss_total_centered: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();

    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let tolerance = n.max(p) as f64 * f64::EPSILON * sigma_max;
    let rank = svd.singular_values.iter().filter(|&&s| s > tolerance).count();
    if rank < p {
        return Err(PrepError::SingularDesign {
            predictors: predictors.iter().map(|s| s.to_string()).collect(),
            rank,
            columns: p,
        });
    }

    let beta = svd
        .solve(&y, tolerance)
        .map_err(|e| PrepError::Internal(format!("least squares solve failed: {}", e)))?;
    let Some(v_t) = svd.v_t.as_ref() else {
        return Err(PrepError::Internal("SVD did not produce V^T".to_string()));
    };

    // (X'X)^-1 = V diag(1/s^2) V'
    let inv_sq: Vec<f64> = svd.singular_values.iter().map(|s| 1.0 / (s * s)).collect();
    let unscaled_cov = DMatrix::from_fn(p, p, |i, j| {
        (0..p).map(|k| v_t[(k, i)] * v_t[(k, j)] * inv_sq[k]).sum::<f64>()
    });

    let residuals = &y - &x * &beta;
    let ss_resid = residuals.norm_squared();
    let df_residual = n - p;
    let sigma_sq = ss_resid / df_residual as f64;

    let (ss_total, df_total) = if options.fit_intercept {
        (ss_total_centered, (n - 1) as f64)
    } else {
        (y.norm_squared(), n as f64)
    };
    let r_squared = 1.0 - ss_resid / ss_total;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * df_total / df_residual as f64;

    let mut estimates = Vec::with_capacity(p);
    for j in 0..p {
        let name = if j < offset {
            "intercept".to_string()
        } else {
            predictors[j - offset].to_string()
        };
        let std_error = (sigma_sq * unscaled_cov[(j, j)]).sqrt();
        let t_statistic = beta[j] / std_error;
        let p_value = if t_statistic.is_nan() {
            f64::NAN
        } else if t_statistic.is_infinite() {
            0.0
        } else {
            two_sided_p(t_statistic, df_residual as f64)?
        };
        estimates.push(Coefficient {
            name,
            estimate: beta[j],
            std_error,
            t_statistic,
            p_value,
        });
    }

    let intercept = if options.fit_intercept {
        Some(estimates.remove(0))
    } else {
        None
    };

    debug!(
        "Regressed '{}' on {} predictor(s) over {} rows: R^2 = {:.4}",
        response,
        predictors.len(),
        n,
        r_squared
    );

    Ok(RegressionResult {
        response: response.to_string(),
        intercept,
        coefficients: estimates,
        r_squared,
        adj_r_squared,
        residual_std_error: sigma_sq.sqrt(),
        df_residual,
        n_observations: n,
    })
}
