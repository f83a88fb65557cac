//! Pairwise correlation matrices.

use super::numeric_column;
use super::rank::average_ranks;
use crate::dataset::{ColumnSelector, Dataset};
use crate::error::{PrepError, Result};
use crate::utils::{is_constant, mean};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    /// Pearson correlation of average ranks
    Spearman,
    /// Kendall's tau-b
    Kendall,
}

impl CorrelationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pearson => "pearson",
            Self::Spearman => "spearman",
            Self::Kendall => "kendall",
        }
    }

    fn compute(&self, x: &[f64], y: &[f64]) -> Result<f64> {
        match self {
            Self::Pearson => pearson(x, y),
            Self::Spearman => spearman(x, y),
            Self::Kendall => kendall(x, y),
        }
    }
}

/// Square, symmetric correlation matrix with a unit diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub method: CorrelationMethod,
    pub columns: Vec<String>,
    /// `values[i][j]` is the correlation of `columns[i]` and `columns[j]`.
    pub values: Vec<Vec<f64>>,
    /// Number of rows where both columns are present. The diagonal holds
    /// the column's own non-missing count.
    pub sample_sizes: Vec<Vec<usize>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }

    pub fn sample_size(&self, a: &str, b: &str) -> Option<usize> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.sample_sizes[i][j])
    }
}

/// Correlation of every pair of selected numeric columns.
///
/// Each pair uses the rows where both columns are present.
pub fn correlation_matrix(
    dataset: &Dataset,
    columns: &ColumnSelector,
    method: CorrelationMethod,
) -> Result<CorrelationMatrix> {
    columns.validate("correlation.columns")?;
    let names = columns.resolve_numeric(dataset, |name, ty| {
        PrepError::Configuration(format!(
            "{} correlation requires numeric columns, but '{}' is {}",
            method.name(),
            name,
            ty
        ))
    })?;
    if names.len() < 2 {
        return Err(PrepError::Configuration(format!(
            "correlation needs at least 2 numeric columns, found {}",
            names.len()
        )));
    }

    let data = names
        .iter()
        .map(|name| numeric_column(dataset, name, "correlation"))
        .collect::<Result<Vec<_>>>()?;

    let size = names.len();
    let mut values = vec![vec![1.0; size]; size];
    let mut sample_sizes = vec![vec![0usize; size]; size];

    for i in 0..size {
        sample_sizes[i][i] = data[i].iter().flatten().count();
        for j in (i + 1)..size {
            let (x, y): (Vec<f64>, Vec<f64>) = data[i]
                .iter()
                .zip(&data[j])
                .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                .unzip();

            if x.len() < 2 {
                return Err(PrepError::insufficient(
                    format!("correlation of '{}' and '{}'", names[i], names[j]),
                    2,
                    x.len(),
                ));
            }
            for (name, column) in [(&names[i], &x), (&names[j], &y)] {
                if is_constant(column) {
                    return Err(PrepError::degenerate(
                        name.as_str(),
                        format!("{} correlation", method.name()),
                        "zero variance over the rows shared with the other column",
                    ));
                }
            }

            let r = method.compute(&x, &y)?;
            values[i][j] = r;
            values[j][i] = r;
            sample_sizes[i][j] = x.len();
            sample_sizes[j][i] = x.len();
        }
    }

    debug!(
        "Computed {} correlation over {} columns",
        method.name(),
        size
    );

    Ok(CorrelationMatrix {
        method,
        columns: names,
        values,
        sample_sizes,
    })
}

/// Pearson product-moment correlation of two equal-length samples.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y, "pearson")?;
    let (Some(mx), Some(my)) = (mean(x), mean(y)) else {
        return Err(PrepError::insufficient("pearson correlation", 2, 0));
    };

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if is_constant(x) {
        return Err(PrepError::degenerate("x", "pearson correlation", "zero variance"));
    }
    if is_constant(y) {
        return Err(PrepError::degenerate("y", "pearson correlation", "zero variance"));
    }
    Ok((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Spearman rank correlation, with tied values given their average rank.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y, "spearman")?;
    pearson(&average_ranks(x), &average_ranks(y)).map_err(|e| match e {
        PrepError::DegenerateColumn { column, reason, .. } => {
            PrepError::degenerate(column, "spearman correlation", reason)
        }
        other => other,
    })
}

/// Kendall's tau-b.
///
/// `(C - D) / sqrt((n0 - n1) * (n0 - n2))` where `n0 = n(n-1)/2`, `n1`
/// counts pairs tied in x and `n2` pairs tied in y. Discordant pairs are
/// counted as merge-sort swaps of y after sorting by x (Knight's method),
/// so large samples run in `O(n log n)`.
pub fn kendall(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y, "kendall")?;
    if is_constant(x) {
        return Err(PrepError::degenerate("x", "kendall correlation", "all values tied"));
    }
    if is_constant(y) {
        return Err(PrepError::degenerate("y", "kendall correlation", "all values tied"));
    }

    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| compare(a.0, b.0).then(compare(a.1, b.1)));

    let n = pairs.len() as u64;
    let n0 = n * (n - 1) / 2;
    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let tied_x = tied_pairs(&xs);
    let tied_xy = tied_pairs(&pairs);

    let mut ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let mut buffer = ys.clone();
    let discordant = merge_count(&mut ys, &mut buffer);
    let tied_y = tied_pairs(&ys);

    // C + D = n0 - n1 - n2 + n3
    let untied = (n0 + tied_xy - tied_x - tied_y) as f64;
    let denom = ((n0 - tied_x) as f64 * (n0 - tied_y) as f64).sqrt();
    Ok(((untied - 2.0 * discordant as f64) / denom).clamp(-1.0, 1.0))
}

fn compare(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Pairs within runs of equal adjacent values of a sorted slice.
fn tied_pairs<T: PartialEq>(sorted: &[T]) -> u64 {
    let mut total = 0u64;
    let mut run = 1u64;
    for w in sorted.windows(2) {
        if w[0] == w[1] {
            run += 1;
        } else {
            total += run * (run - 1) / 2;
            run = 1;
        }
    }
    total + run * (run - 1) / 2
}

/// Merge sort `values` ascending, returning the number of strict inversions.
fn merge_count(values: &mut [f64], buffer: &mut [f64]) -> u64 {
    let n = values.len();
    if n < 2 {
        return 0;
    }
    let mid = n / 2;
    let mut swaps = {
        let (left, right) = values.split_at_mut(mid);
        let (left_buf, right_buf) = buffer.split_at_mut(mid);
        merge_count(left, left_buf) + merge_count(right, right_buf)
    };

    let (mut i, mut j, mut k) = (0, mid, 0);
    while i < mid && j < n {
        if values[j] < values[i] {
            buffer[k] = values[j];
            j += 1;
            swaps += (mid - i) as u64;
        } else {
            buffer[k] = values[i];
            i += 1;
        }
        k += 1;
    }
    buffer[k..k + mid - i].copy_from_slice(&values[i..mid]);
    buffer[k + mid - i..].copy_from_slice(&values[j..]);
    values.copy_from_slice(buffer);
    swaps
}

fn check_pair(x: &[f64], y: &[f64], method: &str) -> Result<()> {
    if x.len() != y.len() {
        return Err(PrepError::Configuration(format!(
            "{} correlation needs samples of equal length, got {} and {}",
            method,
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(PrepError::insufficient(
            format!("{} correlation", method),
            2,
            x.len(),
        ));
    }
    Ok(())
}
