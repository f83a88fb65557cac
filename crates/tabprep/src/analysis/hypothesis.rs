//! Two-sample t-tests and one-way ANOVA.

use super::{numeric_column, present_numeric};
use crate::dataset::{CellValue, Dataset};
use crate::error::{PrepError, Result};
use crate::utils::{is_constant, mean, sample_variance};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::collections::HashMap;
use tracing::debug;

/// Variance assumption of the two-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TTestKind {
    /// Unequal variances, Welch-Satterthwaite degrees of freedom
    #[default]
    Welch,
    /// Equal variances, pooled estimate
    Student,
}

impl TTestKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Welch => "welch t-test",
            Self::Student => "student t-test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub method: TTestKind,
    pub statistic: f64,
    pub df: f64,
    /// Two-sided
    pub p_value: f64,
    pub n_a: usize,
    pub n_b: usize,
    pub mean_a: f64,
    pub mean_b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnovaResult {
    pub statistic: f64,
    pub df_between: usize,
    pub df_within: usize,
    pub p_value: f64,
    /// Group labels, in first-appearance order
    pub groups: Vec<String>,
    pub sizes: Vec<usize>,
}

/// Independent two-sample t-test between two numeric columns.
///
/// Missing cells are dropped from each column independently.
pub fn t_test(dataset: &Dataset, column_a: &str, column_b: &str, kind: TTestKind) -> Result<TTestResult> {
    let a = present_numeric(dataset, column_a, kind.name())?;
    let b = present_numeric(dataset, column_b, kind.name())?;
    let result = t_test_named(&a, &b, kind, column_a, column_b)?;
    debug!(
        "{} of '{}' vs '{}': t = {:.4}, p = {:.4}",
        kind.name(),
        column_a,
        column_b,
        result.statistic,
        result.p_value
    );
    Ok(result)
}

/// Independent two-sample t-test on raw samples.
pub fn two_sample_t_test(a: &[f64], b: &[f64], kind: TTestKind) -> Result<TTestResult> {
    t_test_named(a, b, kind, "a", "b")
}

fn t_test_named(a: &[f64], b: &[f64], kind: TTestKind, name_a: &str, name_b: &str) -> Result<TTestResult> {
    for (name, sample) in [(name_a, a), (name_b, b)] {
        if sample.len() < 2 {
            return Err(PrepError::insufficient(
                format!("{} of sample '{}'", kind.name(), name),
                2,
                sample.len(),
            ));
        }
    }

    if is_constant(a) && is_constant(b) {
        return Err(PrepError::degenerate(
            format!("{}, {}", name_a, name_b),
            kind.name(),
            "both samples have zero variance",
        ));
    }

    let (Some(mean_a), Some(mean_b), Some(var_a), Some(var_b)) =
        (mean(a), mean(b), sample_variance(a), sample_variance(b))
    else {
        return Err(PrepError::Internal("t-test moments undefined".to_string()));
    };
    let (na, nb) = (a.len() as f64, b.len() as f64);

    let (se, df) = match kind {
        TTestKind::Student => {
            let df = na + nb - 2.0;
            let pooled = ((na - 1.0) * var_a + (nb - 1.0) * var_b) / df;
            ((pooled * (1.0 / na + 1.0 / nb)).sqrt(), df)
        }
        TTestKind::Welch => {
            let qa = var_a / na;
            let qb = var_b / nb;
            let df = (qa + qb).powi(2) / (qa.powi(2) / (na - 1.0) + qb.powi(2) / (nb - 1.0));
            ((qa + qb).sqrt(), df)
        }
    };

    if !se.is_finite() {
        return Err(PrepError::Internal(format!("{} standard error is not finite", kind.name())));
    }

    let statistic = (mean_a - mean_b) / se;
    let p_value = two_sided_p(statistic, df)?;

    Ok(TTestResult {
        method: kind,
        statistic,
        df,
        p_value,
        n_a: a.len(),
        n_b: b.len(),
        mean_a,
        mean_b,
    })
}

pub(super) fn two_sided_p(t: f64, df: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| PrepError::Internal(format!("invalid t distribution (df = {}): {}", df, e)))?;
    Ok((2.0 * dist.cdf(-t.abs())).clamp(0.0, 1.0))
}

/// One-way ANOVA of a numeric column across the groups of another column.
///
/// Groups are the distinct non-missing values of `group_column`, in order
/// of first appearance. Rows missing either value are skipped.
pub fn anova(dataset: &Dataset, value_column: &str, group_column: &str) -> Result<AnovaResult> {
    let values = numeric_column(dataset, value_column, "anova")?;
    let labels = dataset.cells(group_column)?;

    let mut index: HashMap<CellValue, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for (label, value) in labels.into_iter().zip(values) {
        let Some(value) = value else { continue };
        if label.is_missing() {
            continue;
        }
        let slot = match index.get(&label) {
            Some(&slot) => slot,
            None => {
                groups.push((label.to_string(), Vec::new()));
                index.insert(label, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].1.push(value);
    }

    let samples: Vec<&[f64]> = groups.iter().map(|(_, v)| v.as_slice()).collect();
    let names: Vec<String> = groups.iter().map(|(label, _)| label.clone()).collect();
    let result = anova_named(&samples, names, value_column)?;
    debug!(
        "anova of '{}' by '{}' over {} groups: F = {:.4}, p = {:.4}",
        value_column,
        group_column,
        result.groups.len(),
        result.statistic,
        result.p_value
    );
    Ok(result)
}

/// One-way ANOVA on raw samples. Groups are labelled by index.
pub fn one_way_anova(groups: &[&[f64]]) -> Result<AnovaResult> {
    let names = (0..groups.len()).map(|i| i.to_string()).collect();
    anova_named(groups, names, "values")
}

fn anova_named(groups: &[&[f64]], names: Vec<String>, column: &str) -> Result<AnovaResult> {
    if groups.len() < 2 {
        return Err(PrepError::insufficient("anova groups", 2, groups.len()));
    }
    for (name, group) in names.iter().zip(groups) {
        if group.len() < 2 {
            return Err(PrepError::insufficient(
                format!("anova group '{}'", name),
                2,
                group.len(),
            ));
        }
    }

    if groups.iter().all(|g| is_constant(g)) {
        return Err(PrepError::degenerate(
            column,
            "anova",
            "zero variance within every group",
        ));
    }

    let n_total: usize = groups.iter().map(|g| g.len()).sum();
    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n_total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let m = group.iter().sum::<f64>() / group.len() as f64;
        ss_between += group.len() as f64 * (m - grand_mean).powi(2);
        ss_within += group.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    }

    let df_between = groups.len() - 1;
    let df_within = n_total - groups.len();

    let statistic = (ss_between / df_between as f64) / (ss_within / df_within as f64);
    let dist = FisherSnedecor::new(df_between as f64, df_within as f64)
        .map_err(|e| PrepError::Internal(format!("invalid F distribution: {}", e)))?;
    let p_value = (1.0 - dist.cdf(statistic)).clamp(0.0, 1.0);

    Ok(AnovaResult {
        statistic,
        df_between,
        df_within,
        p_value,
        groups: names,
        sizes: groups.iter().map(|g| g.len()).collect(),
    })
}
