//! Shared utilities for the cleaning pipeline and analysis routines.
//!
//! This module contains common helper functions used across multiple modules
//! to reduce code duplication and ensure consistency: dtype checks, string
//! parsing, and the small numeric kernels (mean, variance, quantiles) that
//! every statistic in the crate is built from.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Check if a DataType is a categorical-like type.
#[inline]
pub fn is_categorical_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Categorical(_, _) | DataType::Enum(_, _))
}

/// The dtype timestamps are stored with.
pub fn timestamp_dtype() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Common missing value markers in raw text data.
pub const MISSING_MARKERS: [&str; 8] = [
    "error", "unknown", "n/a", "na", "null", "missing", "none", "#n/a",
];

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust
/// use tabprep::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
/// assert_eq!(clean_numeric_string("  42%  "), "42");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is empty or a missing value marker.
///
/// ```rust
/// use tabprep::utils::is_missing_marker;
///
/// assert!(is_missing_marker("N/A"));
/// assert!(is_missing_marker("   "));
/// assert!(!is_missing_marker("42"));
/// ```
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.is_empty() || MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles common formatting like currency symbols, percentages, and thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Common boolean true representations.
pub const BOOLEAN_TRUE_VALUES: [&str; 8] =
    ["true", "yes", "1", "t", "y", "on", "enabled", "active"];

/// Common boolean false representations.
pub const BOOLEAN_FALSE_VALUES: [&str; 8] =
    ["false", "no", "0", "f", "n", "off", "disabled", "inactive"];

/// Parse a boolean representation, case-insensitively.
pub fn parse_boolean_string(s: &str) -> Option<bool> {
    let lower = s.trim().to_ascii_lowercase();
    if BOOLEAN_TRUE_VALUES.iter().any(|&v| v == lower) {
        Some(true)
    } else if BOOLEAN_FALSE_VALUES.iter().any(|&v| v == lower) {
        Some(false)
    } else {
        None
    }
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// True when every value equals the first. Empty and single-value slices
/// are constant.
///
/// Compares the values themselves; a computed variance of a constant
/// sample such as `[0.1, 0.1, 0.1]` is not exactly zero.
pub fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Sample variance (n - 1 denominator). `None` for fewer than two values.
///
/// Exactly zero for a constant sample.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    if is_constant(values) {
        return Some(0.0);
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Sort a copy of `values` ascending using IEEE total ordering.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Quantile of an ascending-sorted slice by linear interpolation between
/// closest ranks: `h = (n - 1) * p`, `q = x[floor(h)] + (h - floor(h)) * (x[ceil(h)] - x[floor(h)])`.
///
/// This is Hyndman & Fan type 7. `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// First, second and third quartiles of an unsorted slice.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64, f64)> {
    let s = sorted(values);
    Some((
        quantile_sorted(&s, 0.25)?,
        quantile_sorted(&s, 0.5)?,
        quantile_sorted(&s, 0.75)?,
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_is_datetime_dtype() {
        assert!(is_datetime_dtype(&timestamp_dtype()));
        assert!(is_datetime_dtype(&DataType::Date));
        assert!(!is_datetime_dtype(&DataType::Int64));
    }

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("€1,000"), "1000");
        assert_eq!(clean_numeric_string("50%"), "50");
        assert_eq!(clean_numeric_string("-3.5"), "-3.5");
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("$1,234.50"), Some(1234.5));
        assert_eq!(parse_numeric_string("1e3"), Some(1000.0));
        assert_eq!(parse_numeric_string("abc"), None);
        assert_eq!(parse_numeric_string(""), None);
    }

    #[test]
    fn test_missing_markers() {
        assert!(is_missing_marker("NULL"));
        assert!(is_missing_marker("#N/A"));
        assert!(is_missing_marker(""));
        assert!(!is_missing_marker("nan-bread"));
    }

    #[test]
    fn test_parse_boolean_string() {
        assert_eq!(parse_boolean_string(" Yes "), Some(true));
        assert_eq!(parse_boolean_string("OFF"), Some(false));
        assert_eq!(parse_boolean_string("maybe"), None);
    }

    #[test]
    fn test_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        // sum of squares 32 over n - 1 = 7
        assert!((sample_variance(&values).unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(sample_variance(&[1.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_constant_sample_has_exact_zero_variance() {
        let values = [0.1, 0.1, 0.1];
        assert!(is_constant(&values));
        assert_eq!(sample_variance(&values), Some(0.0));
        assert_eq!(sample_std(&values), Some(0.0));
        assert!(!is_constant(&[0.1, 0.1, 0.2]));
        assert!(is_constant(&[]));
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let s = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(quantile_sorted(&s, 0.25), Some(2.0));
        assert_eq!(quantile_sorted(&s, 0.5), Some(3.0));
        assert_eq!(quantile_sorted(&s, 0.75), Some(4.0));

        let even = [1.0, 2.0, 3.0, 4.0];
        // h = 0.75 -> 1 + 0.75 * 1
        assert_eq!(quantile_sorted(&even, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&even, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_quartiles_unsorted() {
        assert_eq!(quartiles(&[5.0, 1.0, 3.0]), Some((2.0, 3.0, 4.0)));
        assert_eq!(quartiles(&[]), None);
    }
}
