//! Cell-level conversion functions for type coercion.
//!
//! Every converter works on [`CellValue`]s, so one code path handles a
//! source column of any semantic type. A cell either converts, is recognised
//! as missing, or fails; failures are reported by row index and never
//! silently dropped.

use crate::config::{TargetType, TimestampFormat};
use crate::dataset::CellValue;
use crate::error::Result;
use crate::utils::{is_missing_marker, parse_boolean_string, parse_numeric_string, timestamp_dtype};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Datetime layouts tried, in order, after RFC 3339.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts tried after the datetime layouts.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Outcome of converting one cell.
#[derive(Debug, Clone, PartialEq)]
enum Parsed<T> {
    Value(T),
    Missing,
    Failed,
}

/// A converted column plus the rows that could not be converted.
#[derive(Debug, Clone)]
pub(crate) struct Conversion {
    /// The new column; failed cells are null.
    pub series: Series,
    pub failed_rows: Vec<usize>,
    /// Rendering of the first failed cell.
    pub sample: Option<String>,
}

/// Convert `cells` to `target`, naming the resulting series `name`.
pub(crate) fn convert_cells(
    name: &str,
    cells: &[CellValue],
    target: TargetType,
    format: &TimestampFormat,
) -> Result<Conversion> {
    let name = PlSmallStr::from(name);
    let conversion = match target {
        TargetType::Float => {
            let (values, failed_rows, sample) = collect(cells, to_float);
            (Series::new(name, values), failed_rows, sample)
        }
        TargetType::Integer => {
            let (values, failed_rows, sample) = collect(cells, to_integer);
            (Series::new(name, values), failed_rows, sample)
        }
        TargetType::Boolean => {
            let (values, failed_rows, sample) = collect(cells, to_boolean);
            (Series::new(name, values), failed_rows, sample)
        }
        TargetType::Timestamp => {
            let (values, failed_rows, sample) = collect(cells, |c| to_timestamp(c, format));
            let series = Series::new(name, values).cast(&timestamp_dtype())?;
            (series, failed_rows, sample)
        }
        TargetType::Text | TargetType::Categorical => {
            let (values, failed_rows, sample) = collect(cells, to_text);
            (Series::new(name, values), failed_rows, sample)
        }
    };

    let (series, failed_rows, sample) = conversion;
    Ok(Conversion {
        series,
        failed_rows,
        sample,
    })
}

fn collect<T, F>(cells: &[CellValue], parse: F) -> (Vec<Option<T>>, Vec<usize>, Option<String>)
where
    F: Fn(&CellValue) -> Parsed<T>,
{
    let mut values = Vec::with_capacity(cells.len());
    let mut failed_rows = Vec::new();
    let mut sample = None;

    for (row, cell) in cells.iter().enumerate() {
        match parse(cell) {
            Parsed::Value(v) => values.push(Some(v)),
            Parsed::Missing => values.push(None),
            Parsed::Failed => {
                if sample.is_none() {
                    sample = Some(cell.to_string());
                }
                failed_rows.push(row);
                values.push(None);
            }
        }
    }

    (values, failed_rows, sample)
}

fn to_float(cell: &CellValue) -> Parsed<f64> {
    match cell {
        CellValue::Missing => Parsed::Missing,
        CellValue::Number(v) => Parsed::Value(*v),
        CellValue::Boolean(b) => Parsed::Value(if *b { 1.0 } else { 0.0 }),
        CellValue::Timestamp(ms) => Parsed::Value(*ms as f64),
        CellValue::Text(s) if is_missing_marker(s) => Parsed::Missing,
        CellValue::Text(s) => match parse_numeric_string(s) {
            Some(v) if v.is_finite() => Parsed::Value(v),
            _ => Parsed::Failed,
        },
    }
}

fn to_integer(cell: &CellValue) -> Parsed<i64> {
    match to_float(cell) {
        Parsed::Value(v) => match integral(v) {
            Some(i) => Parsed::Value(i),
            None => Parsed::Failed,
        },
        Parsed::Missing => Parsed::Missing,
        Parsed::Failed => Parsed::Failed,
    }
}

/// `v` as an i64 when it has no fractional part and fits.
fn integral(v: f64) -> Option<i64> {
    const LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53
    (v.is_finite() && v.fract() == 0.0 && v.abs() <= LIMIT).then_some(v as i64)
}

fn to_boolean(cell: &CellValue) -> Parsed<bool> {
    match cell {
        CellValue::Missing => Parsed::Missing,
        CellValue::Boolean(b) => Parsed::Value(*b),
        CellValue::Number(v) if *v == 1.0 => Parsed::Value(true),
        CellValue::Number(v) if *v == 0.0 => Parsed::Value(false),
        CellValue::Number(_) | CellValue::Timestamp(_) => Parsed::Failed,
        CellValue::Text(s) => match parse_boolean_string(s) {
            Some(b) => Parsed::Value(b),
            None if is_missing_marker(s) => Parsed::Missing,
            None => Parsed::Failed,
        },
    }
}

fn to_timestamp(cell: &CellValue, format: &TimestampFormat) -> Parsed<i64> {
    match cell {
        CellValue::Missing => Parsed::Missing,
        CellValue::Timestamp(ms) => Parsed::Value(*ms),
        CellValue::Number(v) => match integral(*v) {
            Some(ms) => Parsed::Value(ms),
            None => Parsed::Failed,
        },
        CellValue::Boolean(_) => Parsed::Failed,
        CellValue::Text(s) if is_missing_marker(s) => Parsed::Missing,
        CellValue::Text(s) => match parse_timestamp(s, format) {
            Some(ms) => Parsed::Value(ms),
            None => Parsed::Failed,
        },
    }
}

fn to_text(cell: &CellValue) -> Parsed<String> {
    match cell {
        CellValue::Missing => Parsed::Missing,
        other => Parsed::Value(other.to_string()),
    }
}

/// Parse a timestamp string to milliseconds since the Unix epoch (UTC).
fn parse_timestamp(s: &str, format: &TimestampFormat) -> Option<i64> {
    let trimmed = s.trim();
    match format {
        TimestampFormat::Explicit(fmt) => parse_with_format(trimmed, fmt),
        TimestampFormat::BestEffort => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                return Some(dt.timestamp_millis());
            }
            DATETIME_FORMATS
                .iter()
                .chain(DATE_FORMATS.iter())
                .find_map(|fmt| parse_with_format(trimmed, fmt))
                .or_else(|| parse_epoch_digits(trimmed))
        }
    }
}

fn parse_with_format(s: &str, fmt: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(s, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// 10 digits are epoch seconds, 13 digits epoch milliseconds.
fn parse_epoch_digits(s: &str) -> Option<i64> {
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value = s.parse::<i64>().ok()?;
    match s.len() {
        10 => value.checked_mul(1000),
        13 => Some(value),
        _ => None,
    }
}
