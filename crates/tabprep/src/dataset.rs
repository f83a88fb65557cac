//! The in-memory tabular value every stage and analysis routine operates on.
//!
//! A [`Dataset`] is a polars [`DataFrame`] plus one declared [`SemanticType`]
//! per column. It is never mutated in place: stages take `&Dataset` and
//! return a new `Dataset`. Polars columns are reference counted, so the
//! copies are cheap and a failed stage leaves the caller's value intact.

use crate::config::ConfigValidationError;
use crate::error::{PrepError, Result};
use crate::utils::{is_categorical_dtype, is_datetime_dtype, is_numeric_dtype, timestamp_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Text,
    Timestamp,
    Boolean,
    Categorical,
}

impl SemanticType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Boolean => "boolean",
            Self::Categorical => "categorical",
        }
    }

    /// Text and categorical columns share string storage.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Categorical)
    }

    fn from_dtype(dtype: &DataType) -> Option<Self> {
        if is_numeric_dtype(dtype) {
            Some(Self::Numeric)
        } else if is_datetime_dtype(dtype) {
            Some(Self::Timestamp)
        } else if is_categorical_dtype(dtype) {
            Some(Self::Categorical)
        } else {
            match dtype {
                DataType::Boolean => Some(Self::Boolean),
                DataType::String => Some(Self::Text),
                _ => None,
            }
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies the columns an operation applies to.
///
/// What `All` expands to depends on the operation: numeric routines take
/// every numeric column, text cleaning every text or categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSelector {
    #[default]
    All,
    Columns(Vec<String>),
}

impl ColumnSelector {
    /// Select the given columns, in order.
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Select a single column.
    pub fn column(name: impl Into<String>) -> Self {
        Self::Columns(vec![name.into()])
    }

    /// Reject empty or duplicated explicit selections.
    pub fn validate(&self, field: &str) -> std::result::Result<(), ConfigValidationError> {
        if let Self::Columns(names) = self {
            if names.is_empty() {
                return Err(ConfigValidationError::EmptySelector(field.to_string()));
            }
            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(name.as_str()) {
                    return Err(ConfigValidationError::DuplicateColumn {
                        field: field.to_string(),
                        column: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve against a dataset. `All` expands to the columns accepted by
    /// `include`; explicit names must exist but are not type-checked here.
    pub(crate) fn resolve<F>(&self, dataset: &Dataset, include: F) -> Result<Vec<String>>
    where
        F: Fn(&str, SemanticType) -> bool,
    {
        match self {
            Self::All => Ok(dataset
                .schema()
                .into_iter()
                .filter(|(name, ty)| include(name, *ty))
                .map(|(name, _)| name)
                .collect()),
            Self::Columns(names) => {
                for name in names {
                    if !dataset.has_column(name) {
                        return Err(PrepError::ColumnNotFound(name.clone()));
                    }
                }
                Ok(names.clone())
            }
        }
    }

    /// Resolve to numeric columns; a named non-numeric column is rejected
    /// with `on_mismatch`.
    pub(crate) fn resolve_numeric<E>(&self, dataset: &Dataset, on_mismatch: E) -> Result<Vec<String>>
    where
        E: Fn(&str, SemanticType) -> PrepError,
    {
        let names = self.resolve(dataset, |_, ty| ty == SemanticType::Numeric)?;
        for name in &names {
            let ty = dataset.semantic_type(name)?;
            if ty != SemanticType::Numeric {
                return Err(on_mismatch(name, ty));
            }
        }
        Ok(names)
    }
}

/// A single cell, used for equality, grouping and display.
///
/// Numbers compare by exact value with `0.0 == -0.0` and NaN equal to
/// itself, so the type can be hashed.
#[derive(Debug, Clone)]
pub enum CellValue {
    Missing,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    fn number_bits(v: f64) -> u64 {
        if v == 0.0 {
            0.0f64.to_bits()
        } else if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Missing, Self::Missing) => true,
            (Self::Number(a), Self::Number(b)) => Self::number_bits(*a) == Self::number_bits(*b),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Missing => {}
            Self::Number(v) => Self::number_bits(*v).hash(state),
            Self::Text(s) => s.hash(state),
            Self::Boolean(b) => b.hash(state),
            Self::Timestamp(ms) => ms.hash(state),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ms) => match chrono::DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "{}", dt.naive_utc()),
                None => write!(f, "{}", ms),
            },
        }
    }
}

/// Immutable rectangular table of named, typed columns.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    types: Vec<SemanticType>,
}

static_assertions::assert_impl_all!(Dataset: Send, Sync);

impl Dataset {
    /// Wrap a DataFrame, inferring each column's semantic type from its dtype.
    ///
    /// Categorical and enum columns are stored as strings tagged
    /// [`SemanticType::Categorical`]; dates are widened to millisecond
    /// datetimes. Any other dtype (lists, structs, binary) is rejected.
    pub fn new(frame: DataFrame) -> Result<Self> {
        let mut frame = frame;
        let mut types = Vec::with_capacity(frame.width());
        let mut seen = HashSet::new();
        let height = frame.height();

        let columns: Vec<(String, DataType, usize)> = frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.dtype().clone(), c.len()))
            .collect();

        for (name, dtype, len) in columns {
            if !seen.insert(name.clone()) {
                return Err(PrepError::Configuration(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
            if len != height {
                return Err(PrepError::Configuration(format!(
                    "column '{}' has {} rows, expected {}",
                    name, len, height
                )));
            }
            let semantic = SemanticType::from_dtype(&dtype).ok_or_else(|| {
                PrepError::Configuration(format!(
                    "column '{}' has unsupported dtype {}",
                    name, dtype
                ))
            })?;

            let target = match (semantic, &dtype) {
                (SemanticType::Categorical, _) => Some(DataType::String),
                (SemanticType::Timestamp, d) if *d != timestamp_dtype() => Some(timestamp_dtype()),
                _ => None,
            };
            if let Some(target) = target {
                let converted = frame.column(&name)?.as_materialized_series().cast(&target)?;
                frame.replace(&name, converted)?;
            }
            types.push(semantic);
        }

        Ok(Self { frame, types })
    }

    /// Re-declare a column as text or categorical.
    ///
    /// Only storage-compatible retagging is allowed; anything else needs
    /// type coercion.
    pub fn declare(&self, name: &str, semantic: SemanticType) -> Result<Self> {
        let idx = self.index_of(name)?;
        let current = self.types[idx];
        if current != semantic && !(current.is_textual() && semantic.is_textual()) {
            return Err(PrepError::Configuration(format!(
                "cannot declare {} column '{}' as {}; coerce it instead",
                current, name, semantic
            )));
        }
        let mut out = self.clone();
        out.types[idx] = semantic;
        Ok(out)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// Column names paired with their semantic types, in column order.
    pub fn schema(&self) -> Vec<(String, SemanticType)> {
        self.column_names().into_iter().zip(self.types.iter().copied()).collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.frame
            .get_column_index(name)
            .ok_or_else(|| PrepError::ColumnNotFound(name.to_string()))
    }

    pub fn semantic_type(&self, name: &str) -> Result<SemanticType> {
        Ok(self.types[self.index_of(name)?])
    }

    /// The underlying polars series for a column.
    pub fn column(&self, name: &str) -> Result<&Series> {
        self.index_of(name)?;
        Ok(self.frame.column(name)?.as_materialized_series())
    }

    pub fn missing_count(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.null_count())
    }

    /// All cells of a numeric column as `f64`, `None` for missing.
    pub fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let ty = self.semantic_type(name)?;
        if ty != SemanticType::Numeric {
            return Err(PrepError::Configuration(format!(
                "column '{}' is {}, expected numeric",
                name, ty
            )));
        }
        let cast = self.column(name)?.cast(&DataType::Float64)?;
        Ok(cast.f64()?.into_iter().collect())
    }

    /// The non-missing values of a numeric column, in row order.
    pub fn present_values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.numeric_values(name)?.into_iter().flatten().collect())
    }

    /// All cells of a text or categorical column.
    pub fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let ty = self.semantic_type(name)?;
        if !ty.is_textual() {
            return Err(PrepError::Configuration(format!(
                "column '{}' is {}, expected text",
                name, ty
            )));
        }
        Ok(self
            .column(name)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    /// All cells of any column as [`CellValue`]s.
    pub fn cells(&self, name: &str) -> Result<Vec<CellValue>> {
        let series = self.column(name)?;
        let cells = match self.semantic_type(name)? {
            SemanticType::Numeric => self
                .numeric_values(name)?
                .into_iter()
                .map(|v| v.map_or(CellValue::Missing, CellValue::Number))
                .collect(),
            SemanticType::Text | SemanticType::Categorical => series
                .str()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Missing, |s| CellValue::Text(s.to_string())))
                .collect(),
            SemanticType::Boolean => series
                .bool()?
                .into_iter()
                .map(|v| v.map_or(CellValue::Missing, CellValue::Boolean))
                .collect(),
            SemanticType::Timestamp => {
                let physical = series.cast(&DataType::Int64)?;
                physical
                    .i64()?
                    .into_iter()
                    .map(|v| v.map_or(CellValue::Missing, CellValue::Timestamp))
                    .collect()
            }
        };
        Ok(cells)
    }

    /// Build a series of the given semantic type from cells.
    pub(crate) fn series_from_cells(
        name: &str,
        semantic: SemanticType,
        cells: &[CellValue],
    ) -> Result<Series> {
        let mismatch = |cell: &CellValue| {
            PrepError::Internal(format!(
                "cell '{}' does not fit {} column '{}'",
                cell, semantic, name
            ))
        };
        let name = PlSmallStr::from(name);
        let series = match semantic {
            SemanticType::Numeric => {
                let values = cells
                    .iter()
                    .map(|c| match c {
                        CellValue::Missing => Ok(None),
                        CellValue::Number(v) => Ok(Some(*v)),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Vec<Option<f64>>>>()?;
                Series::new(name, values)
            }
            SemanticType::Text | SemanticType::Categorical => {
                let values = cells
                    .iter()
                    .map(|c| match c {
                        CellValue::Missing => Ok(None),
                        CellValue::Text(s) => Ok(Some(s.clone())),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Vec<Option<String>>>>()?;
                Series::new(name, values)
            }
            SemanticType::Boolean => {
                let values = cells
                    .iter()
                    .map(|c| match c {
                        CellValue::Missing => Ok(None),
                        CellValue::Boolean(b) => Ok(Some(*b)),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Vec<Option<bool>>>>()?;
                Series::new(name, values)
            }
            SemanticType::Timestamp => {
                let values = cells
                    .iter()
                    .map(|c| match c {
                        CellValue::Missing => Ok(None),
                        CellValue::Timestamp(ms) => Ok(Some(*ms)),
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Vec<Option<i64>>>>()?;
                Series::new(name, values).cast(&timestamp_dtype())?
            }
        };
        Ok(series)
    }

    /// A new dataset with one column replaced and re-typed.
    pub(crate) fn with_column(&self, series: Series, semantic: SemanticType) -> Result<Self> {
        let name = series.name().to_string();
        let idx = self.index_of(&name)?;
        let mut frame = self.frame.clone();
        frame.replace(&name, series)?;
        let mut types = self.types.clone();
        types[idx] = semantic;
        Ok(Self { frame, types })
    }

    /// A new dataset over a row subset of this one, such as the result of a
    /// polars filter or `unique`. Columns must match by name and order.
    pub(crate) fn with_rows(&self, frame: DataFrame) -> Result<Self> {
        let same_columns = frame.width() == self.width()
            && frame
                .get_column_names()
                .into_iter()
                .zip(self.frame.get_column_names())
                .all(|(a, b)| a == b);
        if !same_columns {
            return Err(PrepError::Internal(
                "row subset does not match the dataset's columns".to_string(),
            ));
        }
        Ok(Self {
            frame,
            types: self.types.clone(),
        })
    }

    /// A new dataset keeping only the rows where `keep` is true.
    pub(crate) fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.height() {
            return Err(PrepError::Internal(format!(
                "row mask has {} entries for {} rows",
                keep.len(),
                self.height()
            )));
        }
        let mask = BooleanChunked::from_slice("mask".into(), keep);
        Ok(Self {
            frame: self.frame.filter(&mask)?,
            types: self.types.clone(),
        })
    }
}
