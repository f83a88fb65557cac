//! Error types for the cleaning pipeline and analysis routines.
//!
//! This module provides a single error hierarchy using `thiserror`.
//! Every component-level failure is one of the kinds below and carries
//! enough context (column, rows, stage) to correct the configuration and
//! retry.
//!
//! Errors are serializable so they can be handed to a front end as
//! `{ "code": ..., "message": ... }`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Broad classification of a [`PrepError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Coercion,
    Strategy,
    DegenerateColumn,
    InsufficientData,
    SingularDesign,
    Configuration,
    Internal,
}

/// The main error type for the cleaning pipeline and analysis routines.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Cells could not be parsed into the target type.
    #[error(
        "Failed to coerce column '{column}' to {target}: {} unparsable cell(s) (first at row {}, value '{sample}')",
        .rows.len(),
        .rows.first().copied().unwrap_or_default()
    )]
    Coercion {
        column: String,
        target: String,
        rows: Vec<usize>,
        sample: String,
    },

    /// The chosen strategy cannot be applied to the column's type.
    #[error("Strategy '{strategy}' cannot be applied to {column_type} column '{column}'")]
    Strategy {
        column: String,
        strategy: String,
        column_type: String,
    },

    /// A method that divides by spread was given a zero-variance input.
    #[error("Column '{column}' is degenerate for {method}: {reason}")]
    DegenerateColumn {
        column: String,
        method: String,
        reason: String,
    },

    /// Not enough observations for a statistical method.
    #[error("Insufficient data for {context}: need at least {required}, found {found}")]
    InsufficientData {
        context: String,
        required: usize,
        found: usize,
    },

    /// Regression design matrix is not of full column rank.
    #[error("Singular design matrix: rank {rank} < {columns} columns (predictors: {})", .predictors.join(", "))]
    SingularDesign {
        predictors: Vec<String>,
        rank: usize,
        columns: usize,
    },

    /// Invalid configuration or parameter.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A post-condition did not hold.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PrepError>,
    },
}

impl PrepError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PrepError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub(crate) fn insufficient(context: impl Into<String>, required: usize, found: usize) -> Self {
        PrepError::InsufficientData {
            context: context.into(),
            required,
            found,
        }
    }

    pub(crate) fn degenerate(
        column: impl Into<String>,
        method: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PrepError::DegenerateColumn {
            column: column.into(),
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Get a stable error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Coercion { .. } => "COERCION_ERROR",
            Self::Strategy { .. } => "STRATEGY_ERROR",
            Self::DegenerateColumn { .. } => "DEGENERATE_COLUMN",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::SingularDesign { .. } => "SINGULAR_DESIGN",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Classify the error. Unknown columns count as configuration errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Coercion { .. } => ErrorKind::Coercion,
            Self::Strategy { .. } => ErrorKind::Strategy,
            Self::DegenerateColumn { .. } => ErrorKind::DegenerateColumn,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::SingularDesign { .. } => ErrorKind::SingularDesign,
            Self::Configuration(_) | Self::ColumnNotFound(_) => ErrorKind::Configuration,
            Self::Internal(_) | Self::Polars(_) => ErrorKind::Internal,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Check if this error can be fixed by adjusting the configuration
    /// and retrying on the same data.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }
}

impl Serialize for PrepError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PrepError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline and analysis operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PrepError::Polars(e).with_context(context))
    }
}
