//! Configuration types for the cleaning pipeline.
//!
//! Every stage has a closed, serializable configuration. The pipeline
//! configuration is assembled with a builder and validated eagerly, so an
//! unusable option is reported at construction time rather than halfway
//! through a run.

use crate::dataset::{ColumnSelector, SemanticType};
use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default IQR multiplier for the outlier filter.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

// =============================================================================
// Type coercion
// =============================================================================

/// Target type for column coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Floating point numbers (Float64)
    Float,
    /// Whole numbers (Int64); fractional values fail
    Integer,
    /// Millisecond datetimes
    Timestamp,
    Boolean,
    /// Strings tagged as categorical
    Categorical,
    /// Free text
    Text,
}

impl TargetType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Timestamp => "timestamp",
            Self::Boolean => "boolean",
            Self::Categorical => "categorical",
            Self::Text => "text",
        }
    }

    /// Semantic type of a column after coercion.
    pub fn semantic(&self) -> SemanticType {
        match self {
            Self::Float | Self::Integer => SemanticType::Numeric,
            Self::Timestamp => SemanticType::Timestamp,
            Self::Boolean => SemanticType::Boolean,
            Self::Categorical => SemanticType::Categorical,
            Self::Text => SemanticType::Text,
        }
    }
}

/// What to do with cells that cannot be parsed into the target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoercionFailurePolicy {
    /// Record the rows and turn the cells into missing values
    #[default]
    SetMissing,
    /// Record the rows and fail the stage
    Abort,
}

/// How timestamp strings are parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// RFC 3339, then a fixed list of common layouts, then epoch digits
    #[default]
    BestEffort,
    /// A chrono strftime pattern (datetime or date-only)
    Explicit(String),
}

/// One column and the type it should be converted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTarget {
    pub column: String,
    pub target: TargetType,
}

/// Configuration for the type coercion stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoercionConfig {
    /// Columns to convert, applied in order.
    pub targets: Vec<ColumnTarget>,
    pub on_failure: CoercionFailurePolicy,
    pub timestamp_format: TimestampFormat,
}

impl CoercionConfig {
    pub fn new(targets: Vec<ColumnTarget>) -> Self {
        Self {
            targets,
            on_failure: CoercionFailurePolicy::default(),
            timestamp_format: TimestampFormat::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.targets.is_empty() {
            return Err(ConfigValidationError::EmptySelector(
                "coercion.targets".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.column.as_str()) {
                return Err(ConfigValidationError::DuplicateColumn {
                    field: "coercion.targets".to_string(),
                    column: target.column.clone(),
                });
            }
        }
        if let TimestampFormat::Explicit(fmt) = &self.timestamp_format {
            let broken = fmt.is_empty()
                || chrono::format::StrftimeItems::new(fmt)
                    .any(|item| matches!(item, chrono::format::Item::Error));
            if broken {
                return Err(ConfigValidationError::InvalidTimestampFormat(fmt.clone()));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Missing values
// =============================================================================

/// Value used by the constant fill strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
}

impl FillValue {
    /// Whether this value can be stored in a column of the given type.
    pub fn fits(&self, semantic: SemanticType) -> bool {
        matches!(
            (self, semantic),
            (Self::Number(_), SemanticType::Numeric)
                | (Self::Text(_), SemanticType::Text | SemanticType::Categorical)
                | (Self::Boolean(_), SemanticType::Boolean)
                | (Self::Timestamp(_), SemanticType::Timestamp)
        )
    }
}

/// Strategy for resolving missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingStrategy {
    /// Mean of the non-missing values (numeric only)
    #[default]
    Mean,
    /// Median of the non-missing values (numeric only)
    Median,
    /// Most frequent value; ties go to the value seen first
    Mode,
    /// A fixed value matching the column type
    Constant(FillValue),
    /// Remove rows missing any selected column
    Drop,
}

impl MissingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Constant(_) => "constant",
            Self::Drop => "drop",
        }
    }
}

/// Configuration for the missing-value stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MissingConfig {
    pub strategy: MissingStrategy,
    /// `All` means every column that has missing values.
    pub columns: ColumnSelector,
}

impl MissingConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.columns.validate("missing.columns")?;
        if let MissingStrategy::Constant(FillValue::Number(v)) = &self.strategy
            && !v.is_finite()
        {
            return Err(ConfigValidationError::NonFiniteFill(*v));
        }
        Ok(())
    }
}

// =============================================================================
// Outliers
// =============================================================================

/// Configuration for the IQR outlier filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// `All` means every numeric column.
    pub columns: ColumnSelector,
    /// IQR multiplier `k`.
    pub multiplier: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            columns: ColumnSelector::All,
            multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

impl OutlierConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.columns.validate("outliers.columns")?;
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.multiplier));
        }
        Ok(())
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Numeric rescaling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// `(x - mean) / s` with the sample standard deviation
    #[default]
    Standard,
    /// `(x - min) / (max - min)`
    MinMax,
}

impl NormalizationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standardization",
            Self::MinMax => "min-max scaling",
        }
    }
}

/// Configuration for the normalization stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NormalizationConfig {
    pub method: NormalizationMethod,
    /// `All` means every numeric column.
    pub columns: ColumnSelector,
}

impl NormalizationConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.columns.validate("normalization.columns")
    }
}

// =============================================================================
// Text cleaning
// =============================================================================

/// Which characters the text normalizer strips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRemoval {
    /// Everything that is neither alphanumeric nor whitespace
    #[default]
    NonAlphanumeric,
    /// Only the listed characters
    Only(Vec<char>),
    /// Remove nothing
    Keep,
}

/// Configuration for the text normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCleaningConfig {
    /// `All` means every text or categorical column.
    pub columns: ColumnSelector,
    pub lowercase: bool,
    pub collapse_whitespace: bool,
    pub removal: CharacterRemoval,
}

impl Default for TextCleaningConfig {
    fn default() -> Self {
        Self {
            columns: ColumnSelector::All,
            lowercase: true,
            collapse_whitespace: true,
            removal: CharacterRemoval::default(),
        }
    }
}

impl TextCleaningConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.columns.validate("text.columns")?;
        if let CharacterRemoval::Only(chars) = &self.removal
            && chars.iter().any(|c| c.is_alphanumeric())
        {
            return Err(ConfigValidationError::InvalidParameter {
                field: "text.removal".to_string(),
                reason: "only non-alphanumeric characters can be removed".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Deduplication
// =============================================================================

/// Which occurrence of a duplicated row survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    #[default]
    First,
    Last,
    /// Drop every row that has a duplicate
    None,
}

/// Configuration for the deduplicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DedupConfig {
    /// Key columns; `All` compares whole rows.
    pub columns: ColumnSelector,
    pub keep: KeepPolicy,
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.columns.validate("dedup.columns")
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Configuration for the cleaning pipeline.
///
/// Each section is optional; a missing section skips its stage. Use
/// [`CleaningConfig::builder()`] for a fluent, validated construction.
///
/// # Example
///
/// ```rust
/// use tabprep::config::{CleaningConfig, MissingStrategy, NormalizationMethod, TargetType};
/// use tabprep::ColumnSelector;
///
/// let config = CleaningConfig::builder()
///     .coerce("latitude", TargetType::Float)
///     .missing_strategy(MissingStrategy::Median)
///     .remove_outliers(ColumnSelector::column("latitude"))
///     .normalize(NormalizationMethod::MinMax, ColumnSelector::column("latitude"))
///     .build()
///     .unwrap();
/// assert!(config.text.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CleaningConfig {
    pub coercion: Option<CoercionConfig>,
    pub missing: Option<MissingConfig>,
    pub outliers: Option<OutlierConfig>,
    pub normalization: Option<NormalizationConfig>,
    pub text: Option<TextCleaningConfig>,
    pub dedup: Option<DedupConfig>,
}

impl CleaningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Validate every present section.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(c) = &self.coercion {
            c.validate()?;
        }
        if let Some(c) = &self.missing {
            c.validate()?;
        }
        if let Some(c) = &self.outliers {
            c.validate()?;
        }
        if let Some(c) = &self.normalization {
            c.validate()?;
        }
        if let Some(c) = &self.text {
            c.validate()?;
        }
        if let Some(c) = &self.dedup {
            c.validate()?;
        }
        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid IQR multiplier: {0} (must be finite and non-negative)")]
    InvalidMultiplier(f64),

    #[error("Column selection for '{0}' is empty")]
    EmptySelector(String),

    #[error("Column '{column}' is listed more than once in '{field}'")]
    DuplicateColumn { field: String, column: String },

    #[error("Invalid timestamp format '{0}'")]
    InvalidTimestampFormat(String),

    #[error("Constant fill value must be finite, got {0}")]
    NonFiniteFill(f64),

    #[error("Option '{0}' was set but its stage is not enabled")]
    OrphanOption(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },
}

impl From<ConfigValidationError> for PrepError {
    fn from(e: ConfigValidationError) -> Self {
        PrepError::Configuration(e.to_string())
    }
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    targets: Vec<ColumnTarget>,
    on_failure: Option<CoercionFailurePolicy>,
    timestamp_format: Option<TimestampFormat>,
    missing_strategy: Option<MissingStrategy>,
    missing_columns: Option<ColumnSelector>,
    outlier_columns: Option<ColumnSelector>,
    outlier_multiplier: Option<f64>,
    normalization: Option<NormalizationConfig>,
    text_columns: Option<ColumnSelector>,
    text_lowercase: Option<bool>,
    text_collapse_whitespace: Option<bool>,
    text_removal: Option<CharacterRemoval>,
    dedup_columns: Option<ColumnSelector>,
    dedup_keep: Option<KeepPolicy>,
}

impl CleaningConfigBuilder {
    /// Convert a column to a target type during the coercion stage.
    pub fn coerce(mut self, column: impl Into<String>, target: TargetType) -> Self {
        self.targets.push(ColumnTarget {
            column: column.into(),
            target,
        });
        self
    }

    /// Set how unparsable cells are handled.
    pub fn coercion_failure_policy(mut self, policy: CoercionFailurePolicy) -> Self {
        self.on_failure = Some(policy);
        self
    }

    /// Set how timestamp strings are parsed.
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = Some(format);
        self
    }

    /// Enable missing-value resolution with the given strategy.
    pub fn missing_strategy(mut self, strategy: MissingStrategy) -> Self {
        self.missing_strategy = Some(strategy);
        self
    }

    /// Restrict missing-value resolution to the given columns.
    pub fn missing_columns(mut self, columns: ColumnSelector) -> Self {
        self.missing_columns = Some(columns);
        self
    }

    /// Enable IQR outlier removal on the given columns.
    pub fn remove_outliers(mut self, columns: ColumnSelector) -> Self {
        self.outlier_columns = Some(columns);
        self
    }

    /// Set the IQR multiplier `k` (default 1.5).
    pub fn outlier_multiplier(mut self, k: f64) -> Self {
        self.outlier_multiplier = Some(k);
        self
    }

    /// Enable normalization of the given columns.
    pub fn normalize(mut self, method: NormalizationMethod, columns: ColumnSelector) -> Self {
        self.normalization = Some(NormalizationConfig { method, columns });
        self
    }

    /// Enable text normalization on the given columns.
    pub fn normalize_text(mut self, columns: ColumnSelector) -> Self {
        self.text_columns = Some(columns);
        self
    }

    /// Enable or disable lowercase folding (default on).
    pub fn text_lowercase(mut self, enable: bool) -> Self {
        self.text_lowercase = Some(enable);
        self
    }

    /// Enable or disable whitespace collapsing and trimming (default on).
    pub fn text_collapse_whitespace(mut self, enable: bool) -> Self {
        self.text_collapse_whitespace = Some(enable);
        self
    }

    /// Set which characters the text normalizer removes.
    pub fn text_removal(mut self, removal: CharacterRemoval) -> Self {
        self.text_removal = Some(removal);
        self
    }

    /// Enable deduplication keyed on the given columns.
    pub fn deduplicate(mut self, columns: ColumnSelector) -> Self {
        self.dedup_columns = Some(columns);
        self
    }

    /// Set which duplicate survives (default first).
    pub fn dedup_keep(mut self, keep: KeepPolicy) -> Self {
        self.dedup_keep = Some(keep);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleaningConfig`, or an error if a section is
    /// invalid or an option was given for a stage that is not enabled.
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let orphan = |set: bool, enabled: bool, name: &str| {
            if set && !enabled {
                Err(ConfigValidationError::OrphanOption(name.to_string()))
            } else {
                Ok(())
            }
        };
        let coercion_enabled = !self.targets.is_empty();
        orphan(self.on_failure.is_some(), coercion_enabled, "coercion_failure_policy")?;
        orphan(self.timestamp_format.is_some(), coercion_enabled, "timestamp_format")?;
        orphan(
            self.missing_columns.is_some(),
            self.missing_strategy.is_some(),
            "missing_columns",
        )?;
        orphan(
            self.outlier_multiplier.is_some(),
            self.outlier_columns.is_some(),
            "outlier_multiplier",
        )?;
        let text_enabled = self.text_columns.is_some();
        orphan(self.text_lowercase.is_some(), text_enabled, "text_lowercase")?;
        orphan(
            self.text_collapse_whitespace.is_some(),
            text_enabled,
            "text_collapse_whitespace",
        )?;
        orphan(self.text_removal.is_some(), text_enabled, "text_removal")?;
        orphan(self.dedup_keep.is_some(), self.dedup_columns.is_some(), "dedup_keep")?;

        let config = CleaningConfig {
            coercion: coercion_enabled.then(|| CoercionConfig {
                targets: self.targets,
                on_failure: self.on_failure.unwrap_or_default(),
                timestamp_format: self.timestamp_format.unwrap_or_default(),
            }),
            missing: self.missing_strategy.map(|strategy| MissingConfig {
                strategy,
                columns: self.missing_columns.unwrap_or_default(),
            }),
            outliers: self.outlier_columns.map(|columns| OutlierConfig {
                columns,
                multiplier: self.outlier_multiplier.unwrap_or(DEFAULT_IQR_MULTIPLIER),
            }),
            normalization: self.normalization,
            text: self.text_columns.map(|columns| TextCleaningConfig {
                columns,
                lowercase: self.text_lowercase.unwrap_or(true),
                collapse_whitespace: self.text_collapse_whitespace.unwrap_or(true),
                removal: self.text_removal.unwrap_or_default(),
            }),
            dedup: self.dedup_columns.map(|columns| DedupConfig {
                columns,
                keep: self.dedup_keep.unwrap_or_default(),
            }),
        };

        config.validate()?;
        Ok(config)
    }
}
