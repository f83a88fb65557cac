//! Text normalization for text and categorical columns.

use crate::config::{CharacterRemoval, TextCleaningConfig};
use crate::dataset::Dataset;
use crate::error::{PrepError, Result};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

// Whitespace run regex - compiled once at startup
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex: whitespace run"));

/// Lowercases, collapses whitespace and strips characters from string cells.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    config: TextCleaningConfig,
}

impl TextNormalizer {
    pub fn new(config: TextCleaningConfig) -> Self {
        Self { config }
    }

    /// Normalize every selected text or categorical column.
    ///
    /// Applying the normalizer to its own output changes nothing.
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        self.config.validate()?;

        let columns = self
            .config
            .columns
            .resolve(dataset, |_, ty| ty.is_textual())?;

        let mut out = dataset.clone();
        for name in &columns {
            let semantic = dataset.semantic_type(name)?;
            if !semantic.is_textual() {
                return Err(PrepError::Configuration(format!(
                    "text normalization needs a text or categorical column, '{}' is {}",
                    name, semantic
                )));
            }

            let original = dataset.text_values(name)?;
            let values: Vec<Option<String>> = original
                .iter()
                .map(|v| v.as_deref().map(|s| self.normalize(s)))
                .collect();

            let changed = original
                .iter()
                .zip(&values)
                .filter(|(before, after)| before != after)
                .count();
            debug!("Normalized text in '{}' ({} cells changed)", name, changed);

            out = out.with_column(Series::new(name.as_str().into(), values), semantic)?;
        }

        Ok(out)
    }

    /// Normalize a single string.
    pub fn normalize(&self, value: &str) -> String {
        let mut s = if self.config.lowercase {
            value.to_lowercase()
        } else {
            value.to_string()
        };

        if self.config.collapse_whitespace {
            s = collapse(&s);
        }

        let removed = match &self.config.removal {
            CharacterRemoval::Keep => return s,
            CharacterRemoval::NonAlphanumeric => s
                .chars()
                .filter(|c| c.is_alphanumeric() || c.is_whitespace())
                .collect::<String>(),
            CharacterRemoval::Only(chars) => {
                s.chars().filter(|c| !chars.contains(c)).collect::<String>()
            }
        };

        // Removal can leave doubled or trailing spaces behind
        if self.config.collapse_whitespace {
            collapse(&removed)
        } else {
            removed
        }
    }
}

fn collapse(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s.trim(), " ").into_owned()
}
