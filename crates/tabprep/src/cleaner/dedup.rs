//! Exact-duplicate row removal.

use crate::config::{DedupConfig, KeepPolicy};
use crate::dataset::{ColumnSelector, Dataset};
use crate::error::Result;
use polars::prelude::*;
use tracing::debug;

/// Removes rows whose key columns exactly match an earlier (or later) row.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    columns: ColumnSelector,
    keep: KeepPolicy,
}

impl Deduplicator {
    pub fn new(columns: ColumnSelector, keep: KeepPolicy) -> Self {
        Self { columns, keep }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.columns.clone(), config.keep)
    }

    /// Drop duplicated rows according to the keep policy.
    ///
    /// Numbers compare exactly (`0.0 == -0.0`, NaN equals NaN) and missing
    /// equals missing. Surviving rows keep their relative order.
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        self.columns.validate("dedup.columns")?;
        let keys = self.columns.resolve(dataset, |_, _| true)?;
        if keys.is_empty() || dataset.height() < 2 {
            return Ok(dataset.clone());
        }

        let strategy = match self.keep {
            KeepPolicy::First => UniqueKeepStrategy::First,
            KeepPolicy::Last => UniqueKeepStrategy::Last,
            KeepPolicy::None => UniqueKeepStrategy::None,
        };
        let frame = dataset.frame().unique_stable(Some(keys.as_slice()), strategy, None)?;
        let out = dataset.with_rows(frame)?;

        debug!(
            "Removed {} duplicate row(s) keyed on {} column(s)",
            dataset.height() - out.height(),
            keys.len()
        );
        Ok(out)
    }
}
