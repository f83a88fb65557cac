//! Column-level cleaning stages.
//!
//! This module provides:
//! - Explicit type coercion with per-row failure reporting
//! - Text normalization for text and categorical columns
//! - Exact-duplicate row removal

mod coercion;
mod converters;
mod dedup;
mod text;

pub use coercion::{ColumnCoercion, CoercionReport, TypeCoercer};
pub use dedup::Deduplicator;
pub use text::TextNormalizer;
