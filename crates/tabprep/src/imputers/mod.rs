//! Missing-value resolution.
//!
//! This module provides statistical strategies (mean, median, mode,
//! constant) and row dropping.

mod statistical;

pub use statistical::MissingValueResolver;
