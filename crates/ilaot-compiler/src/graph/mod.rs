//! Fixed-point dependency analysis.
//!
//! The engine is independent of what the nodes mean. A [`DependencyContext`]
//! answers questions about nodes; the [`DependencyAnalyzer`] owns the mark
//! state and decides when each question is asked.

mod analyzer;

#[cfg(test)]
mod analyzer_tests;

pub use analyzer::{DependencyAnalyzer, DependencyContext, MarkReason};
