//! Analysis catalog access
//!
//! [`AnalysisSource`] is the seam between the grouping pipeline and wherever
//! analyses live. [`MemoryStore`] serves a loaded record list; reference
//! lookups in [`references`] work against any source.

mod memory;
mod query;
pub mod references;

pub use memory::MemoryStore;
pub use query::{normalize_analysis_type, AnalysisQuery, Order};
pub use references::{
    analysis_date_ranges, find_references, last_n_analyses, last_nhours_analyses,
    min_max_timestamp,
};

use std::path::PathBuf;
use thiserror::Error;

use crate::analysis::AnalysisRecord;

/// Errors raised by catalog access
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid identifier pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Hours must be a finite, non-negative number, got {0}")]
    InvalidHours(f64),
}

/// Anything analyses can be queried from
pub trait AnalysisSource {
    /// Records matching every filter of `query`, ordered and limited as requested
    fn analyses(&self, query: &AnalysisQuery) -> Result<Vec<AnalysisRecord>, StoreError>;
}

#[cfg(test)]
mod tests;
