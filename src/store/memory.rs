use std::path::Path;

use super::{AnalysisQuery, AnalysisSource, Order, StoreError};
use crate::analysis::AnalysisRecord;

/// Catalog backed by an in-memory record list
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<AnalysisRecord>,
}

impl MemoryStore {
    pub fn new(records: Vec<AnalysisRecord>) -> Self {
        Self { records }
    }

    /// Load a JSON array of analysis records
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| StoreError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, StoreError> {
        let records: Vec<AnalysisRecord> = serde_json::from_str(content)?;
        tracing::debug!("Loaded {} analyses into memory store", records.len());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }

    pub fn push(&mut self, record: AnalysisRecord) {
        self.records.push(record);
    }
}

impl AnalysisSource for MemoryStore {
    fn analyses(&self, query: &AnalysisQuery) -> Result<Vec<AnalysisRecord>, StoreError> {
        let mut found: Vec<AnalysisRecord> = self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        match query.order_value() {
            Order::Ascending => found.sort_by_key(|r| r.timestamp),
            Order::Descending => found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }
        if let Some(limit) = query.limit_value() {
            found.truncate(limit);
        }
        Ok(found)
    }
}
