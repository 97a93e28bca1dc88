use chrono::{DateTime, Utc};
use fnv::FnvHashSet;
use regex::Regex;

use super::StoreError;
use crate::analysis::AnalysisRecord;

/// Extract device names that mean "no device selected"
const PLACEHOLDER_DEVICES: [&str; 3] = ["Extract Device", "No Extract Device", "---"];

/// Analysis types measured without an extraction device
const DEVICELESS_TYPES: [&str; 4] = ["air", "cocktail", "blank_air", "blank_cocktail"];

/// Timestamp ordering of query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Lower-case an analysis type and replace spaces with underscores
pub fn normalize_analysis_type(value: &str) -> String {
    value.trim().to_lowercase().replace(' ', "_")
}

/// Filter set for catalog queries
///
/// Every filter is optional; set filters are combined with AND. Invalid
/// records are excluded unless [`AnalysisQuery::include_invalid`] is called.
///
/// ```
/// use argroup::store::{AnalysisQuery, Order};
///
/// let query = AnalysisQuery::new()
///     .analysis_types(["Blank Unknown", "air"])
///     .mass_spectrometers(["Jan"])
///     .order(Order::Descending)
///     .limit(10);
/// assert_eq!(query.limit_value(), Some(10));
/// ```
#[derive(Debug, Clone)]
pub struct AnalysisQuery {
    low: Option<DateTime<Utc>>,
    high: Option<DateTime<Utc>>,
    identifiers: Vec<String>,
    identifier_pattern: Option<Regex>,
    analysis_types: Vec<String>,
    mass_spectrometers: Vec<String>,
    extract_devices: Vec<String>,
    projects: Vec<String>,
    load_names: Vec<String>,
    exclude_ids: FnvHashSet<u64>,
    exclude_uuids: FnvHashSet<String>,
    exclude_invalid: bool,
    order: Order,
    limit: Option<usize>,
}

impl Default for AnalysisQuery {
    fn default() -> Self {
        Self {
            low: None,
            high: None,
            identifiers: Vec::new(),
            identifier_pattern: None,
            analysis_types: Vec::new(),
            mass_spectrometers: Vec::new(),
            extract_devices: Vec::new(),
            projects: Vec::new(),
            load_names: Vec::new(),
            exclude_ids: FnvHashSet::default(),
            exclude_uuids: FnvHashSet::default(),
            exclude_invalid: true,
            order: Order::Ascending,
            limit: None,
        }
    }
}

fn owned<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values.into_iter().map(|s| s.as_ref().to_string()).collect()
}

impl AnalysisQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive timestamp range
    pub fn date_range(mut self, low: DateTime<Utc>, high: DateTime<Utc>) -> Self {
        self.low = Some(low);
        self.high = Some(high);
        self
    }

    pub fn since(mut self, low: DateTime<Utc>) -> Self {
        self.low = Some(low);
        self
    }

    pub fn identifier(mut self, identifier: &str) -> Self {
        self.identifiers = vec![identifier.to_string()];
        self
    }

    pub fn identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.identifiers = owned(identifiers);
        self
    }

    /// Match identifiers against a regular expression
    pub fn identifier_pattern(mut self, pattern: &str) -> Result<Self, StoreError> {
        self.identifier_pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Requested analysis types; `blank` matches every `blank_*` type
    pub fn analysis_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.analysis_types = types
            .into_iter()
            .map(|t| normalize_analysis_type(t.as_ref()))
            .collect();
        self
    }

    pub fn mass_spectrometers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mass_spectrometers = owned(names).iter().map(|s| s.to_lowercase()).collect();
        self
    }

    /// Extract device filter; placeholder names are dropped
    pub fn extract_devices<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extract_devices = owned(names)
            .into_iter()
            .filter(|name| !PLACEHOLDER_DEVICES.contains(&name.as_str()))
            .map(|name| name.to_lowercase())
            .collect();
        self
    }

    pub fn projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.projects = owned(projects);
        self
    }

    pub fn load_names<I, S>(mut self, loads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.load_names = owned(loads);
        self
    }

    pub fn exclude_ids<I: IntoIterator<Item = u64>>(mut self, ids: I) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    pub fn exclude_uuids<I, S>(mut self, uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_uuids.extend(owned(uuids));
        self
    }

    /// Also return records tagged `invalid`
    pub fn include_invalid(mut self) -> Self {
        self.exclude_invalid = false;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_value(&self) -> Order {
        self.order
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    fn matches_analysis_type(&self, record: &AnalysisRecord) -> bool {
        if self.analysis_types.is_empty() {
            return true;
        }
        let kind = normalize_analysis_type(&record.analysis_type);
        self.analysis_types
            .iter()
            .any(|t| *t == kind || (t == "blank" && kind.starts_with("blank")))
    }

    fn matches_extract_device(&self, record: &AnalysisRecord) -> bool {
        if self.extract_devices.is_empty() {
            return true;
        }
        let deviceless = self
            .analysis_types
            .iter()
            .any(|t| DEVICELESS_TYPES.contains(&t.as_str()));
        deviceless
            || self
                .extract_devices
                .contains(&record.extract_device.to_lowercase())
    }

    /// True when `record` passes every filter
    pub fn matches(&self, record: &AnalysisRecord) -> bool {
        if self.low.is_some_and(|low| record.timestamp < low)
            || self.high.is_some_and(|high| record.timestamp > high)
        {
            return false;
        }
        if !self.identifiers.is_empty() && !self.identifiers.contains(&record.identifier) {
            return false;
        }
        if let Some(pattern) = &self.identifier_pattern {
            if !pattern.is_match(&record.identifier) {
                return false;
            }
        }
        if !self.mass_spectrometers.is_empty()
            && !self
                .mass_spectrometers
                .contains(&record.mass_spectrometer.to_lowercase())
        {
            return false;
        }
        if !self.projects.is_empty()
            && !record
                .project
                .as_ref()
                .is_some_and(|p| self.projects.contains(p))
        {
            return false;
        }
        if !self.load_names.is_empty()
            && !record
                .load_name
                .as_ref()
                .is_some_and(|l| self.load_names.contains(l))
        {
            return false;
        }
        if self.exclude_ids.contains(&record.id) || self.exclude_uuids.contains(&record.uuid) {
            return false;
        }
        if self.exclude_invalid && record.is_invalid() {
            return false;
        }
        self.matches_analysis_type(record) && self.matches_extract_device(record)
    }
}
