//! JSON output format for grouped analyses
//!
//! `--format json`: one document holding every analysis with its group ids,
//! plus subgroup summaries, time bins and plot series when present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisRecord, Measurement};
use crate::binning::{BinSummary, TimeBin};
use crate::series::GroupSeries;
use crate::subgrouping::SubgroupSummary;

/// Value with its 1σ uncertainty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonValue {
    pub value: f64,
    pub error: f64,
}

impl From<Measurement> for JsonValue {
    fn from(m: Measurement) -> Self {
        Self {
            value: m.value,
            error: m.error,
        }
    }
}

/// A single analysis with its assigned ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonAnalysis {
    /// Run id, e.g. `66123-01A`
    pub runid: String,
    pub identifier: String,
    pub aliquot: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// RFC 3339 run time
    pub timestamp: String,
    pub analysis_type: String,
    pub group_id: usize,
    pub graph_id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<JsonValue>,
}

impl From<&AnalysisRecord> for JsonAnalysis {
    fn from(record: &AnalysisRecord) -> Self {
        let step = record.step();
        Self {
            runid: record.runid(),
            identifier: record.identifier.clone(),
            aliquot: record.aliquot,
            step: (!step.is_empty()).then_some(step),
            timestamp: record.timestamp.to_rfc3339(),
            analysis_type: record.analysis_type.clone(),
            group_id: record.group_id,
            graph_id: record.graph_id,
            subgroup: record.subgroup.as_ref().map(|tag| tag.id),
            age: record.age.map(JsonValue::from),
        }
    }
}

/// One aggregated attribute of a subgroup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonAggregate {
    pub attribute: String,
    pub kind: String,
    pub value: f64,
    pub error: f64,
    pub error_kind: String,
    pub n: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mswd: Option<f64>,
    /// Unweighted statistics were used instead of the requested kind
    pub fell_back: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSubgroup {
    pub id: usize,
    pub n: usize,
    pub values: Vec<JsonAggregate>,
}

impl From<&SubgroupSummary> for JsonSubgroup {
    fn from(summary: &SubgroupSummary) -> Self {
        Self {
            id: summary.id,
            n: summary.n,
            values: summary
                .values
                .iter()
                .map(|(attr, v)| JsonAggregate {
                    attribute: attr.label().to_string(),
                    kind: v.kind.label().to_string(),
                    value: v.value,
                    error: v.error,
                    error_kind: v.error_kind.label().to_string(),
                    n: v.n,
                    mswd: v.mswd,
                    fell_back: v.fell_back,
                })
                .collect(),
        }
    }
}

/// A time bin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonBin {
    pub id: usize,
    /// RFC 3339 time of the first run
    pub low: String,
    /// RFC 3339 time of the last run
    pub high: String,
    pub count: usize,
    pub span_hours: f64,
}

/// RFC 3339 form of epoch seconds
pub fn format_secs(secs: f64) -> String {
    DateTime::<Utc>::from_timestamp_micros((secs * 1e6).round() as i64)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

/// Summary counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSummary {
    pub total_analyses: usize,
    /// Distinct `group_id` values
    pub groups: usize,
    /// Distinct `graph_id` values
    pub graph_groups: usize,
    pub subgroups: usize,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub analyses: Vec<JsonAnalysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgroups: Vec<JsonSubgroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bins: Vec<JsonBin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_summary: Option<BinSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<GroupSeries>,
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a new JSON output structure
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "argroup-json-v1".to_string(),
            analyses: Vec::new(),
            subgroups: Vec::new(),
            bins: Vec::new(),
            bin_summary: None,
            series: Vec::new(),
            summary: JsonSummary::default(),
        }
    }

    /// Add an analysis to the output
    pub fn add_analysis(&mut self, record: &AnalysisRecord) {
        self.summary.total_analyses += 1;
        // ids are dense, so the count is the largest id + 1
        self.summary.groups = self.summary.groups.max(record.group_id + 1);
        self.summary.graph_groups = self.summary.graph_groups.max(record.graph_id + 1);
        self.analyses.push(JsonAnalysis::from(record));
    }

    pub fn add_analyses(&mut self, records: &[AnalysisRecord]) {
        for record in records {
            self.add_analysis(record);
        }
    }

    pub fn set_subgroups(&mut self, summaries: &[SubgroupSummary]) {
        self.summary.subgroups = summaries.len();
        self.subgroups = summaries.iter().map(JsonSubgroup::from).collect();
    }

    /// Set time bins and their summary statistics
    pub fn set_bins(&mut self, bins: &[TimeBin]) {
        self.bins = bins
            .iter()
            .enumerate()
            .map(|(id, bin)| JsonBin {
                id,
                low: format_secs(bin.low),
                high: format_secs(bin.high),
                count: bin.len,
                span_hours: bin.span_hours(),
            })
            .collect();
        self.bin_summary = Some(BinSummary::from_bins(bins));
    }

    pub fn set_series(&mut self, series: Vec<GroupSeries>) {
        self.series = series;
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}
