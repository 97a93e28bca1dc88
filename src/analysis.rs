//! Analysis records
//!
//! One record per mass-spectrometer run: identity (identifier, aliquot, step),
//! run metadata, isotopic intensities, derived values used for subgroup
//! summaries, and the group identifiers written by the grouping passes.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::subgrouping::SubgroupTag;

/// Errors raised while building analysis records from external input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid timestamp '{value}': expected RFC 3339, 'YYYY-MM-DD HH:MM:SS' or 'MM-DD-YYYY HH:MM'")]
    InvalidTimestamp { value: String },
}

/// A value with its 1σ uncertainty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    #[serde(default)]
    pub error: f64,
}

impl Measurement {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    /// True when the error can be used as a weight (finite and strictly positive)
    pub fn has_usable_error(&self) -> bool {
        self.error.is_finite() && self.error > 0.0
    }
}

/// Derived per-analysis quantities that subgrouping can summarize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgroupAttr {
    Age,
    Kca,
    Kcl,
    Rad40Percent,
    MolesK39,
}

impl SubgroupAttr {
    pub const ALL: [SubgroupAttr; 5] = [
        SubgroupAttr::Age,
        SubgroupAttr::Kca,
        SubgroupAttr::Kcl,
        SubgroupAttr::Rad40Percent,
        SubgroupAttr::MolesK39,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SubgroupAttr::Age => "Age",
            SubgroupAttr::Kca => "K/Ca",
            SubgroupAttr::Kcl => "K/Cl",
            SubgroupAttr::Rad40Percent => "%40Ar*",
            SubgroupAttr::MolesK39 => "mol 39K",
        }
    }
}

/// A single analysis (one measurement run)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Catalog row id
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub uuid: String,
    /// Lab identifier (labnumber) of the irradiation position
    pub identifier: String,
    pub aliquot: u32,
    /// Step index for step-heating runs; `None` for single-step analyses
    #[serde(default)]
    pub increment: Option<u32>,
    /// Run time; any format [`parse_timestamp`] accepts is read, RFC 3339 is written
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
    #[serde(default)]
    pub mass_spectrometer: String,
    #[serde(default)]
    pub extract_device: String,
    #[serde(default)]
    pub comment: String,
    /// Catalog tag; `"invalid"` excludes the record from default queries
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub load_name: Option<String>,
    #[serde(default)]
    pub project: Option<String>,

    /// Isotopic intensities keyed by isotope name (e.g. `Ar40`)
    #[serde(default)]
    pub isotopes: BTreeMap<String, Measurement>,

    #[serde(default)]
    pub age: Option<Measurement>,
    #[serde(default)]
    pub kca: Option<Measurement>,
    #[serde(default)]
    pub kcl: Option<Measurement>,
    #[serde(default)]
    pub rad40_percent: Option<Measurement>,
    #[serde(default)]
    pub moles_k39: Option<Measurement>,

    #[serde(default)]
    pub group_id: usize,
    #[serde(default)]
    pub graph_id: usize,
    #[serde(default)]
    pub subgroup: Option<SubgroupTag>,
}

fn default_analysis_type() -> String {
    "unknown".to_string()
}

impl AnalysisRecord {
    /// Minimal unknown analysis; remaining fields take their defaults
    pub fn new(identifier: &str, aliquot: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            uuid: String::new(),
            identifier: identifier.to_string(),
            aliquot,
            increment: None,
            timestamp,
            analysis_type: default_analysis_type(),
            mass_spectrometer: String::new(),
            extract_device: String::new(),
            comment: String::new(),
            tag: None,
            load_name: None,
            project: None,
            isotopes: BTreeMap::new(),
            age: None,
            kca: None,
            kcl: None,
            rad40_percent: None,
            moles_k39: None,
            group_id: 0,
            graph_id: 0,
            subgroup: None,
        }
    }

    /// Step letter (`A`, `B`, ..., `Z`, `AA`, ...), empty when the analysis has no increment
    pub fn step(&self) -> String {
        self.increment.map(alpha_step).unwrap_or_default()
    }

    /// Run id as displayed in tables, e.g. `66123-01A`
    pub fn runid(&self) -> String {
        format!("{}-{:02}{}", self.identifier, self.aliquot, self.step())
    }

    /// Seconds since the Unix epoch, with sub-second precision
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.timestamp_micros() as f64 / 1e6
    }

    pub fn is_invalid(&self) -> bool {
        self.tag.as_deref() == Some("invalid")
    }

    pub fn subgroup_value(&self, attr: SubgroupAttr) -> Option<Measurement> {
        match attr {
            SubgroupAttr::Age => self.age,
            SubgroupAttr::Kca => self.kca,
            SubgroupAttr::Kcl => self.kcl,
            SubgroupAttr::Rad40Percent => self.rad40_percent,
            SubgroupAttr::MolesK39 => self.moles_k39,
        }
    }

    pub fn isotope(&self, name: &str) -> Option<Measurement> {
        self.isotopes.get(name).copied()
    }
}

/// Convert a zero-based step index to its letter form
pub fn alpha_step(mut idx: u32) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (idx % 26) as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// Parse a run date as written by acquisition exports
///
/// Naive formats are interpreted as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, AnalysisError> {
    let trimmed = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m-%d-%Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(AnalysisError::InvalidTimestamp {
        value: value.to_string(),
    })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_timestamp(&value).map_err(serde::de::Error::custom)
}

/// Load a JSON array of analysis records
pub fn load_analyses<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Vec<AnalysisRecord>> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read analyses file: {}", path.as_ref().display()))?;
    let records: Vec<AnalysisRecord> = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse analyses JSON: {}",
            path.as_ref().display()
        )
    })?;
    Ok(records)
}
