//! Per-group plot series
//!
//! Turns grouped analyses into x/y/error arrays ready for a plotting surface:
//! one [`GroupSeries`] per graph group, ordered by run time.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::analysis::{AnalysisRecord, Measurement};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Analysis types in axis order; other types plot as -1
pub const ANALYSIS_TYPES: [&str; 9] = [
    "unknown",
    "blank_unknown",
    "blank_air",
    "blank_cocktail",
    "air",
    "cocktail",
    "detector_ic",
    "background",
    "blank_extractionline",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Unknown series attribute '{0}'")]
    UnknownAttribute(String),
}

const RATIO_PATTERN: &str = r"^([A-Za-z]+\d+)/([A-Za-z]+\d+)$";
const ISOTOPE_PATTERN: &str = r"^[A-Za-z]+\d+$";

/// Quantity plotted on the y axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SeriesAttribute {
    Age,
    Rad40Percent,
    Kca,
    Kcl,
    MolesK39,
    /// Intensity of one isotope, e.g. `Ar40`
    Isotope(String),
    /// Isotope ratio, e.g. `Ar40/Ar39`
    Ratio {
        numerator: String,
        denominator: String,
    },
    AnalysisType,
}

impl SeriesAttribute {
    pub fn label(&self) -> String {
        match self {
            SeriesAttribute::Age => "Age".to_string(),
            SeriesAttribute::Rad40Percent => "RadiogenicYield".to_string(),
            SeriesAttribute::Kca => "K/Ca".to_string(),
            SeriesAttribute::Kcl => "K/Cl".to_string(),
            SeriesAttribute::MolesK39 => "Moles K39".to_string(),
            SeriesAttribute::Isotope(name) => name.clone(),
            SeriesAttribute::Ratio {
                numerator,
                denominator,
            } => format!("{numerator}/{denominator}"),
            SeriesAttribute::AnalysisType => "Analysis Type".to_string(),
        }
    }

    fn measurement(&self, record: &AnalysisRecord) -> Option<Measurement> {
        match self {
            SeriesAttribute::Age => record.age,
            SeriesAttribute::Rad40Percent => record.rad40_percent,
            SeriesAttribute::Kca => record.kca,
            SeriesAttribute::Kcl => record.kcl,
            SeriesAttribute::MolesK39 => record.moles_k39,
            SeriesAttribute::Isotope(name) => record.isotope(name),
            SeriesAttribute::Ratio {
                numerator,
                denominator,
            } => {
                let n = record.isotope(numerator)?;
                let d = record.isotope(denominator)?;
                Some(ratio(n, d))
            }
            SeriesAttribute::AnalysisType => Some(Measurement::new(
                analysis_type_index(&record.analysis_type) as f64,
                0.0,
            )),
        }
    }
}

/// `n / d` with uncorrelated relative errors added in quadrature
pub fn ratio(n: Measurement, d: Measurement) -> Measurement {
    if d.value == 0.0 {
        return Measurement::new(f64::NAN, f64::NAN);
    }
    let value = n.value / d.value;
    let rel = |m: Measurement| if m.value == 0.0 { 0.0 } else { m.error / m.value };
    let error = value.abs() * (rel(n).powi(2) + rel(d).powi(2)).sqrt();
    Measurement::new(value, error)
}

/// Axis position of an analysis type, -1 for unlisted types
pub fn analysis_type_index(kind: &str) -> i32 {
    let kind = crate::store::normalize_analysis_type(kind);
    ANALYSIS_TYPES
        .iter()
        .position(|t| *t == kind)
        .map_or(-1, |i| i as i32)
}

impl fmt::Display for SeriesAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for SeriesAttribute {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let key: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "age" => return Ok(SeriesAttribute::Age),
            "radiogenicyield" | "rad40percent" | "%40ar*" => {
                return Ok(SeriesAttribute::Rad40Percent)
            }
            "k/ca" | "kca" => return Ok(SeriesAttribute::Kca),
            "k/cl" | "kcl" => return Ok(SeriesAttribute::Kcl),
            "molesk39" | "mol39k" => return Ok(SeriesAttribute::MolesK39),
            "analysistype" => return Ok(SeriesAttribute::AnalysisType),
            _ => {}
        }

        let ratio = Regex::new(RATIO_PATTERN).ok();
        if let Some(caps) = ratio.as_ref().and_then(|re| re.captures(trimmed)) {
            return Ok(SeriesAttribute::Ratio {
                numerator: caps[1].to_string(),
                denominator: caps[2].to_string(),
            });
        }
        if Regex::new(ISOTOPE_PATTERN).is_ok_and(|re| re.is_match(trimmed)) {
            return Ok(SeriesAttribute::Isotope(trimmed.to_string()));
        }
        Err(SeriesError::UnknownAttribute(s.to_string()))
    }
}

impl TryFrom<String> for SeriesAttribute {
    type Error = SeriesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeriesAttribute> for String {
    fn from(attr: SeriesAttribute) -> Self {
        attr.label()
    }
}

/// Reference time for the x axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeZero {
    /// Hours before the last analysis of the group
    #[default]
    LastAnalysis,
    /// Hours before the current time
    Now,
}

/// How y values are expressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deviation {
    #[default]
    None,
    /// Difference from the group mean
    Absolute,
    /// Difference from the group mean as a percentage of it
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesOptions {
    /// Plot against run time (hours) instead of analysis index
    pub use_time_axis: bool,
    pub normalize: TimeZero,
    pub deviation: Deviation,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            use_time_axis: true,
            normalize: TimeZero::default(),
            deviation: Deviation::default(),
        }
    }
}

/// Plot-ready arrays for one graph group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSeries {
    pub graph_id: usize,
    pub title: String,
    pub runids: Vec<String>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    /// `None` for categorical attributes
    pub yerr: Option<Vec<f64>>,
    /// `min(y - 2σ)..max(y + 2σ)` over finite points
    pub y_limits: Option<(f64, f64)>,
}

fn finite_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        None
    } else {
        Some(finite.iter().sum::<f64>() / finite.len() as f64)
    }
}

fn y_limits(ys: &[f64], yerr: &[f64]) -> Option<(f64, f64)> {
    let mut limits: Option<(f64, f64)> = None;
    for (y, e) in ys.iter().zip(yerr) {
        let e = if e.is_finite() { *e } else { 0.0 };
        if !y.is_finite() {
            continue;
        }
        let (lo, hi) = (y - 2.0 * e, y + 2.0 * e);
        limits = Some(match limits {
            Some((min, max)) => (min.min(lo), max.max(hi)),
            None => (lo, hi),
        });
    }
    limits
}

/// Build one series per graph group, in group id order
///
/// Members of each group are ordered by run time. Missing values plot as NaN.
pub fn build_series(
    records: &[AnalysisRecord],
    attr: &SeriesAttribute,
    options: &SeriesOptions,
    now: DateTime<Utc>,
) -> Result<Vec<GroupSeries>, SeriesError> {
    let mut groups: BTreeMap<usize, Vec<&AnalysisRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.graph_id).or_default().push(record);
    }

    let mut series = Vec::with_capacity(groups.len());
    for (graph_id, mut members) in groups {
        members.sort_by_key(|r| r.timestamp);

        let xs: Vec<f64> = if options.use_time_axis {
            let tzero = match options.normalize {
                TimeZero::Now => now,
                TimeZero::LastAnalysis => members.last().map_or(now, |r| r.timestamp),
            };
            members
                .iter()
                .map(|r| (r.timestamp - tzero).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_HOUR)
                .collect()
        } else {
            (0..members.len()).map(|i| i as f64).collect()
        };

        let values: Vec<Measurement> = members
            .iter()
            .map(|r| {
                attr.measurement(r)
                    .unwrap_or(Measurement::new(f64::NAN, f64::NAN))
            })
            .collect();
        let mut ys: Vec<f64> = values.iter().map(|m| m.value).collect();
        let mut yerr: Vec<f64> = values.iter().map(|m| m.error).collect();

        let mut title = attr.label();
        let (yerr, limits) = if *attr == SeriesAttribute::AnalysisType {
            (None, Some((-0.5, ANALYSIS_TYPES.len() as f64 - 0.5)))
        } else {
            if options.deviation != Deviation::None {
                if let Some(mean) = finite_mean(&ys) {
                    for y in ys.iter_mut() {
                        *y -= mean;
                    }
                    if options.deviation == Deviation::Percent && mean == 0.0 {
                        // undefined for this group only; the others still plot
                        tracing::warn!(
                            "percent deviation undefined for graph group {}: mean is zero",
                            graph_id
                        );
                        ys.fill(f64::NAN);
                        yerr.fill(f64::NAN);
                    } else if options.deviation == Deviation::Percent {
                        for y in ys.iter_mut() {
                            *y = *y / mean * 100.0;
                        }
                        for e in yerr.iter_mut() {
                            *e = *e / mean.abs() * 100.0;
                        }
                    }
                }
                title = match options.deviation {
                    Deviation::Percent => format!("{title} Dev %"),
                    _ => format!("{title} Dev"),
                };
            }
            let limits = y_limits(&ys, &yerr);
            (Some(yerr), limits)
        };

        series.push(GroupSeries {
            graph_id,
            title,
            runids: members.iter().map(|r| r.runid()).collect(),
            xs,
            ys,
            yerr,
            y_limits: limits,
        });
    }

    tracing::debug!("built {} series for {}", series.len(), attr);
    Ok(series)
}
