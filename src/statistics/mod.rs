//! Aggregation of per-analysis values into subgroup summaries
//!
//! Supports inverse-variance weighted means, arithmetic means and the mode of
//! a Gaussian kernel density, each reported with a selectable error type.
//! Degenerate input (missing or zero errors, zero spread) never fails: the
//! unweighted statistic is used instead and the result is flagged.

mod kde;
mod mean;

pub use kde::{density_at, kde_mode, GRID_POINTS};
pub use mean::{mswd, unweighted_moments, weighted_moments, Moments};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::analysis::Measurement;

/// Errors parsing aggregation settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatisticsError {
    #[error("Unknown aggregation kind '{0}' (expected Weighted Mean, Mean or Kernel Density)")]
    UnknownKind(String),

    #[error("Unknown error kind '{0}' (expected SD, SEM or MSEM)")]
    UnknownErrorKind(String),
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// How a subgroup's values are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggregationKind {
    #[default]
    WeightedMean,
    Mean,
    KernelDensity,
}

impl AggregationKind {
    pub fn label(&self) -> &'static str {
        match self {
            AggregationKind::WeightedMean => "Weighted Mean",
            AggregationKind::Mean => "Mean",
            AggregationKind::KernelDensity => "Kernel Density",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AggregationKind {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "weightedmean" | "wmean" => Ok(AggregationKind::WeightedMean),
            "mean" | "arithmeticmean" => Ok(AggregationKind::Mean),
            "kerneldensity" | "kde" => Ok(AggregationKind::KernelDensity),
            _ => Err(StatisticsError::UnknownKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for AggregationKind {
    type Error = StatisticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AggregationKind> for String {
    fn from(kind: AggregationKind) -> Self {
        kind.label().to_string()
    }
}

/// Which uncertainty is reported for an aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ErrorKind {
    /// Standard deviation
    Sd,
    /// Standard error of the mean
    Sem,
    /// SEM multiplied by √MSWD when MSWD > 1
    #[default]
    Msem,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Sd => "SD",
            ErrorKind::Sem => "SEM",
            ErrorKind::Msem => "MSEM",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ErrorKind {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "sd" | "standarddeviation" => Ok(ErrorKind::Sd),
            "sem" | "standarderrorofthemean" => Ok(ErrorKind::Sem),
            "msem" | "meansquareweightederror" => Ok(ErrorKind::Msem),
            _ => Err(StatisticsError::UnknownErrorKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for ErrorKind {
    type Error = StatisticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ErrorKind> for String {
    fn from(kind: ErrorKind) -> Self {
        kind.label().to_string()
    }
}

/// Aggregated value of one attribute over a subgroup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateValue {
    pub value: f64,
    pub error: f64,
    pub n: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mswd: Option<f64>,
    pub kind: AggregationKind,
    pub error_kind: ErrorKind,
    /// The requested statistic could not be computed and the unweighted
    /// mean was used
    pub fell_back: bool,
}

/// Combine `values` with `kind`, reporting the `error_kind` uncertainty
///
/// Non-finite values are ignored. Returns `None` when nothing is left.
pub fn aggregate(
    values: &[Measurement],
    kind: AggregationKind,
    error_kind: ErrorKind,
) -> Option<AggregateValue> {
    let values: Vec<Measurement> = values
        .iter()
        .copied()
        .filter(|m| m.value.is_finite())
        .collect();
    if values.is_empty() {
        return None;
    }

    let (value, moments, fell_back) = match kind {
        AggregationKind::WeightedMean => {
            let moments = weighted_moments(&values)?;
            let fell_back = !moments.weighted;
            (moments.mean, moments, fell_back)
        }
        AggregationKind::Mean => {
            let moments = unweighted_moments(&values)?;
            (moments.mean, moments, false)
        }
        AggregationKind::KernelDensity => {
            let moments = unweighted_moments(&values)?;
            match kde_mode(&values) {
                Some(mode) => (mode, moments, false),
                None => {
                    tracing::debug!(
                        "kernel density of {} values is degenerate; using mean",
                        values.len()
                    );
                    (moments.mean, moments, values.len() > 1)
                }
            }
        }
    };

    let error = if values.len() == 1 {
        values[0].error
    } else {
        match error_kind {
            ErrorKind::Sd => moments.sd,
            ErrorKind::Sem => moments.sem,
            ErrorKind::Msem => moments.msem(),
        }
    };

    Some(AggregateValue {
        value,
        error,
        n: values.len(),
        mswd: moments.mswd,
        kind,
        error_kind,
        fell_back,
    })
}

#[cfg(test)]
mod tests;
