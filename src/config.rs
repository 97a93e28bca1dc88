// User preferences for grouping, binning, reference lookups and series
//
// Read from a TOML file; every field is optional and falls back to its default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::grouping::GroupingKey;
use crate::series::SeriesOptions;
use crate::subgrouping::SubgroupingPolicy;

/// Preferences shared by the pipeline nodes and the command line
///
/// # Example
/// ```
/// use argroup::config::Preferences;
///
/// let prefs = Preferences::default();
/// assert_eq!(prefs.bin_tolerance_hours, 1.0);
/// assert!(prefs.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Hours searched on either side of each unknown when looking up references
    pub reference_hours_padding: f64,

    /// Largest gap (hours) between consecutive runs of one time bin
    pub bin_tolerance_hours: f64,

    /// Key used by the grouping and graph grouping nodes
    pub grouping_key: GroupingKey,

    /// Key used by the subgrouping node; `SubGroup` is not allowed
    pub subgrouping_key: GroupingKey,

    /// Aggregation kinds applied when subgrouping
    pub subgrouping: SubgroupingPolicy,

    pub series: SeriesOptions,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            reference_hours_padding: 1.0,
            bin_tolerance_hours: 1.0,
            grouping_key: GroupingKey::Identifier,
            subgrouping_key: GroupingKey::Aliquot,
            subgrouping: SubgroupingPolicy::default(),
            series: SeriesOptions::default(),
        }
    }
}

impl Preferences {
    /// Load preferences from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read preferences file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate preferences
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let prefs: Preferences =
            toml::from_str(content).context("Failed to parse TOML preferences")?;
        prefs.validate().map_err(anyhow::Error::msg)?;
        Ok(prefs)
    }

    /// Validate preferences
    pub fn validate(&self) -> Result<(), String> {
        for (name, hours) in [
            ("reference_hours_padding", self.reference_hours_padding),
            ("bin_tolerance_hours", self.bin_tolerance_hours),
        ] {
            if !hours.is_finite() || hours < 0.0 {
                return Err(format!(
                    "{} must be a finite, non-negative number of hours, got {}",
                    name, hours
                ));
            }
        }

        if self.subgrouping_key == GroupingKey::SubGroup {
            return Err("subgrouping_key cannot be SubGroup".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Deviation;
    use crate::statistics::AggregationKind;
    use std::io::Write;

    #[test]
    fn test_default_preferences() {
        let prefs = Preferences::default();
        assert_eq!(prefs.reference_hours_padding, 1.0);
        assert_eq!(prefs.grouping_key, GroupingKey::Identifier);
        assert_eq!(prefs.subgrouping_key, GroupingKey::Aliquot);
        assert!(prefs.series.use_time_axis);
        assert!(prefs.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let prefs = Preferences::from_toml_str(
            r#"
bin_tolerance_hours = 6.0
grouping_key = "Aliquot"

[subgrouping]
age_kind = "Mean"

[series]
deviation = "percent"
"#,
        )
        .unwrap();
        assert_eq!(prefs.bin_tolerance_hours, 6.0);
        assert_eq!(prefs.reference_hours_padding, 1.0);
        assert_eq!(prefs.grouping_key, GroupingKey::Aliquot);
        assert_eq!(prefs.subgrouping.age_kind, AggregationKind::Mean);
        assert_eq!(prefs.series.deviation, Deviation::Percent);
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_durations() {
        let mut prefs = Preferences::default();
        prefs.bin_tolerance_hours = -1.0;
        assert!(prefs.validate().is_err());

        let mut prefs = Preferences::default();
        prefs.reference_hours_padding = f64::NAN;
        assert!(prefs.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_subgroup_key_rejected() {
        let mut prefs = Preferences::default();
        prefs.subgrouping_key = GroupingKey::SubGroup;
        assert!(prefs.validate().unwrap_err().contains("subgrouping_key"));
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let err = Preferences::from_toml_str(r#"grouping_key = "Sample""#).unwrap_err();
        assert!(format!("{err:#}").contains("Sample"));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reference_hours_padding = 4.5").unwrap();
        let prefs = Preferences::from_toml(file.path()).unwrap();
        assert_eq!(prefs.reference_hours_padding, 4.5);

        assert!(Preferences::from_toml("/nonexistent/prefs.toml").is_err());
    }
}
