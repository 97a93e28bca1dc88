// Grouping pipelines loaded from TOML templates
//
// A template is an ordered list of nodes. Running it applies each node in turn
// to the unknowns held by a PipelineState; a template can be written back to
// TOML unchanged.

mod node;

pub use node::{Node, NodeError, NodeOutcome};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::AnalysisRecord;
use crate::binning::BinNode;
use crate::config::Preferences;
use crate::grouping::GroupingNode;
use crate::subgrouping::SubGroupingNode;

/// Ordered list of pipeline nodes
///
/// # Example TOML
/// ```toml
/// name = "aliquot summary"
///
/// [[node]]
/// kind = "grouping"
/// key = "Identifier"
///
/// [[node]]
/// kind = "subgrouping"
/// key = "Aliquot"
/// age_kind = "Weighted Mean"
/// age_error_kind = "MSEM"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, rename = "node")]
    pub nodes: Vec<Node>,
}

/// Analyses flowing through a pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    pub unknowns: Vec<AnalysisRecord>,
}

impl PipelineState {
    pub fn new(unknowns: Vec<AnalysisRecord>) -> Self {
        Self { unknowns }
    }
}

/// Outcome of one executed node
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub name: &'static str,
    pub outcome: NodeOutcome,
}

impl PipelineTemplate {
    /// Load a pipeline template from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read pipeline file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid pipeline: {}", path.as_ref().display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML pipeline")
    }

    /// Embedded template grouping by identifier and subgrouping by aliquot
    pub fn default_template() -> Result<Self> {
        const DEFAULT_TOML: &str = include_str!("../../pipeline-default.toml");
        Self::from_toml_str(DEFAULT_TOML).context("Failed to parse embedded pipeline-default.toml")
    }

    /// Template shaped like the default one, built from the keys in `prefs`
    ///
    /// Groups and graph-groups by `grouping_key`, then subgroups by
    /// `subgrouping_key` with the `subgrouping` policy. Time binning also
    /// writes `group_id`, so `bin_tolerance_hours` belongs to [`Self::binning`].
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            name: None,
            nodes: vec![
                Node::Grouping(GroupingNode::grouping(prefs.grouping_key)),
                Node::GraphGrouping(GroupingNode::graph_grouping(prefs.grouping_key)),
                Node::Subgrouping(SubGroupingNode::new(
                    prefs.subgrouping_key,
                    prefs.subgrouping.clone(),
                )),
            ],
        }
    }

    /// Template with a single time-binning node
    pub fn binning(tolerance_hours: f64) -> Self {
        Self {
            name: None,
            nodes: vec![Node::Bin(BinNode::new(tolerance_hours))],
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize pipeline to TOML")
    }

    /// Apply every node to `state.unknowns`, in order
    ///
    /// Stops at the first failing node.
    pub fn run(&self, state: &mut PipelineState) -> Result<Vec<StepReport>> {
        let mut steps = Vec::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            let outcome = node
                .run(&mut state.unknowns)
                .with_context(|| format!("Pipeline node {} ({}) failed", index, node.name()))?;
            tracing::debug!("ran node {} ({})", index, node.name());
            steps.push(StepReport {
                name: node.name(),
                outcome,
            });
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests;
