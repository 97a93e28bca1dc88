use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisRecord;
use crate::binning::{BinNode, BinningError, TimeBin};
use crate::grouping::{GroupAssignment, GroupAttr, GroupingError, GroupingNode};
use crate::subgrouping::{SubGroupingNode, SubgroupSummary};

/// One step of a pipeline, tagged by `kind` in templates
///
/// ```toml
/// [[node]]
/// kind = "graph_grouping"
/// key = "Aliquot"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Grouping(GroupingNode),
    GraphGrouping(GroupingNode),
    Subgrouping(SubGroupingNode),
    Bin(BinNode),
}

/// What a node did to the analyses
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// `None` when the key was `No Grouping`
    Grouped(Option<GroupAssignment>),
    Subgrouped(Vec<SubgroupSummary>),
    Binned(Vec<TimeBin>),
}

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Binning(#[from] BinningError),
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Grouping(_) => "Grouping",
            Node::GraphGrouping(_) => "Graphing Group",
            Node::Subgrouping(node) => node.name(),
            Node::Bin(_) => "Bin",
        }
    }

    pub fn run(&self, records: &mut [AnalysisRecord]) -> Result<NodeOutcome, NodeError> {
        Ok(match self {
            Node::Grouping(node) => NodeOutcome::Grouped(
                GroupingNode {
                    target: GroupAttr::GroupId,
                    ..node.clone()
                }
                .run(records),
            ),
            Node::GraphGrouping(node) => NodeOutcome::Grouped(
                GroupingNode {
                    target: GroupAttr::GraphId,
                    ..node.clone()
                }
                .run(records),
            ),
            Node::Subgrouping(node) => NodeOutcome::Subgrouped(node.run(records)?),
            Node::Bin(node) => NodeOutcome::Binned(node.run(records)?),
        })
    }
}
