use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisRecord;
use crate::grouping::{group_analyses_by_key, GroupAssignment, GroupAttr, GroupingKey};

/// Pipeline node assigning `group_id` or `graph_id` by key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingNode {
    #[serde(default = "default_key")]
    pub key: GroupingKey,
    #[serde(skip, default = "default_target")]
    pub target: GroupAttr,
    #[serde(default = "default_sorting")]
    pub sorting_enabled: bool,
}

fn default_key() -> GroupingKey {
    GroupingKey::Identifier
}

fn default_target() -> GroupAttr {
    GroupAttr::GroupId
}

fn default_sorting() -> bool {
    true
}

impl GroupingNode {
    /// Node writing `group_id`
    pub fn grouping(key: GroupingKey) -> Self {
        Self {
            key,
            target: GroupAttr::GroupId,
            sorting_enabled: true,
        }
    }

    /// Node writing `graph_id`
    pub fn graph_grouping(key: GroupingKey) -> Self {
        Self {
            key,
            target: GroupAttr::GraphId,
            sorting_enabled: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.target {
            GroupAttr::GraphId => "Graphing Group",
            _ => "Grouping",
        }
    }

    /// Reset the target attribute to 0, then regroup
    ///
    /// Returns `None` (records untouched) for `NoGrouping`.
    pub fn run(&self, records: &mut [AnalysisRecord]) -> Option<GroupAssignment> {
        if self.key == GroupingKey::NoGrouping {
            return None;
        }

        for record in records.iter_mut() {
            self.target.set(record, 0);
        }

        let key = self.key;
        Some(group_analyses_by_key(
            records,
            |record| key.extract(record),
            self.target,
            self.sorting_enabled,
        ))
    }
}

impl Default for GroupingNode {
    fn default() -> Self {
        Self::grouping(default_key())
    }
}
