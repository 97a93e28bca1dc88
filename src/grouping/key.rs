use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analysis::AnalysisRecord;
use crate::grouping::GroupingError;
use crate::subgrouping::SubgroupTag;

/// Attribute a grouping key is read from
///
/// Parsed case-insensitively from the labels shown in pipeline templates
/// (`"Aliquot"`, `"No Grouping"`, `"SubGroup"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupingKey {
    Aliquot,
    Identifier,
    Step,
    Comment,
    SubGroup,
    NoGrouping,
}

impl GroupingKey {
    pub const ALL: [GroupingKey; 6] = [
        GroupingKey::Aliquot,
        GroupingKey::Identifier,
        GroupingKey::Step,
        GroupingKey::Comment,
        GroupingKey::SubGroup,
        GroupingKey::NoGrouping,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GroupingKey::Aliquot => "Aliquot",
            GroupingKey::Identifier => "Identifier",
            GroupingKey::Step => "Step",
            GroupingKey::Comment => "Comment",
            GroupingKey::SubGroup => "SubGroup",
            GroupingKey::NoGrouping => "No Grouping",
        }
    }

    /// Extract this key's value from a record
    ///
    /// `NoGrouping` maps every record to the same value.
    pub fn extract(&self, record: &AnalysisRecord) -> GroupKeyValue {
        match self {
            GroupingKey::Aliquot => GroupKeyValue::Int(i64::from(record.aliquot)),
            GroupingKey::Identifier => GroupKeyValue::Text(record.identifier.clone()),
            GroupingKey::Step => GroupKeyValue::Text(record.step()),
            GroupingKey::Comment => GroupKeyValue::Text(record.comment.clone()),
            GroupingKey::SubGroup => match &record.subgroup {
                Some(tag) => GroupKeyValue::Int(tag.id as i64),
                None => GroupKeyValue::Missing,
            },
            GroupingKey::NoGrouping => GroupKeyValue::Missing,
        }
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GroupingKey {
    type Err = GroupingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "aliquot" => Ok(GroupingKey::Aliquot),
            "identifier" => Ok(GroupingKey::Identifier),
            "step" => Ok(GroupingKey::Step),
            "comment" => Ok(GroupingKey::Comment),
            "subgroup" => Ok(GroupingKey::SubGroup),
            "nogrouping" | "none" => Ok(GroupingKey::NoGrouping),
            _ => Err(GroupingError::UnknownKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for GroupingKey {
    type Error = GroupingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupingKey> for String {
    fn from(key: GroupingKey) -> Self {
        key.label().to_string()
    }
}

/// Extracted key value; ordering is total so records can be sorted by key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKeyValue {
    Missing,
    Int(i64),
    Text(String),
}

/// Record attribute a grouping pass writes its ids to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupAttr {
    GroupId,
    GraphId,
    Subgroup,
}

impl GroupAttr {
    pub fn get(&self, record: &AnalysisRecord) -> Option<usize> {
        match self {
            GroupAttr::GroupId => Some(record.group_id),
            GroupAttr::GraphId => Some(record.graph_id),
            GroupAttr::Subgroup => record.subgroup.as_ref().map(|tag| tag.id),
        }
    }

    /// Write `id`; for subgroups an existing tag keeps its policy and summary
    pub fn set(&self, record: &mut AnalysisRecord, id: usize) {
        match self {
            GroupAttr::GroupId => record.group_id = id,
            GroupAttr::GraphId => record.graph_id = id,
            GroupAttr::Subgroup => match record.subgroup.as_mut() {
                Some(tag) => tag.id = id,
                None => record.subgroup = Some(SubgroupTag::new(id)),
            },
        }
    }
}
