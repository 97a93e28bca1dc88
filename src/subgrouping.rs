//! Subgrouping with per-attribute aggregation policies
//!
//! A subgroup is a set of analyses (by default one aliquot) whose derived
//! values are reported as one aggregate. Every member carries a
//! [`SubgroupTag`] holding the subgroup id, the policy used and the computed
//! summary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use fnv::FnvHashMap;

use crate::analysis::{AnalysisRecord, Measurement, SubgroupAttr};
use crate::grouping::{group_analyses_by_key_with, GroupAttr, GroupingError, GroupingKey};
use crate::statistics::{aggregate, AggregateValue, AggregationKind, ErrorKind};

/// Aggregation kind and error kind for every summarized attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubgroupingPolicy {
    pub age_kind: AggregationKind,
    pub age_error_kind: ErrorKind,
    pub kca_kind: AggregationKind,
    pub kca_error_kind: ErrorKind,
    pub kcl_kind: AggregationKind,
    pub kcl_error_kind: ErrorKind,
    pub rad40_percent_kind: AggregationKind,
    pub rad40_percent_error_kind: ErrorKind,
    pub moles_k39_kind: AggregationKind,
    pub moles_k39_error_kind: ErrorKind,
}

impl SubgroupingPolicy {
    /// Same aggregation and error kind for every attribute
    pub fn uniform(kind: AggregationKind, error_kind: ErrorKind) -> Self {
        let mut policy = Self::default();
        for attr in SubgroupAttr::ALL {
            policy.set(attr, kind, error_kind);
        }
        policy
    }

    pub fn get(&self, attr: SubgroupAttr) -> (AggregationKind, ErrorKind) {
        match attr {
            SubgroupAttr::Age => (self.age_kind, self.age_error_kind),
            SubgroupAttr::Kca => (self.kca_kind, self.kca_error_kind),
            SubgroupAttr::Kcl => (self.kcl_kind, self.kcl_error_kind),
            SubgroupAttr::Rad40Percent => (self.rad40_percent_kind, self.rad40_percent_error_kind),
            SubgroupAttr::MolesK39 => (self.moles_k39_kind, self.moles_k39_error_kind),
        }
    }

    pub fn set(&mut self, attr: SubgroupAttr, kind: AggregationKind, error_kind: ErrorKind) {
        let (k, e) = match attr {
            SubgroupAttr::Age => (&mut self.age_kind, &mut self.age_error_kind),
            SubgroupAttr::Kca => (&mut self.kca_kind, &mut self.kca_error_kind),
            SubgroupAttr::Kcl => (&mut self.kcl_kind, &mut self.kcl_error_kind),
            SubgroupAttr::Rad40Percent => (
                &mut self.rad40_percent_kind,
                &mut self.rad40_percent_error_kind,
            ),
            SubgroupAttr::MolesK39 => (&mut self.moles_k39_kind, &mut self.moles_k39_error_kind),
        };
        *k = kind;
        *e = error_kind;
    }
}

/// Aggregates computed for one subgroup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupSummary {
    pub id: usize,
    /// Number of member analyses
    pub n: usize,
    /// Attributes with at least one finite member value
    pub values: BTreeMap<SubgroupAttr, AggregateValue>,
}

impl SubgroupSummary {
    pub fn get(&self, attr: SubgroupAttr) -> Option<&AggregateValue> {
        self.values.get(&attr)
    }

    /// True when any attribute fell back to unweighted statistics
    pub fn any_fell_back(&self) -> bool {
        self.values.values().any(|v| v.fell_back)
    }
}

/// Subgroup membership stored on an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupTag {
    pub id: usize,
    #[serde(default)]
    pub policy: SubgroupingPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SubgroupSummary>,
}

impl SubgroupTag {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            policy: SubgroupingPolicy::default(),
            summary: None,
        }
    }

    /// Display name, zero-padded (`00`, `01`, ...)
    pub fn name(&self) -> String {
        format!("{:02}", self.id)
    }
}

/// Aggregate every attribute of `members` according to `policy`
pub fn summarize(policy: &SubgroupingPolicy, id: usize, members: &[&AnalysisRecord]) -> SubgroupSummary {
    let mut values = BTreeMap::new();
    for attr in SubgroupAttr::ALL {
        let measurements: Vec<Measurement> = members
            .iter()
            .filter_map(|record| record.subgroup_value(attr))
            .collect();
        let (kind, error_kind) = policy.get(attr);
        if let Some(value) = aggregate(&measurements, kind, error_kind) {
            values.insert(attr, value);
        }
    }

    SubgroupSummary {
        id,
        n: members.len(),
        values,
    }
}

/// Tag the records at `members` as subgroup `id` and attach their summary
pub fn apply_subgrouping(
    policy: &SubgroupingPolicy,
    records: &mut [AnalysisRecord],
    members: &[usize],
    id: usize,
) -> SubgroupSummary {
    let member_refs: Vec<&AnalysisRecord> = members.iter().map(|&i| &records[i]).collect();
    let summary = summarize(policy, id, &member_refs);

    for &i in members {
        records[i].subgroup = Some(SubgroupTag {
            id,
            policy: policy.clone(),
            summary: Some(summary.clone()),
        });
    }
    summary
}

/// Renumber subgroup tags densely in order of first appearance
///
/// Records carrying the same tag id end up in one subgroup; untagged records
/// are skipped. Returns the number of subgroups left.
pub fn compress_groups(records: &mut [AnalysisRecord]) -> usize {
    let mut renumbered: FnvHashMap<usize, usize> = FnvHashMap::default();
    for record in records.iter_mut() {
        let Some(tag) = record.subgroup.as_mut() else {
            continue;
        };
        let next = renumbered.len();
        let id = *renumbered.entry(tag.id).or_insert(next);
        tag.id = id;
        if let Some(summary) = tag.summary.as_mut() {
            summary.id = id;
        }
    }
    renumbered.len()
}

/// Distinct subgroup summaries, ordered by id
pub fn collect_summaries(records: &[AnalysisRecord]) -> Vec<SubgroupSummary> {
    let mut by_id: BTreeMap<usize, SubgroupSummary> = BTreeMap::new();
    for tag in records.iter().filter_map(|r| r.subgroup.as_ref()) {
        if let Some(summary) = &tag.summary {
            by_id.entry(tag.id).or_insert_with(|| summary.clone());
        }
    }
    by_id.into_values().collect()
}

/// Pipeline node building subgroups and their summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubGroupingNode {
    #[serde(default = "default_key")]
    pub key: GroupingKey,
    #[serde(flatten)]
    pub policy: SubgroupingPolicy,
}

fn default_key() -> GroupingKey {
    GroupingKey::Aliquot
}

impl Default for SubGroupingNode {
    fn default() -> Self {
        Self {
            key: default_key(),
            policy: SubgroupingPolicy::default(),
        }
    }
}

impl SubGroupingNode {
    pub fn new(key: GroupingKey, policy: SubgroupingPolicy) -> Self {
        Self { key, policy }
    }

    pub fn name(&self) -> &'static str {
        "SubGroup"
    }

    /// Group by key without sorting, summarize each group, then compress tags
    ///
    /// `NoGrouping` leaves records untouched and returns no summaries.
    pub fn run(&self, records: &mut [AnalysisRecord]) -> Result<Vec<SubgroupSummary>, GroupingError> {
        match self.key {
            GroupingKey::SubGroup => {
                return Err(GroupingError::UnsupportedKey {
                    key: self.key.label().to_string(),
                    node: self.name(),
                })
            }
            GroupingKey::NoGrouping => return Ok(Vec::new()),
            _ => {}
        }

        for record in records.iter_mut() {
            record.subgroup = None;
        }

        let key = self.key;
        let mut summaries = Vec::new();
        group_analyses_by_key_with(
            records,
            |record| key.extract(record),
            GroupAttr::Subgroup,
            false,
            |gid, members| {
                summaries.push(summarize(&self.policy, gid, members));
                gid
            },
        );

        for record in records.iter_mut() {
            if let Some(tag) = record.subgroup.as_mut() {
                tag.policy = self.policy.clone();
                tag.summary = summaries.get(tag.id).cloned();
            }
        }

        let count = compress_groups(records);
        let fallbacks = summaries.iter().filter(|s| s.any_fell_back()).count();
        if fallbacks > 0 {
            tracing::debug!(
                "{} of {} subgroups used unweighted statistics",
                fallbacks,
                count
            );
        }

        Ok(collect_summaries(records))
    }
}
