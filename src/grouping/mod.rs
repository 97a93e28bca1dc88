//! Key-based grouping of analyses
//!
//! Partitions a set of analyses by a key (aliquot, identifier, step, comment,
//! subgroup) and writes a dense, zero-based group id onto every member. Ids are
//! handed out in order of first appearance of each key, after an optional
//! stable sort by key. The caller's slice is never reordered.

mod key;
mod node;

pub use key::{GroupAttr, GroupKeyValue, GroupingKey};
pub use node::GroupingNode;

use fnv::FnvHashMap;
use thiserror::Error;

use crate::analysis::AnalysisRecord;

/// Errors for grouping configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupingError {
    #[error("Unknown grouping key '{0}' (expected one of: Aliquot, Identifier, Step, Comment, SubGroup, No Grouping)")]
    UnknownKey(String),

    #[error("Grouping key '{key}' is not allowed for {node}")]
    UnsupportedKey { key: String, node: &'static str },
}

/// Outcome of a grouping pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAssignment {
    /// Id written to each record, indexed like the input slice
    pub ids: Vec<usize>,
    /// Member indices of each group, indexed by the id assigned before remapping
    pub groups: Vec<Vec<usize>>,
}

impl GroupAssignment {
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Group `records` by `key` and write each group's id to `attr`
pub fn group_analyses_by_key<K>(
    records: &mut [AnalysisRecord],
    key: K,
    attr: GroupAttr,
    sorting_enabled: bool,
) -> GroupAssignment
where
    K: Fn(&AnalysisRecord) -> GroupKeyValue,
{
    group_analyses_by_key_with(records, key, attr, sorting_enabled, |gid, _| gid)
}

/// Like [`group_analyses_by_key`], with `id_func` remapping each group's id
///
/// `id_func` receives the dense id and the group's members (in grouping order)
/// and returns the id to write.
pub fn group_analyses_by_key_with<K, F>(
    records: &mut [AnalysisRecord],
    key: K,
    attr: GroupAttr,
    sorting_enabled: bool,
    mut id_func: F,
) -> GroupAssignment
where
    K: Fn(&AnalysisRecord) -> GroupKeyValue,
    F: FnMut(usize, &[&AnalysisRecord]) -> usize,
{
    let groups = partition_by_key(records, &key, sorting_enabled);

    let mut ids = vec![0; records.len()];
    for (gid, members) in groups.iter().enumerate() {
        let member_refs: Vec<&AnalysisRecord> = members.iter().map(|&i| &records[i]).collect();
        let assigned = id_func(gid, &member_refs);
        for &i in members {
            ids[i] = assigned;
        }
    }

    for (record, &id) in records.iter_mut().zip(&ids) {
        attr.set(record, id);
    }

    tracing::debug!(
        "grouped {} analyses into {} groups ({:?}, sorted={})",
        records.len(),
        groups.len(),
        attr,
        sorting_enabled
    );

    GroupAssignment { ids, groups }
}

/// Partition record indices by key; group order is first appearance in the
/// (optionally key-sorted) iteration order
pub(crate) fn partition_by_key<K>(
    records: &[AnalysisRecord],
    key: &K,
    sorting_enabled: bool,
) -> Vec<Vec<usize>>
where
    K: Fn(&AnalysisRecord) -> GroupKeyValue,
{
    let keys: Vec<GroupKeyValue> = records.iter().map(key).collect();

    let mut order: Vec<usize> = (0..records.len()).collect();
    if sorting_enabled {
        // sort_by is stable: equal keys keep their input order
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    }

    let mut key_to_group: FnvHashMap<&GroupKeyValue, usize> = FnvHashMap::default();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in order {
        let gid = *key_to_group.entry(&keys[i]).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[gid].push(i);
    }

    groups
}
