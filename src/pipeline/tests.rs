// Tests for pipeline templates and execution

use super::*;
use crate::analysis::Measurement;
use crate::grouping::GroupingKey;
use crate::statistics::{AggregationKind, ErrorKind};
use crate::subgrouping::SubgroupingPolicy;
use chrono::{Duration, TimeZone, Utc};
use std::io::Write;
use tempfile::NamedTempFile;

fn unknowns() -> Vec<AnalysisRecord> {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
    let runs = [
        ("66124", 1, 0),
        ("66123", 1, 1),
        ("66124", 2, 2),
        ("66123", 1, 30),
    ];
    runs.iter()
        .map(|&(ident, aliquot, hours)| {
            let mut r = AnalysisRecord::new(ident, aliquot, t0 + Duration::hours(hours));
            r.age = Some(Measurement::new(20.0 + hours as f64, 0.5));
            r
        })
        .collect()
}

#[test]
fn test_parse_template() {
    let template = PipelineTemplate::from_toml_str(
        r#"
name = "test"

[[node]]
kind = "grouping"
key = "Aliquot"

[[node]]
kind = "graph_grouping"

[[node]]
kind = "subgrouping"
key = "Identifier"
age_kind = "Kernel Density"

[[node]]
kind = "bin"
tolerance_hours = 2.5
"#,
    )
    .unwrap();

    assert_eq!(template.name.as_deref(), Some("test"));
    assert_eq!(template.nodes.len(), 4);
    assert!(matches!(&template.nodes[0], Node::Grouping(n) if n.key == GroupingKey::Aliquot));
    assert!(matches!(&template.nodes[1], Node::GraphGrouping(n) if n.key == GroupingKey::Identifier));
    match &template.nodes[2] {
        Node::Subgrouping(n) => {
            assert_eq!(n.key, GroupingKey::Identifier);
            assert_eq!(n.policy.age_kind, AggregationKind::KernelDensity);
            assert_eq!(n.policy.kca_kind, AggregationKind::WeightedMean);
        }
        other => panic!("unexpected node {other:?}"),
    }
    assert_eq!(template.nodes[3], Node::Bin(BinNode::new(2.5)));
}

#[test]
fn test_unknown_node_kind_fails() {
    let result = PipelineTemplate::from_toml_str(
        r#"
[[node]]
kind = "ideogram"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_unknown_key_fails() {
    let result = PipelineTemplate::from_toml_str(
        r#"
[[node]]
kind = "grouping"
key = "Sample"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_template_toml_roundtrip() {
    let mut policy = SubgroupingPolicy::default();
    policy.set(
        crate::analysis::SubgroupAttr::Kca,
        AggregationKind::Mean,
        ErrorKind::Sd,
    );
    let template = PipelineTemplate {
        name: Some("roundtrip".to_string()),
        nodes: vec![
            Node::Grouping(GroupingNode::grouping(GroupingKey::Step)),
            Node::Subgrouping(SubGroupingNode::new(GroupingKey::Aliquot, policy)),
            Node::Bin(BinNode::new(3.0)),
        ],
    };
    let text = template.to_toml().unwrap();
    assert!(text.contains("kind = \"subgrouping\""));
    let parsed = PipelineTemplate::from_toml_str(&text).unwrap();
    assert_eq!(parsed, template);
}

#[test]
fn test_default_template_loads() {
    let template = PipelineTemplate::default_template().unwrap();
    assert_eq!(template.nodes.len(), 3);
    assert_eq!(template.nodes[2].name(), "SubGroup");
}

#[test]
fn test_from_preferences_uses_preference_keys() {
    let prefs = Preferences {
        grouping_key: GroupingKey::Aliquot,
        subgrouping_key: GroupingKey::Identifier,
        subgrouping: SubgroupingPolicy::uniform(AggregationKind::Mean, ErrorKind::Sd),
        ..Preferences::default()
    };
    let template = PipelineTemplate::from_preferences(&prefs);

    let names: Vec<&str> = template.nodes.iter().map(Node::name).collect();
    assert_eq!(names, vec!["Grouping", "Graphing Group", "SubGroup"]);
    match (&template.nodes[0], &template.nodes[1], &template.nodes[2]) {
        (Node::Grouping(g), Node::GraphGrouping(gg), Node::Subgrouping(sg)) => {
            assert_eq!(g.key, GroupingKey::Aliquot);
            assert_eq!(gg.key, GroupingKey::Aliquot);
            assert_eq!(sg.key, GroupingKey::Identifier);
            assert_eq!(sg.policy, prefs.subgrouping);
        }
        other => panic!("unexpected nodes {other:?}"),
    }
}

#[test]
fn test_run_grouping_and_subgrouping() {
    let template = PipelineTemplate::from_preferences(&Preferences::default());
    let mut state = PipelineState::new(unknowns());
    let steps = template.run(&mut state).unwrap();

    assert_eq!(steps.len(), 3);
    // sorted by identifier: 66123 gets id 0
    let groups: Vec<usize> = state.unknowns.iter().map(|r| r.group_id).collect();
    assert_eq!(groups, vec![1, 0, 1, 0]);
    let graphs: Vec<usize> = state.unknowns.iter().map(|r| r.graph_id).collect();
    assert_eq!(graphs, groups);

    let subgroups: Vec<usize> = state
        .unknowns
        .iter()
        .map(|r| r.subgroup.as_ref().unwrap().id)
        .collect();
    assert_eq!(subgroups, vec![0, 0, 1, 0]);

    match &steps[2].outcome {
        NodeOutcome::Subgrouped(summaries) => assert_eq!(summaries.len(), 2),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_run_graph_grouping_targets_graph_id() {
    let template = PipelineTemplate::from_toml_str(
        r#"
[[node]]
kind = "graph_grouping"
key = "Identifier"
"#,
    )
    .unwrap();
    let mut state = PipelineState::new(unknowns());
    template.run(&mut state).unwrap();

    let graph: Vec<usize> = state.unknowns.iter().map(|r| r.graph_id).collect();
    assert_eq!(graph, vec![1, 0, 1, 0]);
    assert!(state.unknowns.iter().all(|r| r.group_id == 0));
}

#[test]
fn test_run_binning() {
    let mut state = PipelineState::new(unknowns());
    let steps = PipelineTemplate::binning(1.5).run(&mut state).unwrap();

    let bins: Vec<usize> = state.unknowns.iter().map(|r| r.group_id).collect();
    assert_eq!(bins, vec![0, 0, 0, 1]);
    match &steps[0].outcome {
        NodeOutcome::Binned(bins) => assert_eq!(bins.len(), 2),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_run_reports_failing_node() {
    let template = PipelineTemplate {
        name: None,
        nodes: vec![Node::Subgrouping(SubGroupingNode::new(
            GroupingKey::SubGroup,
            SubgroupingPolicy::default(),
        ))],
    };
    let mut state = PipelineState::new(unknowns());
    let err = template.run(&mut state).unwrap_err();
    assert!(format!("{err:#}").contains("Pipeline node 0 (SubGroup) failed"));
}

#[test]
fn test_from_toml_file() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[[node]]\nkind = \"bin\"")?;
    let template = PipelineTemplate::from_toml(file.path())?;
    assert_eq!(template.nodes, vec![Node::Bin(BinNode::default())]);

    assert!(PipelineTemplate::from_toml("/nonexistent/pipeline.toml").is_err());
    Ok(())
}
