use anyhow::{Context, Result};
use argroup::{
    analysis::{load_analyses, AnalysisRecord, SubgroupAttr},
    binning::{BinNode, BinSummary, TimeBin},
    cli::{Cli, Command, OutputFormat},
    config::Preferences,
    csv_output::{self, CsvOutput},
    grouping::GroupingNode,
    json_output::{self, JsonOutput},
    pipeline::{NodeOutcome, PipelineState, PipelineTemplate},
    series::{build_series, GroupSeries},
    store::{find_references, AnalysisQuery, MemoryStore},
    subgrouping::{collect_summaries, SubGroupingNode, SubgroupSummary},
};
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Everything a command produced, rendered in the requested format
#[derive(Default)]
struct Report {
    analyses: Vec<AnalysisRecord>,
    subgroups: Vec<SubgroupSummary>,
    bins: Vec<TimeBin>,
    series: Vec<GroupSeries>,
}

fn load_preferences(path: Option<&Path>) -> Result<Preferences> {
    match path {
        Some(path) => Preferences::from_toml(path),
        None => Ok(Preferences::default()),
    }
}

fn print_analyses(records: &[AnalysisRecord]) {
    println!(
        "{:<16} {:<16} {:>6} {:>6} {:>9}",
        "RUNID", "TYPE", "GROUP", "GRAPH", "SUBGROUP"
    );
    println!("{}", "─".repeat(57));
    for r in records {
        let subgroup = r
            .subgroup
            .as_ref()
            .map(|tag| tag.name())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<16} {:>6} {:>6} {:>9}",
            r.runid(),
            r.analysis_type,
            r.group_id,
            r.graph_id,
            subgroup
        );
    }
}

fn print_subgroups(summaries: &[SubgroupSummary]) {
    for summary in summaries {
        println!();
        println!("Subgroup {:02} (n={})", summary.id, summary.n);
        for attr in SubgroupAttr::ALL {
            let Some(v) = summary.get(attr) else {
                continue;
            };
            let mswd = v
                .mswd
                .map(|m| format!(" MSWD={:.2}", m))
                .unwrap_or_default();
            let fallback = if v.fell_back { " (unweighted)" } else { "" };
            println!(
                "  {:<8} {:<15} {:.4} ± {:.4} {}{}{}",
                attr.label(),
                v.kind.label(),
                v.value,
                v.error,
                v.error_kind,
                mswd,
                fallback
            );
        }
    }
}

fn print_bins(bins: &[TimeBin]) {
    println!();
    for (id, bin) in bins.iter().enumerate() {
        println!(
            "Bin {}: {} .. {} (n={}, {:.2} h)",
            id,
            json_output::format_secs(bin.low),
            json_output::format_secs(bin.high),
            bin.len,
            bin.span_hours()
        );
    }

    let summary = BinSummary::from_bins(bins);
    if let Some(gaps) = summary.gap_hours {
        println!(
            "Gaps between bins: mean {:.2} h, median {:.2} h, min {:.2} h, max {:.2} h",
            gaps.mean, gaps.median, gaps.min, gaps.max
        );
    }
}

fn print_series(series: &[GroupSeries]) {
    for s in series {
        println!();
        println!("=== {} (graph group {}) ===", s.title, s.graph_id);
        if let Some((lo, hi)) = s.y_limits {
            println!("y limits: {:.4} .. {:.4}", lo, hi);
        }
        for (i, runid) in s.runids.iter().enumerate() {
            match &s.yerr {
                Some(yerr) => println!(
                    "{:<16} {:>10.4} {:>12.4} ± {:.4}",
                    runid, s.xs[i], s.ys[i], yerr[i]
                ),
                None => println!("{:<16} {:>10.4} {:>12}", runid, s.xs[i], s.ys[i]),
            }
        }
    }
}

fn emit(format: OutputFormat, report: Report) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if report.series.is_empty() {
                print_analyses(&report.analyses);
            }
            print_subgroups(&report.subgroups);
            if !report.bins.is_empty() {
                print_bins(&report.bins);
            }
            print_series(&report.series);
        }
        OutputFormat::Json => {
            let mut output = JsonOutput::new();
            output.add_analyses(&report.analyses);
            output.set_subgroups(&report.subgroups);
            if !report.bins.is_empty() {
                output.set_bins(&report.bins);
            }
            output.set_series(report.series);
            println!("{}", output.to_json()?);
        }
        OutputFormat::Csv => {
            if !report.series.is_empty() {
                print!("{}", csv_output::series_to_csv(&report.series));
            } else if !report.subgroups.is_empty() {
                print!("{}", csv_output::subgroups_to_csv(&report.subgroups));
            } else if !report.bins.is_empty() {
                print!("{}", csv_output::bins_to_csv(&report.bins));
            } else {
                let has_subgroups = report.analyses.iter().any(|r| r.subgroup.is_some());
                let has_age = report.analyses.iter().any(|r| r.age.is_some());
                let mut output = CsvOutput::new(has_subgroups, has_age);
                for record in &report.analyses {
                    output.add_analysis(record);
                }
                print!("{}", output.to_csv());
            }
        }
    }
    Ok(())
}

fn run_command(command: Command, prefs: &Preferences) -> Result<Report> {
    match command {
        Command::Group {
            input,
            key,
            graph,
            no_sort,
        } => {
            let mut analyses = load_analyses(&input)?;
            let key = key.unwrap_or(prefs.grouping_key);
            let mut node = if graph {
                GroupingNode::graph_grouping(key)
            } else {
                GroupingNode::grouping(key)
            };
            node.sorting_enabled = !no_sort;
            node.run(&mut analyses);
            Ok(Report {
                analyses,
                ..Report::default()
            })
        }
        Command::Bin { input, tolerance } => {
            let mut analyses = load_analyses(&input)?;
            let tolerance = tolerance.unwrap_or(prefs.bin_tolerance_hours);
            let bins = BinNode::new(tolerance)
                .run(&mut analyses)
                .context("Failed to bin analyses")?;
            Ok(Report {
                analyses,
                bins,
                ..Report::default()
            })
        }
        Command::Subgroup {
            input,
            key,
            kind,
            error_kind,
        } => {
            let mut analyses = load_analyses(&input)?;
            let mut policy = prefs.subgrouping.clone();
            for attr in SubgroupAttr::ALL {
                let (k, e) = policy.get(attr);
                policy.set(attr, kind.unwrap_or(k), error_kind.unwrap_or(e));
            }
            let node = SubGroupingNode::new(key.unwrap_or(prefs.subgrouping_key), policy);
            let subgroups = node.run(&mut analyses)?;
            Ok(Report {
                analyses,
                subgroups,
                ..Report::default()
            })
        }
        Command::Run { pipeline, input } => {
            let template = match pipeline {
                Some(path) => PipelineTemplate::from_toml(path)?,
                None => PipelineTemplate::default_template()?,
            };
            let mut state = PipelineState::new(load_analyses(&input)?);
            let steps = template.run(&mut state)?;

            let bins = steps
                .into_iter()
                .filter_map(|step| match step.outcome {
                    NodeOutcome::Binned(bins) => Some(bins),
                    _ => None,
                })
                .last()
                .unwrap_or_default();
            Ok(Report {
                subgroups: collect_summaries(&state.unknowns),
                analyses: state.unknowns,
                bins,
                ..Report::default()
            })
        }
        Command::References {
            catalog,
            unknowns,
            types,
            hours,
            mass_spectrometers,
            extract_devices,
            include_invalid,
        } => {
            let store = MemoryStore::from_json(&catalog)?;
            let unknowns = load_analyses(&unknowns)?;
            let times: Vec<_> = unknowns.iter().map(|r| r.timestamp).collect();

            let mut query = AnalysisQuery::new()
                .analysis_types(&types)
                .mass_spectrometers(&mass_spectrometers)
                .extract_devices(&extract_devices);
            if include_invalid {
                query = query.include_invalid();
            }
            let hours = hours.unwrap_or(prefs.reference_hours_padding);
            let analyses = find_references(&store, &times, hours, &query)?;
            Ok(Report {
                analyses,
                ..Report::default()
            })
        }
        Command::Series {
            input,
            attribute,
            index_axis,
            deviation,
        } => {
            let analyses = load_analyses(&input)?;
            let mut options = prefs.series.clone();
            if index_axis {
                options.use_time_axis = false;
            }
            if let Some(mode) = deviation {
                options.deviation = mode.into();
            }
            let series = build_series(&analyses, &attribute, &options, Utc::now())?;
            Ok(Report {
                analyses,
                series,
                ..Report::default()
            })
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let prefs = load_preferences(args.config.as_deref())?;
    let report = run_command(args.command, &prefs)?;
    emit(args.format, report)
}
