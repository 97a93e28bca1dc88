//! CLI argument parsing for argroup

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::grouping::GroupingKey;
use crate::series::{Deviation, SeriesAttribute};
use crate::statistics::{AggregationKind, ErrorKind};

/// Output format for grouping results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis
    Csv,
}

/// Y-value mode for plot series
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviationMode {
    None,
    Absolute,
    Percent,
}

impl From<DeviationMode> for Deviation {
    fn from(mode: DeviationMode) -> Self {
        match mode {
            DeviationMode::None => Deviation::None,
            DeviationMode::Absolute => Deviation::Absolute,
            DeviationMode::Percent => Deviation::Percent,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "argroup")]
#[command(version)]
#[command(about = "Group, bin and summarize Ar-Ar analyses", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Preferences file (TOML)
    #[arg(long = "config", value_name = "PREFS", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug tracing output (to stderr)
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Assign group ids by key
    Group {
        /// Analyses (JSON array)
        input: PathBuf,

        /// Grouping key (Aliquot, Identifier, Step, Comment, SubGroup, "No Grouping")
        #[arg(short, long)]
        key: Option<GroupingKey>,

        /// Write graph ids instead of group ids
        #[arg(long)]
        graph: bool,

        /// Number groups in input order instead of key order
        #[arg(long = "no-sort")]
        no_sort: bool,
    },

    /// Assign group ids by run-time bins
    Bin {
        input: PathBuf,

        /// Largest gap in hours between runs of one bin
        #[arg(short, long, value_name = "HOURS")]
        tolerance: Option<f64>,
    },

    /// Build subgroups and aggregate their values
    Subgroup {
        input: PathBuf,

        #[arg(short, long)]
        key: Option<GroupingKey>,

        /// Aggregation for every attribute (overrides preferences)
        #[arg(long)]
        kind: Option<AggregationKind>,

        /// Reported error for every attribute (overrides preferences)
        #[arg(long = "error-kind")]
        error_kind: Option<ErrorKind>,
    },

    /// Run a pipeline template
    Run {
        /// Pipeline template (TOML); the embedded default when omitted
        #[arg(short, long)]
        pipeline: Option<PathBuf>,

        input: PathBuf,
    },

    /// Find references measured around a set of unknowns
    References {
        /// Catalog of candidate references (JSON array)
        catalog: PathBuf,

        /// Unknowns whose run times are searched around
        #[arg(short, long)]
        unknowns: PathBuf,

        /// Analysis types to match (e.g. blank_unknown,air)
        #[arg(short = 't', long = "types", value_delimiter = ',')]
        types: Vec<String>,

        /// Hours searched on either side of each unknown
        #[arg(long, value_name = "HOURS")]
        hours: Option<f64>,

        #[arg(long = "mass-spectrometer", value_delimiter = ',')]
        mass_spectrometers: Vec<String>,

        #[arg(long = "extract-device", value_delimiter = ',')]
        extract_devices: Vec<String>,

        /// Keep references tagged invalid
        #[arg(long = "include-invalid")]
        include_invalid: bool,
    },

    /// Prepare per-graph-group plot series
    Series {
        input: PathBuf,

        /// Attribute (Age, K/Ca, Ar40, Ar40/Ar39, "Analysis Type", ...)
        #[arg(short, long)]
        attribute: SeriesAttribute,

        /// Plot against analysis index instead of run time
        #[arg(long = "index-axis")]
        index_axis: bool,

        #[arg(long, value_enum)]
        deviation: Option<DeviationMode>,
    },
}
