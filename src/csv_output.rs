//! CSV output format for grouped analyses
//!
//! Analyses, subgroup summaries and time bins each render as their own table.

use crate::analysis::AnalysisRecord;
use crate::binning::TimeBin;
use crate::json_output::format_secs;
use crate::series::GroupSeries;
use crate::subgrouping::SubgroupSummary;

/// CSV row for a single analysis
#[derive(Debug, Clone)]
pub struct CsvAnalysis {
    pub runid: String,
    pub identifier: String,
    pub aliquot: u32,
    pub step: String,
    pub timestamp: String,
    pub analysis_type: String,
    pub group_id: usize,
    pub graph_id: usize,
    pub subgroup: Option<usize>,
    pub age: Option<(f64, f64)>,
}

impl From<&AnalysisRecord> for CsvAnalysis {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            runid: record.runid(),
            identifier: record.identifier.clone(),
            aliquot: record.aliquot,
            step: record.step(),
            timestamp: record.timestamp.to_rfc3339(),
            analysis_type: record.analysis_type.clone(),
            group_id: record.group_id,
            graph_id: record.graph_id,
            subgroup: record.subgroup.as_ref().map(|tag| tag.id),
            age: record.age.map(|m| (m.value, m.error)),
        }
    }
}

/// Escape CSV field (handle commas, quotes, newlines)
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// CSV output formatter for analyses
#[derive(Debug)]
pub struct CsvOutput {
    rows: Vec<CsvAnalysis>,
    include_subgroup: bool,
    include_age: bool,
}

impl CsvOutput {
    pub fn new(include_subgroup: bool, include_age: bool) -> Self {
        Self {
            rows: Vec::new(),
            include_subgroup,
            include_age,
        }
    }

    pub fn add_analysis(&mut self, record: &AnalysisRecord) {
        self.rows.push(CsvAnalysis::from(record));
    }

    /// Generate CSV header row based on enabled columns
    fn header(&self) -> String {
        let mut headers = vec![
            "runid",
            "identifier",
            "aliquot",
            "step",
            "timestamp",
            "analysis_type",
            "group_id",
            "graph_id",
        ];

        if self.include_subgroup {
            headers.push("subgroup");
        }

        if self.include_age {
            headers.push("age");
            headers.push("age_err");
        }

        headers.join(",")
    }

    fn format_row(&self, row: &CsvAnalysis) -> String {
        let mut fields = vec![
            escape_field(&row.runid),
            escape_field(&row.identifier),
            row.aliquot.to_string(),
            escape_field(&row.step),
            row.timestamp.clone(),
            escape_field(&row.analysis_type),
            row.group_id.to_string(),
            row.graph_id.to_string(),
        ];

        if self.include_subgroup {
            fields.push(optional(row.subgroup));
        }

        if self.include_age {
            fields.push(optional(row.age.map(|a| a.0)));
            fields.push(optional(row.age.map(|a| a.1)));
        }

        fields.join(",")
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(&self.header());
        output.push('\n');

        for row in &self.rows {
            output.push_str(&self.format_row(row));
            output.push('\n');
        }

        output
    }
}

/// One row per subgroup attribute
pub fn subgroups_to_csv(summaries: &[SubgroupSummary]) -> String {
    let mut output = String::from("subgroup,attribute,kind,value,error,error_kind,n,mswd,fell_back\n");
    for summary in summaries {
        for (attr, v) in &summary.values {
            output.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                summary.id,
                escape_field(attr.label()),
                v.kind,
                v.value,
                v.error,
                v.error_kind,
                v.n,
                optional(v.mswd),
                v.fell_back
            ));
        }
    }
    output
}

/// One row per time bin
pub fn bins_to_csv(bins: &[TimeBin]) -> String {
    let mut output = String::from("bin,low,high,count,span_hours\n");
    for (id, bin) in bins.iter().enumerate() {
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            id,
            format_secs(bin.low),
            format_secs(bin.high),
            bin.len,
            bin.span_hours()
        ));
    }
    output
}

/// One row per plotted point
pub fn series_to_csv(series: &[GroupSeries]) -> String {
    let mut output = String::from("graph_id,runid,x,y,yerr\n");
    for s in series {
        for (i, runid) in s.runids.iter().enumerate() {
            let yerr = s.yerr.as_ref().map(|e| e[i]);
            output.push_str(&format!(
                "{},{},{},{},{}\n",
                s.graph_id,
                escape_field(runid),
                s.xs[i],
                s.ys[i],
                optional(yerr)
            ));
        }
    }
    output
}
