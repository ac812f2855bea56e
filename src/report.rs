use crate::matcher::MatchResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Spaces added after the widest value of each column.
pub const COLUMN_PADDING: usize = 2;

const TABLE_HEADERS: [&str; 3] = ["Scenario Name", "Number of Clusters", "New clusters (vs baseline)"];
const TRACE_RULE: &str = "==================================================";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub scenario: String,
    pub cluster_count: usize,
    pub new_cluster_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedScenario {
    pub scenario: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    pub baseline: String,
    pub baseline_cluster_count: usize,
    pub threshold: usize,
    pub generated_at: DateTime<Utc>,
    /// Sorted by scenario name.
    pub reports: Vec<ComparisonReport>,
    pub skipped: Vec<SkippedScenario>,
    /// Per-scenario trace text, present when tracing was requested.
    #[serde(skip)]
    pub traces: BTreeMap<String, String>,
}

impl ComparisonOutcome {
    pub fn report(&self, scenario: &str) -> Option<&ComparisonReport> {
        self.reports.iter().find(|r| r.scenario == scenario)
    }

    pub fn total_new(&self) -> usize {
        self.reports.iter().map(|r| r.new_cluster_count).sum()
    }
}

/// Appends the trace lines for one match.
pub fn trace_match(out: &mut String, m: &MatchResult<'_>) {
    let (sep, suffix) = if m.is_new() { (",", ", Too different") } else { ("", "") };
    let _ = writeln!(
        out,
        "Cluster {} - Minimum Distance: {}{sep} with Cluster {}{suffix}",
        m.candidate_cluster_id, m.distance, m.nearest_baseline_cluster_id
    );
    let _ = writeln!(out, "Text of Cluster {}: {}", m.candidate_cluster_id, m.candidate_template);
    let _ = writeln!(out, "Text of Cluster {}: {}", m.nearest_baseline_cluster_id, m.nearest_baseline_template);
    let _ = writeln!(out, "{TRACE_RULE}");
}

pub fn trace_scenario_header(out: &mut String, scenario: &str) {
    let _ = writeln!(out, "Comparing with scenario -> {scenario}");
}

pub fn trace_scenario_footer(out: &mut String, new_clusters: usize) {
    let _ = writeln!(out, "New clusters from this scenario: {new_clusters}");
}

/// Full comparison trace, scenarios in name order, followed by the skipped list.
pub fn render_trace(outcome: &ComparisonOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scenario with minimum clusters: {}", outcome.baseline);
    for text in outcome.traces.values() {
        out.push('\n');
        out.push_str(text);
    }
    render_skipped(&mut out, &outcome.skipped);
    out
}

/// Column-aligned summary table; widths follow the longest cell of each column.
pub fn render_table(outcome: &ComparisonOutcome) -> String {
    let rows: Vec<[String; 3]> = outcome
        .reports
        .iter()
        .map(|r| [r.scenario.clone(), r.cluster_count.to_string(), r.new_cluster_count.to_string()])
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }
    let widths = widths.map(|w| w + COLUMN_PADDING);

    let mut out = String::new();
    push_row(&mut out, &TABLE_HEADERS.map(str::to_string), &widths);
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    render_skipped(&mut out, &outcome.skipped);
    out
}

fn push_row(out: &mut String, cells: &[String; 3], widths: &[usize; 3]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect::<Vec<_>>()
        .join("| ");
    out.push_str(line.trim_end());
    out.push('\n');
}

fn render_skipped(out: &mut String, skipped: &[SkippedScenario]) {
    if skipped.is_empty() {
        return;
    }
    let _ = writeln!(out, "\nSkipped scenarios:");
    for s in skipped {
        let _ = writeln!(out, "  {}: {}", s.scenario, s.reason);
    }
}

pub fn render_json(outcome: &ComparisonOutcome) -> Result<String, ReportError> {
    let mut value = serde_json::to_value(outcome)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "generated_at".into(),
            serde_json::Value::String(outcome.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Writes `content` to `path`, replacing any previous file.
pub fn write_report(path: &Path, content: &str) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(io_err)?;
    let mut w = BufWriter::new(file);
    w.write_all(content.as_bytes()).map_err(io_err)?;
    w.flush().map_err(io_err)
}
