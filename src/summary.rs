use crate::store::{ClusterStore, StoreError};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

static RE_ROW: Lazy<Regex> = Lazy::new(|| {
    // name | clusters [| lines], an unknown line count renders as `-`
    Regex::new(r"^\s*([^|]*?[^|\s])\s*\|\s*(\d+)\s*(?:\|\s*(\d+|-)\s*)?$").unwrap()
});

static RE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*Scenario Name\s*\|").unwrap());

static RE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-+\s*$").unwrap());

const HEADERS: [&str; 3] = ["Scenario Name", "Number of Clusters", "Number of Lines"];

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary table not found at {}", path.display())]
    NotFound { path: PathBuf },
    #[error("malformed summary row at line {line}: '{text}'")]
    Malformed { line: usize, text: String },
    #[error("i/o error on summary table {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario: String,
    pub cluster_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u64>,
}

impl ScenarioSummary {
    pub fn new(scenario: impl Into<String>, cluster_count: usize) -> Self {
        Self { scenario: scenario.into(), cluster_count, line_count: None }
    }
}

/// Parses the `Scenario Name | Number of Clusters | Number of Lines` table.
///
/// Header, dash separator and blank lines are skipped; the lines column may be absent.
pub fn parse_table(text: &str) -> Result<Vec<ScenarioSummary>, SummaryError> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() || RE_HEADER.is_match(line) || RE_SEPARATOR.is_match(line) {
            continue;
        }
        let malformed = || SummaryError::Malformed { line: idx + 1, text: line.to_string() };
        let caps = RE_ROW.captures(line).ok_or_else(malformed)?;
        let cluster_count = caps[2].parse::<usize>().map_err(|_| malformed())?;
        let line_count = match caps.get(3).map(|m| m.as_str()) {
            Some("-") | None => None,
            Some(n) => Some(n.parse::<u64>().map_err(|_| malformed())?),
        };
        rows.push(ScenarioSummary { scenario: caps[1].to_string(), cluster_count, line_count });
    }
    Ok(rows)
}

pub fn read_table(path: &Path) -> Result<Vec<ScenarioSummary>, SummaryError> {
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => SummaryError::NotFound { path: path.to_path_buf() },
        _ => SummaryError::Io { path: path.to_path_buf(), source },
    })?;
    parse_table(&text)
}

/// Renders rows sorted by scenario name, each column sized to its widest cell.
pub fn render_table(rows: &[ScenarioSummary]) -> String {
    let sorted: Vec<&ScenarioSummary> = rows.iter().sorted_by(|a, b| a.scenario.cmp(&b.scenario)).collect();
    let lines_col = |r: &ScenarioSummary| r.line_count.map(|n| n.to_string()).unwrap_or_else(|| "-".into());

    let w_name = sorted.iter().map(|r| r.scenario.len()).chain([HEADERS[0].len()]).max().unwrap_or(0);
    let w_clusters = sorted.iter().map(|r| r.cluster_count.to_string().len()).chain([HEADERS[1].len()]).max().unwrap_or(0);
    let w_lines = sorted.iter().map(|r| lines_col(*r).len()).chain([HEADERS[2].len()]).max().unwrap_or(0);

    let mut out = String::new();
    out.push_str(&format!("{:<w_name$} | {:>w_clusters$} | {:>w_lines$}\n", HEADERS[0], HEADERS[1], HEADERS[2]));
    out.push_str(&"-".repeat(w_name + w_clusters + w_lines + 6));
    out.push('\n');
    for r in sorted {
        out.push_str(&format!("{:<w_name$} | {:>w_clusters$} | {:>w_lines$}\n", r.scenario, r.cluster_count, lines_col(r)));
    }
    out
}

/// Summary rows computed from the stores themselves, with scenarios that failed to load.
#[derive(Debug, Default)]
pub struct DerivedSummary {
    pub rows: Vec<ScenarioSummary>,
    pub failures: Vec<(String, StoreError)>,
}

pub fn derive_from_store(store: &dyn ClusterStore) -> Result<DerivedSummary, StoreError> {
    let mut derived = DerivedSummary::default();
    for scenario in store.scenarios()? {
        match store.load(&scenario) {
            Ok(set) => derived.rows.push(ScenarioSummary {
                cluster_count: set.len(),
                line_count: set.line_count(),
                scenario,
            }),
            Err(e) => {
                tracing::warn!(scenario = %scenario, error = %e, "skipping scenario in derived summary");
                derived.failures.push((scenario, e));
            }
        }
    }
    Ok(derived)
}
