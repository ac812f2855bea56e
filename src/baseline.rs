use crate::summary::ScenarioSummary;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BaselineError {
    #[error("no scenarios to select a baseline from")]
    EmptyInput,
    #[error("baseline scenario '{0}' is not in the summary table")]
    NotFound(String),
}

/// How the reference scenario is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselinePolicy {
    /// Fewest clusters wins; ties go to the lexicographically smallest name.
    #[default]
    MinClusterCount,
    /// Use this scenario regardless of counts.
    Named(String),
}

pub fn select_baseline(rows: &[ScenarioSummary], policy: &BaselinePolicy) -> Result<String, BaselineError> {
    if rows.is_empty() {
        return Err(BaselineError::EmptyInput);
    }
    match policy {
        BaselinePolicy::MinClusterCount => min_cluster_count(rows),
        BaselinePolicy::Named(name) => rows
            .iter()
            .find(|r| &r.scenario == name)
            .map(|r| r.scenario.clone())
            .ok_or_else(|| BaselineError::NotFound(name.clone())),
    }
}

fn min_cluster_count(rows: &[ScenarioSummary]) -> Result<String, BaselineError> {
    rows.iter()
        .min_by(|a, b| a.cluster_count.cmp(&b.cluster_count).then_with(|| a.scenario.cmp(&b.scenario)))
        .map(|r| r.scenario.clone())
        .ok_or(BaselineError::EmptyInput)
}
