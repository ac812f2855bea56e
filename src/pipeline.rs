use crate::baseline::{select_baseline, BaselineError, BaselinePolicy};
use crate::cluster::ClusterSet;
use crate::matcher::{MatchError, Matcher, NeighborCache, DEFAULT_THRESHOLD};
use crate::report::{self, ComparisonOutcome, ComparisonReport, SkippedScenario};
use crate::store::{ClusterStore, StoreError};
use crate::summary::ScenarioSummary;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ComparisonMode {
    /// Baseline against each other scenario, one pair at a time.
    #[default]
    AllPairs,
}

#[derive(Debug, Clone)]
pub struct CompareOpts {
    pub baseline: BaselinePolicy,
    pub threshold: usize,
    pub mode: ComparisonMode,
    /// Only compare scenarios whose name matches.
    pub include: Option<Regex>,
    /// Never compare scenarios whose name matches.
    pub exclude: Option<Regex>,
    /// Neighbour cache entries; 0 disables the cache.
    pub cache_capacity: usize,
    /// Keep the per-cluster trace text in the outcome.
    pub trace: bool,
    pub parallel: bool,
}

impl Default for CompareOpts {
    fn default() -> Self {
        Self {
            baseline: BaselinePolicy::default(),
            threshold: DEFAULT_THRESHOLD,
            mode: ComparisonMode::default(),
            include: None,
            exclude: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            trace: false,
            parallel: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Baseline(#[from] BaselineError),
    #[error("failed to load baseline: {0}")]
    BaselineLoad(#[source] StoreError),
    #[error("baseline scenario '{0}' has no clusters")]
    EmptyBaseline(String),
    #[error("failed to list scenarios: {0}")]
    Discovery(#[source] StoreError),
}

/// Why a single candidate scenario could not be compared.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Load(#[from] StoreError),
    #[error(transparent)]
    Match(#[from] MatchError),
}

#[derive(Debug, Clone)]
pub struct ScenarioComparison {
    pub report: ComparisonReport,
    pub trace: Option<String>,
}

/// Matches every cluster of `candidate` against the matcher's baseline and counts the new ones.
pub fn compare_set(matcher: &Matcher<'_>, candidate: &ClusterSet, with_trace: bool) -> Result<ScenarioComparison, MatchError> {
    let mut text = with_trace.then(String::new);
    if let Some(t) = text.as_mut() {
        report::trace_scenario_header(t, candidate.scenario());
    }
    let mut new_clusters = 0usize;
    for result in matcher.match_set(candidate)? {
        let m = result?;
        trace!(
            scenario = candidate.scenario(),
            cluster = m.candidate_cluster_id,
            nearest = m.nearest_baseline_cluster_id,
            distance = m.distance,
            classification = ?m.classification,
            "matched cluster"
        );
        if m.is_new() {
            new_clusters += 1;
        }
        if let Some(t) = text.as_mut() {
            report::trace_match(t, &m);
        }
    }
    if let Some(t) = text.as_mut() {
        report::trace_scenario_footer(t, new_clusters);
    }
    Ok(ScenarioComparison {
        report: ComparisonReport {
            scenario: candidate.scenario().to_string(),
            cluster_count: candidate.len(),
            new_cluster_count: new_clusters,
        },
        trace: text,
    })
}

fn compare_scenario(
    store: &dyn ClusterStore,
    matcher: &Matcher<'_>,
    scenario: &str,
    with_trace: bool,
) -> Result<ScenarioComparison, ScenarioError> {
    let candidate = store.load(scenario)?;
    let comparison = compare_set(matcher, &candidate, with_trace)?;
    debug!(
        scenario,
        clusters = comparison.report.cluster_count,
        new = comparison.report.new_cluster_count,
        "scenario compared"
    );
    Ok(comparison)
}

fn wanted(scenario: &str, opts: &CompareOpts) -> bool {
    opts.include.as_ref().map_or(true, |re| re.is_match(scenario))
        && !opts.exclude.as_ref().map_or(false, |re| re.is_match(scenario))
}

/// Selects the baseline, compares every other scenario against it and collects the outcome.
///
/// Candidates are the union of the summary rows and the scenarios present in the
/// store. A candidate that fails to load or match is listed in `skipped`; only
/// baseline problems abort the run.
pub fn run(
    store: &dyn ClusterStore,
    summaries: &[ScenarioSummary],
    opts: &CompareOpts,
) -> Result<ComparisonOutcome, PipelineError> {
    let baseline = select_baseline(summaries, &opts.baseline)?;
    let baseline_set = store.load(&baseline).map_err(PipelineError::BaselineLoad)?;
    if baseline_set.is_empty() {
        return Err(PipelineError::EmptyBaseline(baseline));
    }
    info!(baseline = %baseline, clusters = baseline_set.len(), threshold = opts.threshold, "baseline selected");

    let mut names: BTreeSet<String> = store.scenarios().map_err(PipelineError::Discovery)?.into_iter().collect();
    names.extend(summaries.iter().map(|s| s.scenario.clone()));
    let candidates: Vec<String> = names
        .into_iter()
        .filter(|s| *s != baseline)
        .filter(|s| {
            let keep = wanted(s, opts);
            if !keep {
                debug!(scenario = %s, "filtered out");
            }
            keep
        })
        .collect();

    let cache = NeighborCache::new(&baseline_set, opts.cache_capacity);
    let mut matcher = Matcher::new(&baseline_set, opts.threshold);
    if let Some(c) = cache.as_ref() {
        matcher = matcher.with_cache(c);
    }

    let results: BTreeMap<String, Result<ScenarioComparison, ScenarioError>> = match opts.mode {
        ComparisonMode::AllPairs if opts.parallel => candidates
            .par_iter()
            .map(|s| (s.clone(), compare_scenario(store, &matcher, s, opts.trace)))
            .collect(),
        ComparisonMode::AllPairs => candidates
            .iter()
            .map(|s| (s.clone(), compare_scenario(store, &matcher, s, opts.trace)))
            .collect(),
    };

    let mut reports = Vec::new();
    let mut skipped = Vec::new();
    let mut traces = BTreeMap::new();
    for (scenario, result) in results {
        match result {
            Ok(cmp) => {
                if let Some(t) = cmp.trace {
                    traces.insert(scenario, t);
                }
                reports.push(cmp.report);
            }
            Err(e) => {
                warn!(scenario = %scenario, error = %e, "scenario skipped");
                skipped.push(SkippedScenario { scenario, reason: e.to_string() });
            }
        }
    }
    info!(compared = reports.len(), skipped = skipped.len(), "comparison finished");

    Ok(ComparisonOutcome {
        baseline,
        baseline_cluster_count: baseline_set.len(),
        threshold: opts.threshold,
        generated_at: chrono::Utc::now(),
        reports,
        skipped,
        traces,
    })
}
