//! Nearest-neighbour alignment of a candidate scenario's clusters against a baseline.
//!
//! Every candidate template is compared with every baseline template under
//! token-level edit distance. The closest baseline cluster is kept (ties go to
//! the smaller cluster id) and the candidate is classified `Matched` when the
//! distance is strictly below the threshold, `New` otherwise.

use crate::cluster::{Cluster, ClusterSet, TokenSequence};
use crate::distance::edit_distance;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use thiserror::Error;

pub const DEFAULT_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("cluster {cluster_id} of '{scenario}' has no nearest neighbour: baseline '{baseline}' is empty")]
    UndefinedNeighbor { scenario: String, cluster_id: u64, baseline: String },
    #[error("scenario '{0}' is the baseline and cannot be compared against itself")]
    SelfComparison(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Matched,
    New,
}

impl Classification {
    pub fn from_distance(distance: usize, threshold: usize) -> Self {
        if distance < threshold {
            Classification::Matched
        } else {
            Classification::New
        }
    }
}

/// Closest baseline cluster for one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub id: u64,
    pub distance: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'a> {
    pub candidate_cluster_id: u64,
    pub candidate_template: &'a TokenSequence,
    pub nearest_baseline_cluster_id: u64,
    pub nearest_baseline_template: &'a TokenSequence,
    pub distance: usize,
    pub classification: Classification,
}

impl MatchResult<'_> {
    pub fn is_new(&self) -> bool {
        self.classification == Classification::New
    }
}

/// Nearest-neighbour results shared across candidate scenarios of one baseline.
///
/// Keyed by candidate template; scenarios often repeat each other's templates,
/// so each distinct template is searched against the baseline once.
pub struct NeighborCache {
    baseline: String,
    inner: Mutex<LruCache<TokenSequence, Neighbor, ahash::RandomState>>,
}

impl NeighborCache {
    /// Returns `None` when `capacity` is zero.
    pub fn new(baseline: &ClusterSet, capacity: usize) -> Option<Self> {
        let cap = NonZeroUsize::new(capacity)?;
        Some(Self {
            baseline: baseline.scenario().to_string(),
            inner: Mutex::new(LruCache::with_hasher(cap, ahash::RandomState::new())),
        })
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, template: &TokenSequence) -> Option<Neighbor> {
        // A poisoned lock only costs a cache miss.
        self.inner.lock().ok()?.get(template).copied()
    }

    fn put(&self, template: &TokenSequence, neighbor: Neighbor) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(template.clone(), neighbor);
        }
    }
}

#[derive(Clone, Copy)]
pub struct Matcher<'b> {
    baseline: &'b ClusterSet,
    threshold: usize,
    cache: Option<&'b NeighborCache>,
}

impl<'b> Matcher<'b> {
    pub fn new(baseline: &'b ClusterSet, threshold: usize) -> Self {
        Self { baseline, threshold, cache: None }
    }

    /// Attaches a cache; ignored if it was built for a different baseline.
    pub fn with_cache(mut self, cache: &'b NeighborCache) -> Self {
        if cache.baseline() == self.baseline.scenario() {
            self.cache = Some(cache);
        } else {
            tracing::debug!(cache = cache.baseline(), baseline = self.baseline.scenario(), "neighbor cache built for another baseline, not used");
        }
        self
    }

    pub fn baseline(&self) -> &'b ClusterSet {
        self.baseline
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Closest baseline cluster to `template`, or `None` for an empty baseline.
    pub fn nearest(&self, template: &TokenSequence) -> Option<Neighbor> {
        if let Some(hit) = self.cache.and_then(|c| c.get(template)) {
            return Some(hit);
        }
        let found = nearest_in(self.baseline, template);
        if let (Some(cache), Some(n)) = (self.cache, found) {
            cache.put(template, n);
        }
        found
    }

    pub fn match_cluster<'c>(&self, cluster: &'c Cluster) -> Result<MatchResult<'c>, MatchError>
    where
        'b: 'c,
    {
        let neighbor = self.nearest(&cluster.template).ok_or_else(|| MatchError::UndefinedNeighbor {
            scenario: cluster.scenario.clone(),
            cluster_id: cluster.id,
            baseline: self.baseline.scenario().to_string(),
        })?;
        let baseline_cluster: &'c Cluster = self
            .baseline
            .get(neighbor.id)
            .ok_or_else(|| MatchError::UndefinedNeighbor {
                scenario: cluster.scenario.clone(),
                cluster_id: cluster.id,
                baseline: self.baseline.scenario().to_string(),
            })?;
        Ok(MatchResult {
            candidate_cluster_id: cluster.id,
            candidate_template: &cluster.template,
            nearest_baseline_cluster_id: baseline_cluster.id,
            nearest_baseline_template: &baseline_cluster.template,
            distance: neighbor.distance,
            classification: Classification::from_distance(neighbor.distance, self.threshold),
        })
    }

    /// Lazily matches every cluster of `candidate`, in the candidate's order.
    pub fn match_set<'c>(&self, candidate: &'c ClusterSet) -> Result<Matches<'c>, MatchError>
    where
        'b: 'c,
    {
        if candidate.scenario() == self.baseline.scenario() {
            return Err(MatchError::SelfComparison(candidate.scenario().to_string()));
        }
        Ok(Matches { matcher: Matcher { baseline: self.baseline, threshold: self.threshold, cache: self.cache }, clusters: candidate.iter() })
    }
}

fn nearest_in(baseline: &ClusterSet, template: &TokenSequence) -> Option<Neighbor> {
    let mut best: Option<Neighbor> = None;
    for b in baseline {
        if let Some(cur) = best {
            // Length difference is a lower bound on the distance.
            let bound = template.len().abs_diff(b.template.len());
            if bound > cur.distance || (bound == cur.distance && b.id > cur.id) {
                continue;
            }
        }
        let distance = edit_distance(template.tokens(), b.template.tokens());
        let better = match best {
            None => true,
            Some(cur) => distance < cur.distance || (distance == cur.distance && b.id < cur.id),
        };
        if better {
            best = Some(Neighbor { id: b.id, distance });
        }
    }
    best
}

/// One-shot iterator over the match results of a candidate scenario.
pub struct Matches<'a> {
    matcher: Matcher<'a>,
    clusters: std::slice::Iter<'a, Cluster>,
}

impl<'a> Iterator for Matches<'a> {
    type Item = Result<MatchResult<'a>, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cluster = self.clusters.next()?;
        Some(self.matcher.match_cluster(cluster))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.clusters.size_hint()
    }
}

impl ExactSizeIterator for Matches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_strict_below_threshold() {
        assert_eq!(Classification::from_distance(2, 3), Classification::Matched);
        assert_eq!(Classification::from_distance(3, 3), Classification::New);
        assert_eq!(Classification::from_distance(0, 0), Classification::New);
    }

    #[test]
    fn length_bound_pruning_keeps_smallest_id_on_ties() {
        let baseline = ClusterSet::from_templates("base", [(9, "a b x"), (4, "a b y"), (6, "a b")]).unwrap();
        let n = nearest_in(&baseline, &TokenSequence::from("a b z")).unwrap();
        assert_eq!(n, Neighbor { id: 4, distance: 1 });
    }

    #[test]
    fn cache_for_other_baseline_is_ignored() {
        let a = ClusterSet::from_templates("a", [(1, "x")]).unwrap();
        let b = ClusterSet::from_templates("b", [(1, "y")]).unwrap();
        let cache = NeighborCache::new(&a, 8).unwrap();
        let m = Matcher::new(&b, 3).with_cache(&cache);
        m.nearest(&TokenSequence::from("x"));
        assert!(cache.is_empty());
        assert!(NeighborCache::new(&a, 0).is_none());
    }
}
