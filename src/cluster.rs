use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One normalized log template, token by token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSequence(Vec<String>);

impl TokenSequence {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TokenSequence {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for TokenSequence {
    /// Splits on whitespace, the way Drain tokenizes a masked line.
    fn from(s: &str) -> Self {
        s.split_whitespace().collect()
    }
}

impl fmt::Display for TokenSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, tok) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{tok}'")?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u64,
    pub template: TokenSequence,
    pub scenario: String,
    /// Number of raw lines the miner matched to this cluster, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterSetError {
    #[error("cluster {id} has an empty template")]
    EmptyTemplate { id: u64 },
    #[error("duplicate cluster id {id}")]
    DuplicateId { id: u64 },
    #[error("cluster {id} belongs to scenario '{found}', expected '{expected}'")]
    ForeignCluster { id: u64, expected: String, found: String },
}

/// All clusters of one scenario, keyed by id, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSet {
    scenario: String,
    clusters: Vec<Cluster>,
    index: HashMap<u64, usize>,
}

impl ClusterSet {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self { scenario: scenario.into(), clusters: Vec::new(), index: HashMap::new() }
    }

    /// Builds a set from `(id, template)` pairs in the given order.
    pub fn from_templates<I, T>(scenario: &str, templates: I) -> Result<Self, ClusterSetError>
    where
        I: IntoIterator<Item = (u64, T)>,
        T: Into<TokenSequence>,
    {
        let mut set = Self::new(scenario);
        for (id, template) in templates {
            set.insert(Cluster { id, template: template.into(), scenario: scenario.to_string(), size: None })?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, cluster: Cluster) -> Result<(), ClusterSetError> {
        if cluster.template.is_empty() {
            return Err(ClusterSetError::EmptyTemplate { id: cluster.id });
        }
        if cluster.scenario != self.scenario {
            return Err(ClusterSetError::ForeignCluster {
                id: cluster.id,
                expected: self.scenario.clone(),
                found: cluster.scenario,
            });
        }
        if self.index.contains_key(&cluster.id) {
            return Err(ClusterSetError::DuplicateId { id: cluster.id });
        }
        self.index.insert(cluster.id, self.clusters.len());
        self.clusters.push(cluster);
        Ok(())
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn get(&self, id: u64) -> Option<&Cluster> {
        self.index.get(&id).map(|&i| &self.clusters[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total matched lines, or `None` if any cluster lacks a size.
    pub fn line_count(&self) -> Option<u64> {
        self.clusters.iter().map(|c| c.size).sum()
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a Cluster;
    type IntoIter = std::slice::Iter<'a, Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}
