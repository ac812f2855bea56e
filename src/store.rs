use crate::cluster::{Cluster, ClusterSet, ClusterSetError, TokenSequence};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no cluster store for scenario '{scenario}' at {}", path.display())]
    NotFound { scenario: String, path: PathBuf },
    #[error("malformed cluster store for scenario '{scenario}': {reason}")]
    Malformed { scenario: String, reason: String },
    #[error("i/o error reading {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl StoreError {
    fn malformed(scenario: &str, reason: impl Into<String>) -> Self {
        StoreError::Malformed { scenario: scenario.to_string(), reason: reason.into() }
    }
}

/// Source of persisted per-scenario cluster collections.
pub trait ClusterStore: Send + Sync {
    /// Scenario names available in the store, sorted.
    fn scenarios(&self) -> Result<Vec<String>, StoreError>;
    fn load(&self, scenario: &str) -> Result<ClusterSet, StoreError>;
}

/// Directory of `<scenario>.json` files written by Drain3's file persistence.
#[derive(Debug, Clone)]
pub struct Drain3Store {
    dir: PathBuf,
}

impl Drain3Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, scenario: &str) -> PathBuf {
        self.dir.join(format!("{scenario}.json"))
    }
}

impl ClusterStore for Drain3Store {
    fn scenarios(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn load(&self, scenario: &str) -> Result<ClusterSet, StoreError> {
        let path = self.path_for(scenario);
        load_file(&path, scenario)
    }
}

/// Reads one Drain3 state file as the cluster set of `scenario`.
pub fn load_file(path: &Path, scenario: &str) -> Result<ClusterSet, StoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound { scenario: scenario.to_string(), path: path.to_path_buf() });
        }
        Err(source) => return Err(StoreError::Io { path: path.to_path_buf(), source }),
    };
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| StoreError::malformed(scenario, format!("invalid JSON: {e}")))?;
    parse_state(&value, scenario)
}

/// Scenario name for a store file: the file name without its `.json` extension.
pub fn scenario_name(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

/// True when both paths resolve to the same file; unresolvable paths fall back to a literal comparison.
pub fn same_store(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[derive(Debug, Deserialize)]
struct RawCluster {
    cluster_id: Option<u64>,
    log_template_tokens: Option<RawTokens>,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTokens {
    Tuple {
        #[serde(rename = "py/tuple")]
        tuple: Vec<String>,
    },
    List(Vec<String>),
}

impl RawTokens {
    fn into_tokens(self) -> Vec<String> {
        match self {
            RawTokens::Tuple { tuple } => tuple,
            RawTokens::List(list) => list,
        }
    }
}

/// Validates a parsed Drain3 state document into a `ClusterSet`.
pub fn parse_state(value: &Value, scenario: &str) -> Result<ClusterSet, StoreError> {
    let id_to_cluster = value
        .get("id_to_cluster")
        .and_then(Value::as_object)
        .ok_or_else(|| StoreError::malformed(scenario, "missing 'id_to_cluster' object"))?;

    // Bounded caches wrap the entries in `_Cache__data`; a plain dict holds them directly.
    let entries: &Map<String, Value> = match id_to_cluster.get("_Cache__data") {
        Some(data) => data
            .as_object()
            .ok_or_else(|| StoreError::malformed(scenario, "'_Cache__data' is not an object"))?,
        None => id_to_cluster,
    };

    let mut set = ClusterSet::new(scenario);
    for (key, entry) in entries {
        if key.starts_with("py/") {
            continue;
        }
        let raw: RawCluster = serde_json::from_value(entry.clone())
            .map_err(|e| StoreError::malformed(scenario, format!("entry '{key}': {e}")))?;
        let id = raw
            .cluster_id
            .ok_or_else(|| StoreError::malformed(scenario, format!("entry '{key}': missing 'cluster_id'")))?;
        let tokens = raw
            .log_template_tokens
            .ok_or_else(|| StoreError::malformed(scenario, format!("cluster {id}: missing 'log_template_tokens'")))?
            .into_tokens();
        let cluster = Cluster { id, template: TokenSequence::new(tokens), scenario: scenario.to_string(), size: raw.size };
        set.insert(cluster).map_err(|e: ClusterSetError| StoreError::malformed(scenario, e.to_string()))?;
    }
    Ok(set)
}
