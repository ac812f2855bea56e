pub mod distance;
pub mod cluster;
pub mod store;
pub mod summary;
pub mod baseline;
pub mod matcher;
pub mod report;
pub mod pipeline;

pub use cluster::{Cluster, ClusterSet, TokenSequence};
pub use matcher::{Classification, MatchResult, Matcher};
pub use pipeline::{run, CompareOpts};
