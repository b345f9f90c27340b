//! Session metadata merged into the assembled tree.
//!
//! The sampling pipeline writes `processed/metadata.json` with the capture
//! start time, per-thread sampled on-CPU times and start callchains; the rest
//! of the fields (metric titles, general-analysis rows, source listing) are
//! filled in by the session loader from their own files and default empty.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One profiled event type: its display title and whether the sampling
/// pipeline produced flame graphs for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInfo {
    pub title: String,
    pub flame_graph: bool,
}

/// One row of the general-analysis report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralMetric {
    pub metric: String,
    pub title: String,
    pub value: String,
}

/// Everything about a session that the tree assembly needs besides the
/// reconstructed thread tree itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Capture-wide start timestamp in nanoseconds, when the capture tool
    /// recorded one.
    #[serde(default)]
    pub start_time: Option<u64>,
    /// Sampled on-CPU time in nanoseconds, keyed by `<pid>_<tid>`.
    #[serde(default)]
    pub sampled_times: HashMap<String, u64>,
    /// Start callchain frames, keyed by tid.
    #[serde(default)]
    pub callchains: HashMap<String, Vec<String>>,
    /// Event type -> title/flame-graph flag, from the event dictionary file.
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricInfo>,
    /// General-analysis rows; `None` when the report is absent or does not
    /// match the expected schema.
    #[serde(default)]
    pub general_metrics: Option<Vec<GeneralMetric>>,
    /// Source listing: short name -> path inside the session's source store.
    #[serde(default)]
    pub src: BTreeMap<String, String>,
    /// Short names in source-index order.
    #[serde(default)]
    pub src_index: Vec<String>,
}
