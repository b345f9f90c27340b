//! Tree assembly and time normalization.
//!
//! Turns the parser's thread tree plus session metadata into the nested,
//! millisecond-normalized record the viewer consumes.

pub mod json_tree;
pub mod metadata;

pub use json_tree::to_json_tree;
pub use metadata::{GeneralMetric, MetricInfo, SessionMetadata};
