//! Trace event decoding and thread-tree reconstruction.
//!
//! This module handles:
//! - Decoding the replay subprocess's line-JSON event records
//! - Parsing the off-CPU sampling side-channel
//! - Replaying clone/exec/exit rules into a thread/process tree

pub mod event;
pub mod processor;

// Re-export main types
pub use event::{parse_events, parse_offcpu, EventKind, OffCpuSample, TraceEvent};
pub use processor::{ThreadNode, ThreadTree, TraceProcessor};
