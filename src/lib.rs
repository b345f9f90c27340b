//! threadflame
//!
//! Thread/process tree reconstruction and flame graph compression for
//! kernel-level profiling captures.
//!
//! A capture session directory holds a raw syscall trace, an off-CPU
//! sampling side-channel and the sampling pipeline's per-thread flame graph
//! trees. This crate replays the trace into a timestamped thread hierarchy,
//! assembles it into the viewer's JSON form and compresses flame graphs with
//! a threshold-based merge/split that preserves exact sample totals.
//!
//! This crate provides the core implementation for the `threadflame` CLI
//! tool.

pub mod aggregator;
pub mod flamegraph;
pub mod parser;
pub mod session;
pub mod utils;
