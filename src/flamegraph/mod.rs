//! Flame graph compression.
//!
//! The sampling pipeline writes uncompressed flame graph trees per thread
//! and event type; large captures produce trees with far more blocks than a
//! viewer can render. This module folds blocks below a significance cutoff
//! into synthetic "(compressed)" nodes that the viewer can reopen on demand.

pub mod block;
pub mod compress;

pub use block::FlameBlock;
pub use compress::compress;
