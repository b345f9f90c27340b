//! Configuration and constants for the CLI and session layout.

/// Default compression threshold (share of total samples below which a block
/// is folded into a "(compressed)" node)
pub const DEFAULT_THRESHOLD: f64 = 0.025;

/// Wall-time value written by the off-CPU sampler for a placeholder row.
/// Rows carrying it must be discarded.
pub const OFFCPU_SENTINEL: &str = "18446744069.414584320";

/// Name used for synthetic nodes holding folded flame graph blocks
pub const COMPRESSED_NODE_NAME: &str = "(compressed)";

/// Raw trace file inside a session directory (replay input)
pub const RAW_TRACE_FILE: &str = "syscalls.data";

/// Off-CPU side-channel file inside a session directory
pub const OFFCPU_FILE: &str = "offcpu.data";

/// Metric title dictionary inside a session directory
pub const EVENT_DICT_FILE: &str = "event_dict.data";

/// Subdirectory with capture post-processing output
pub const PROCESSED_DIR: &str = "processed";

/// Per-session metadata inside the processed subdirectory
pub const METADATA_FILE: &str = "metadata.json";

/// General analysis report inside the processed subdirectory
pub const GENERAL_ANALYSIS_FILE: &str = "general_analysis.csv";

/// Source listing inside the processed subdirectory; blobs live next to it
/// under [`SRC_DIR`]
pub const SRC_INDEX_FILE: &str = "src_index.data";

/// Source blob subdirectory inside the processed subdirectory
pub const SRC_DIR: &str = "src";

/// Suffix of per-event callchain dictionaries inside the processed
/// subdirectory
pub const CALLCHAIN_SUFFIX: &str = "_callchains.data";

/// Suffix of symbol map files inside a session directory
pub const MAP_SUFFIX: &str = ".map";

/// Default trace-replay invocation: `perf script` over the raw trace with the
/// bundled event-handler script
pub const REPLAY_PROGRAM: &str = "perf";

/// Event handler passed to the replay tool's scripting engine
pub const REPLAY_HANDLER: &str = "event_handler.py";

/// Expected header of the general analysis report. Anything else means the
/// report was produced by an incompatible tool version and is treated as
/// "not available".
pub const GENERAL_ANALYSIS_HEADER: &str = "metric,title,value";

/// Nanoseconds per millisecond, for output time normalization
pub const NS_PER_MS: f64 = 1_000_000.0;
