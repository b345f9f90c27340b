//! Trace event and off-CPU sample decoding.
//!
//! The trace-replay subprocess prints one JSON record per line for every
//! syscall-exit event it observed. The capture is assumed to be well-formed
//! output of the capture tool, so any record that does not match the schema
//! is a fatal error rather than something to skip.

use crate::utils::config::OFFCPU_SENTINEL;
use crate::utils::error::EventError;
use serde::{Deserialize, Serialize};

/// Syscall family a trace record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Clone,
    Clone3,
    Fork,
    Vfork,
    Exec,
    Exit,
    ExitGroup,
}

impl EventKind {
    /// True for the clone/clone3/fork/vfork family
    pub fn is_spawn(self) -> bool {
        matches!(
            self,
            EventKind::Clone | EventKind::Clone3 | EventKind::Fork | EventKind::Vfork
        )
    }
}

/// A single syscall-exit record from the replay subprocess
///
/// `ret` carries the syscall return value: 0 marks the child-side record of a
/// spawn event, a positive value is the parent-side record naming the new tid.
/// Exit records ignore it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub kind: EventKind,
    pub comm: String,
    pub pid: u32,
    pub tid: u32,
    /// Monotonic timestamp in nanoseconds
    pub time: u64,
    #[serde(default)]
    pub ret: i64,
    /// Clone flag names, when the capture tool recorded them
    #[serde(default)]
    pub flags: Vec<String>,
}

/// One interval from the off-CPU sampling side-channel, already in
/// absolute nanoseconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffCpuSample {
    pub pid: u32,
    pub tid: u32,
    pub start_ns: u64,
    pub len_ns: u64,
}

/// Decode the full stdout blob of the replay subprocess into events.
///
/// The blob is consumed only after the subprocess terminated: the replay
/// tool's framing is not strictly ordered until its finalization step runs,
/// so incremental parsing would be unsound.
pub fn parse_events(blob: &str) -> Result<Vec<TraceEvent>, EventError> {
    let mut events = Vec::new();

    for (idx, line) in blob.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: TraceEvent =
            serde_json::from_str(line).map_err(|e| EventError::MalformedEvent {
                line: idx + 1,
                reason: e.to_string(),
            })?;
        events.push(event);
    }

    Ok(events)
}

/// Parse the off-CPU side-channel file: one `pid tid walltime len` row per
/// line, wall time in fractional seconds, length in nanoseconds.
///
/// Rows carrying the sampler's placeholder wall time are discarded.
pub fn parse_offcpu(data: &str) -> Result<Vec<OffCpuSample>, EventError> {
    let mut samples = Vec::new();

    for (idx, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (pid, tid, wall, len) = match (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => {
                return Err(EventError::MalformedOffCpu {
                    line: idx + 1,
                    reason: "expected 4 fields".to_string(),
                })
            }
        };

        if wall == OFFCPU_SENTINEL {
            continue;
        }

        let malformed = |reason: &str| EventError::MalformedOffCpu {
            line: idx + 1,
            reason: reason.to_string(),
        };

        let pid: u32 = pid.parse().map_err(|_| malformed("bad pid"))?;
        let tid: u32 = tid.parse().map_err(|_| malformed("bad tid"))?;
        let wall: f64 = wall.parse().map_err(|_| malformed("bad wall time"))?;
        let len_ns: u64 = len.parse().map_err(|_| malformed("bad length"))?;

        samples.push(OffCpuSample {
            pid,
            tid,
            start_ns: (wall * 1e9).round() as u64,
            len_ns,
        });
    }

    Ok(samples)
}
