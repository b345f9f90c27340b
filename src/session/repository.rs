//! Read-only access to one on-disk profiling session.
//!
//! A session directory holds the raw trace (`syscalls.data`), the off-CPU
//! side-channel, symbol maps, the event dictionary and a `processed/`
//! subdirectory written by the sampling pipeline (metadata, per-thread flame
//! graph trees, callchain dictionaries, general analysis, source store).
//!
//! The thread tree requires replaying the raw trace through an external tool,
//! so it is built on first request and memoized; everything else is loaded at
//! open time or read on demand. No accessor mutates session state.

use crate::aggregator::{to_json_tree, GeneralMetric, MetricInfo, SessionMetadata};
use crate::flamegraph::{compress, FlameBlock};
use crate::parser::{parse_events, parse_offcpu, ThreadTree, TraceProcessor};
use crate::session::identifier::SessionId;
use crate::utils::config::{
    CALLCHAIN_SUFFIX, EVENT_DICT_FILE, GENERAL_ANALYSIS_FILE, GENERAL_ANALYSIS_HEADER,
    MAP_SUFFIX, METADATA_FILE, OFFCPU_FILE, PROCESSED_DIR, RAW_TRACE_FILE, REPLAY_HANDLER,
    REPLAY_PROGRAM, SRC_DIR, SRC_INDEX_FILE,
};
use crate::utils::error::SessionError;
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// How to obtain the raw event stream from a session's trace file.
///
/// The default shells out to `perf script` with the bundled event handler;
/// tests substitute a command that prints a pre-recorded stream.
#[derive(Debug, Clone)]
pub struct ReplayCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ReplayCommand {
    fn default() -> Self {
        Self {
            program: REPLAY_PROGRAM.to_string(),
            args: ["script", "-f", "-i", RAW_TRACE_FILE, "-s", REPLAY_HANDLER]
                .map(str::to_string)
                .to_vec(),
        }
    }
}

impl ReplayCommand {
    /// Run the replay in `dir` and capture the whole stdout.
    ///
    /// The replay tool's output framing is only settled once its finalization
    /// step has run, so the stream is never parsed incrementally.
    fn run(&self, dir: &Path) -> Result<String, SessionError> {
        debug!("replaying trace: {} {:?}", self.program, self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .output()
            .map_err(|e| SessionError::ReplaySpawn(self.program.clone(), e))?;

        if !output.status.success() {
            return Err(SessionError::ReplayFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// One line of a symbol map: an address range and the symbol covering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub start: u64,
    pub end: u64,
    pub name: String,
}

/// One opened session.
pub struct Session {
    id: SessionId,
    path: PathBuf,
    metadata: SessionMetadata,
    replay: ReplayCommand,
    tree: OnceLock<ThreadTree>,
}

impl Session {
    /// Open a session directory under `storage`.
    ///
    /// Loads the metadata, event dictionary, general analysis and source
    /// listing eagerly; each of those files is optional and its absence means
    /// an empty fallback. The thread tree is not built until requested.
    pub fn open(storage: &Path, id: &str) -> Result<Session, SessionError> {
        let id: SessionId = id.parse()?;
        let path = storage.join(&id.raw);
        // Fail now rather than on the first accessor.
        std::fs::metadata(&path)?;

        let processed = path.join(PROCESSED_DIR);

        let mut metadata: SessionMetadata = match read_optional(&processed.join(METADATA_FILE))? {
            Some(blob) => serde_json::from_str(&blob)?,
            None => SessionMetadata::default(),
        };

        if let Some(blob) = read_optional(&path.join(EVENT_DICT_FILE))? {
            metadata.metrics = parse_event_dict(&blob)?;
        }

        metadata.general_metrics = read_optional(&processed.join(GENERAL_ANALYSIS_FILE))?
            .and_then(|blob| parse_general_analysis(&blob));

        if let Some(blob) = read_optional(&processed.join(SRC_INDEX_FILE))? {
            for line in blob.lines().filter(|l| !l.trim().is_empty()) {
                let (short, src_path) = line.split_once(' ').ok_or_else(|| {
                    SessionError::MalformedMetadata(format!("source index line {line:?}"))
                })?;
                metadata.src_index.push(short.to_string());
                metadata.src.insert(short.to_string(), src_path.to_string());
            }
        }

        Ok(Session {
            id,
            path,
            metadata,
            replay: ReplayCommand::default(),
            tree: OnceLock::new(),
        })
    }

    /// Replace the trace-replay invocation (used by tests to replay from a
    /// pre-recorded stream).
    pub fn with_replay(mut self, replay: ReplayCommand) -> Self {
        self.replay = replay;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// The reconstructed thread tree, built on first call and reused.
    ///
    /// Safe to call concurrently: losing the `get_or_init` race only discards
    /// a redundantly built tree.
    pub fn thread_tree(&self) -> Result<&ThreadTree, SessionError> {
        if let Some(tree) = self.tree.get() {
            return Ok(tree);
        }

        let stdout = self.replay.run(&self.path)?;
        let events = parse_events(&stdout)?;
        let offcpu = match read_optional(&self.path.join(OFFCPU_FILE))? {
            Some(blob) => parse_offcpu(&blob)?,
            None => Vec::new(),
        };

        let tree =
            TraceProcessor::process(&self.id.name, &events, &offcpu, self.metadata.start_time)?;
        Ok(self.tree.get_or_init(|| tree))
    }

    /// The nested millisecond-normalized JSON form of the thread tree;
    /// `{}` for a capture with no observed threads.
    pub fn json_tree(&self) -> Result<serde_json::Value, SessionError> {
        Ok(to_json_tree(self.thread_tree()?, &self.metadata))
    }

    /// Compressed flame graphs for one thread: event type -> [aggregated,
    /// time-ordered]. Computed per call at the given threshold; `None` when
    /// the sampling pipeline produced no flame data for the thread.
    pub fn flame_graph(
        &self,
        pid: u32,
        tid: u32,
        threshold: f64,
    ) -> Result<Option<BTreeMap<String, [FlameBlock; 2]>>, SessionError> {
        let file = self
            .path
            .join(PROCESSED_DIR)
            .join(format!("{pid}_{tid}.json"));
        let Some(blob) = read_optional(&file)? else {
            return Ok(None);
        };

        // Flame trees are as deep as the profiled call stacks, which can
        // exceed serde_json's recursion limit; deserialize through a
        // stack-growing adapter instead.
        let mut de = serde_json::Deserializer::from_str(&blob);
        de.disable_recursion_limit();
        let raw: BTreeMap<String, [FlameBlock; 2]> =
            serde::Deserialize::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        let out = raw
            .into_iter()
            .map(|(event, [aggregated, ordered])| {
                let pair = [
                    compress(&aggregated, aggregated.value, false, threshold),
                    compress(&ordered, ordered.value, true, threshold),
                ];
                (event, pair)
            })
            .collect();

        Ok(Some(out))
    }

    /// Compressed-symbol to callchain-frame dictionaries, grouped by event
    /// type.
    pub fn callchain_mappings(
        &self,
    ) -> Result<BTreeMap<String, BTreeMap<String, Vec<String>>>, SessionError> {
        let mut out = BTreeMap::new();

        let processed = self.path.join(PROCESSED_DIR);
        let entries = match std::fs::read_dir(&processed) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(event) = name.strip_suffix(CALLCHAIN_SUFFIX) else {
                continue;
            };

            let blob = std::fs::read_to_string(entry.path())?;
            out.insert(event.to_string(), serde_json::from_str(&blob)?);
        }

        Ok(out)
    }

    /// Every symbol map in the session directory, keyed by map name, entries
    /// sorted by start address. Malformed lines are logged and skipped; the
    /// rest of the listing is still returned.
    pub fn symbol_maps(&self) -> Result<BTreeMap<String, Vec<SymbolEntry>>, SessionError> {
        let mut out = BTreeMap::new();

        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(map_name) = name.strip_suffix(MAP_SUFFIX) else {
                continue;
            };

            let blob = std::fs::read_to_string(entry.path())?;
            let mut entries = Vec::new();
            for line in blob.lines().filter(|l| !l.trim().is_empty()) {
                match parse_symbol_line(line) {
                    Some(symbol) => entries.push(symbol),
                    None => warn!("skipping malformed symbol map line in {name}: {line:?}"),
                }
            }
            entries.sort_by_key(|s| (s.start, s.end));

            out.insert(map_name.to_string(), entries);
        }

        Ok(out)
    }

    /// Source blob by its short name; `None` when the session carries no
    /// source store or the name is unknown.
    pub fn source_blob(&self, short_name: &str) -> Result<Option<String>, SessionError> {
        // Short names are flat tokens; anything path-like is not a valid key.
        if short_name.is_empty() || short_name.contains(['/', '\\']) || short_name == ".." {
            return Ok(None);
        }

        let file = self
            .path
            .join(PROCESSED_DIR)
            .join(SRC_DIR)
            .join(short_name);
        read_optional(&file)
    }

    /// General-analysis rows, or `None` when the report is absent or does not
    /// match the expected schema.
    pub fn general_analysis(&self) -> Option<&[GeneralMetric]> {
        self.metadata.general_metrics.as_deref()
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, SessionError> {
    match std::fs::read_to_string(path) {
        Ok(blob) => Ok(Some(blob)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `<event-name> <0|1> <title...>` per line; the flag marks whether flame
/// graphs exist for the event type.
fn parse_event_dict(blob: &str) -> Result<BTreeMap<String, MetricInfo>, SessionError> {
    let mut metrics = BTreeMap::new();

    for line in blob.lines().filter(|l| !l.trim().is_empty()) {
        let malformed = || SessionError::MalformedMetadata(format!("event dictionary line {line:?}"));

        let (name, rest) = line.split_once(' ').ok_or_else(malformed)?;
        let (flag, title) = rest.split_once(' ').unwrap_or((rest, ""));
        let flame_graph = match flag {
            "0" => false,
            "1" => true,
            _ => return Err(malformed()),
        };

        metrics.insert(
            name.to_string(),
            MetricInfo {
                title: title.to_string(),
                flame_graph,
            },
        );
    }

    Ok(metrics)
}

/// Fixed-schema CSV; any deviation from the expected header or row shape
/// means an incompatible producer and the report is treated as unavailable.
fn parse_general_analysis(blob: &str) -> Option<Vec<GeneralMetric>> {
    let mut lines = blob.lines();
    if lines.next()?.trim() != GENERAL_ANALYSIS_HEADER {
        debug!("general analysis header mismatch, report unavailable");
        return None;
    }

    let mut rows = Vec::new();
    for line in lines.filter(|l| !l.trim().is_empty()) {
        let mut fields = line.splitn(3, ',');
        let (metric, title, value) = (fields.next()?, fields.next()?, fields.next()?);
        rows.push(GeneralMetric {
            metric: metric.to_string(),
            title: title.to_string(),
            value: value.to_string(),
        });
    }

    Some(rows)
}

/// `start end name` with hexadecimal addresses, `0x` prefix optional.
fn parse_symbol_line(line: &str) -> Option<SymbolEntry> {
    let mut fields = line.trim().splitn(3, ' ');
    let start = parse_hex(fields.next()?)?;
    let end = parse_hex(fields.next()?)?;
    let name = fields.next()?.trim();
    if name.is_empty() {
        return None;
    }

    Some(SymbolEntry {
        start,
        end,
        name: name.to_string(),
    })
}

fn parse_hex(token: &str) -> Option<u64> {
    let token = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(token, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_dict() {
        let metrics = parse_event_dict("task-clock 1 CPU time\noffcpu-time 0 Off-CPU time\n")
            .unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["task-clock"].title, "CPU time");
        assert!(metrics["task-clock"].flame_graph);
        assert!(!metrics["offcpu-time"].flame_graph);
    }

    #[test]
    fn test_parse_event_dict_rejects_bad_flag() {
        assert!(parse_event_dict("task-clock yes CPU time\n").is_err());
    }

    #[test]
    fn test_general_analysis_header_must_match_exactly() {
        assert!(parse_general_analysis("metric,title,value\na,b,c\n").is_some());
        assert!(parse_general_analysis("metric,title,values\na,b,c\n").is_none());
        assert!(parse_general_analysis("").is_none());
    }

    #[test]
    fn test_general_analysis_value_may_contain_commas() {
        let rows = parse_general_analysis("metric,title,value\ncpu,CPU model,Xeon, 2.4GHz\n")
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "Xeon, 2.4GHz");
    }

    #[test]
    fn test_parse_symbol_line() {
        assert_eq!(
            parse_symbol_line("0x1000 0x2fff my_symbol with spaces"),
            Some(SymbolEntry {
                start: 0x1000,
                end: 0x2fff,
                name: "my_symbol with spaces".to_string(),
            })
        );
        assert_eq!(parse_symbol_line("1000 2fff plain"),
            Some(SymbolEntry { start: 0x1000, end: 0x2fff, name: "plain".to_string() }));
        assert!(parse_symbol_line("zzz 2fff bad").is_none());
        assert!(parse_symbol_line("0x1000 0x2fff").is_none());
    }
}
