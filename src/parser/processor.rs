//! Replays the syscall-exit event stream into a thread/process tree.
//!
//! The scan keeps explicit per-pid/per-tid tables instead of ambient state so
//! that synthetic event sequences can drive it directly in tests. Nodes are
//! stored in an arena keyed by tid with optional-parent links: the child-side
//! and parent-side records of one clone may arrive in either order, and
//! whichever comes first creates the node.

use crate::parser::event::{EventKind, OffCpuSample, TraceEvent};
use crate::utils::error::ProcessError;
use log::debug;
use std::collections::HashMap;

/// Clone flags the tree reconstruction cannot express. Seeing one means the
/// resulting tree would be silently wrong, so processing refuses instead.
const UNSUPPORTED_CLONE_FLAGS: &[&str] = &["CLONE_PARENT"];

/// One thread (or single-threaded process) in the reconstructed tree.
///
/// Times are relative to the capture start after finalization.
/// `runtime_ns` is `None` for threads still running when the capture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub tid: u32,
    pub parent: Option<u32>,
    pub name: String,
    pub pid_tid: String,
    pub start_time_ns: u64,
    pub runtime_ns: Option<u64>,
    /// (start, length) intervals in nanoseconds, start rebased to capture start
    pub off_cpu: Vec<(u64, u64)>,
}

/// The reconstructed thread/process hierarchy.
///
/// Nodes are kept in creation order; children of a node are ordered by the
/// moment their parent link was established.
#[derive(Debug, Clone, Default)]
pub struct ThreadTree {
    nodes: Vec<ThreadNode>,
    index: HashMap<u32, usize>,
    children: HashMap<u32, Vec<u32>>,
    root: Option<u32>,
}

impl ThreadTree {
    pub fn root(&self) -> Option<&ThreadNode> {
        self.root.and_then(|tid| self.get(tid))
    }

    pub fn get(&self, tid: u32) -> Option<&ThreadNode> {
        self.index.get(&tid).map(|&i| &self.nodes[i])
    }

    pub fn children_of(&self, tid: u32) -> &[u32] {
        self.children.get(&tid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All nodes in creation order
    pub fn nodes(&self) -> &[ThreadNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Scan state for one pass over an ordered event stream.
///
/// Feed events through [`TraceProcessor::handle`], then call
/// [`TraceProcessor::finish`] once the stream is exhausted.
#[derive(Debug)]
pub struct TraceProcessor {
    /// Name of the program actually being profiled; events before the first
    /// record carrying it are launcher/shell noise and are ignored.
    profiled_name: String,
    profile_started: bool,
    /// pid -> tids spawned in that process group
    groups: HashMap<u32, Vec<u32>>,
    start_times: HashMap<u32, u64>,
    exit_times: HashMap<u32, u64>,
    names: HashMap<u32, String>,
    codes: HashMap<u32, String>,
    /// tid -> parent tid; the node arena, in creation order
    parents: HashMap<u32, Option<u32>>,
    order: Vec<u32>,
}

impl TraceProcessor {
    pub fn new(profiled_name: impl Into<String>) -> Self {
        Self {
            profiled_name: profiled_name.into(),
            profile_started: false,
            groups: HashMap::new(),
            start_times: HashMap::new(),
            exit_times: HashMap::new(),
            names: HashMap::new(),
            codes: HashMap::new(),
            parents: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Process a single event, updating the scan tables.
    pub fn handle(&mut self, event: &TraceEvent) -> Result<(), ProcessError> {
        if event.comm == self.profiled_name {
            if !self.profile_started {
                debug!("profile gate opened by {:?} at {}", event.comm, event.time);
            }
            self.profile_started = true;
        } else if !self.profile_started {
            return Ok(());
        }

        match event.kind {
            k if k.is_spawn() => self.handle_spawn(event),
            EventKind::Exec => {
                // Rename on successful exec; the exec timestamp is the thread's
                // start time (the main thread never has a child-side clone record).
                self.start_times.insert(event.tid, event.time);
                self.names.insert(event.tid, event.comm.clone());
                self.codes
                    .entry(event.tid)
                    .or_insert_with(|| format!("{}/{}", event.pid, event.tid));
                // The exec'd thread belongs to its pid's group so a later
                // exit_group closes it too.
                let group = self.groups.entry(event.pid).or_default();
                if !group.contains(&event.tid) {
                    group.push(event.tid);
                }
                self.ensure_node(event.tid, None);
                Ok(())
            }
            EventKind::Exit => {
                self.exit_times.entry(event.tid).or_insert(event.time);
                Ok(())
            }
            EventKind::ExitGroup => {
                let tids = self
                    .groups
                    .get(&event.pid)
                    .ok_or(ProcessError::UnknownProcessGroup(event.pid))?;
                for &tid in tids {
                    self.exit_times.entry(tid).or_insert(event.time);
                }
                Ok(())
            }
            _ => unreachable!("spawn kinds handled above"),
        }
    }

    fn handle_spawn(&mut self, event: &TraceEvent) -> Result<(), ProcessError> {
        for flag in &event.flags {
            if UNSUPPORTED_CLONE_FLAGS.contains(&flag.as_str()) {
                return Err(ProcessError::NotImplemented(flag.clone()));
            }
        }

        if event.ret == 0 {
            // Child-side record: this tid just came alive.
            self.codes
                .insert(event.tid, format!("{}/{}", event.pid, event.tid));
            self.groups.entry(event.pid).or_default().push(event.tid);
            self.start_times.insert(event.tid, event.time);
            self.names.insert(event.tid, event.comm.clone());
            self.ensure_node(event.tid, None);
        } else if event.ret > 0 {
            // Parent-side record: event.tid spawned ret as a new thread/process.
            let child = event.ret as u32;

            if !self.parents.contains_key(&event.tid) {
                self.codes
                    .insert(event.tid, format!("{}/{}", event.pid, event.tid));
                self.groups.entry(event.pid).or_default().push(event.tid);
                self.names.insert(event.tid, event.comm.clone());
                self.ensure_node(event.tid, None);
            }

            self.ensure_node(child, Some(event.tid));
        }
        // Negative return value: the spawn syscall failed, nothing was created.

        Ok(())
    }

    /// Create the node if unseen; otherwise fill in a missing parent link.
    /// An already-set parent is never overwritten.
    fn ensure_node(&mut self, tid: u32, parent: Option<u32>) {
        if let Some(slot) = self.parents.get_mut(&tid) {
            if slot.is_none() && parent.is_some() {
                *slot = parent;
            }
        } else {
            self.parents.insert(tid, parent);
            self.order.push(tid);
        }
    }

    /// Finalize the scan: rebase times to the capture start, attach off-CPU
    /// intervals and produce the tree.
    ///
    /// `start_override` is the capture-wide start time recorded by the capture
    /// tool, when available; otherwise the minimum observed start time is
    /// used. Thread start times and off-CPU intervals are rebased against the
    /// same base, so they share one timeline.
    pub fn finish(
        self,
        offcpu: &[OffCpuSample],
        start_override: Option<u64>,
    ) -> Result<ThreadTree, ProcessError> {
        if self.order.is_empty() {
            return Ok(ThreadTree::default());
        }

        let min_start = match self.start_times.values().min() {
            Some(&t) => t,
            None => return Err(ProcessError::MissingStartTime(self.order[0])),
        };
        let t0 = start_override.unwrap_or(min_start);

        let mut off_cpu_map: HashMap<u32, Vec<(u64, u64)>> = HashMap::new();
        for sample in offcpu {
            off_cpu_map
                .entry(sample.tid)
                .or_default()
                .push((sample.start_ns.saturating_sub(t0), sample.len_ns));
        }

        let mut tree = ThreadTree::default();

        for &tid in &self.order {
            let parent = self.parents[&tid];
            let start = *self
                .start_times
                .get(&tid)
                .ok_or(ProcessError::MissingStartTime(tid))?;
            let name = self
                .names
                .get(&tid)
                .cloned()
                .ok_or(ProcessError::MissingStartTime(tid))?;
            let pid_tid = self
                .codes
                .get(&tid)
                .cloned()
                .ok_or(ProcessError::MissingStartTime(tid))?;

            match parent {
                None => {
                    if let Some(existing) = tree.root {
                        return Err(ProcessError::MultipleRoots(existing, tid));
                    }
                    tree.root = Some(tid);
                }
                Some(p) => tree.children.entry(p).or_default().push(tid),
            }

            tree.index.insert(tid, tree.nodes.len());
            tree.nodes.push(ThreadNode {
                tid,
                parent,
                name,
                pid_tid,
                start_time_ns: start.saturating_sub(t0),
                runtime_ns: self.exit_times.get(&tid).map(|&e| e.saturating_sub(start)),
                off_cpu: off_cpu_map.remove(&tid).unwrap_or_default(),
            });
        }

        debug!(
            "reconstructed {} threads, root {:?}",
            tree.nodes.len(),
            tree.root
        );

        Ok(tree)
    }

    /// Run a full event stream through a fresh processor.
    pub fn process(
        profiled_name: &str,
        events: &[TraceEvent],
        offcpu: &[OffCpuSample],
        start_override: Option<u64>,
    ) -> Result<ThreadTree, ProcessError> {
        let mut processor = TraceProcessor::new(profiled_name);
        for event in events {
            processor.handle(event)?;
        }
        processor.finish(offcpu, start_override)
    }
}
