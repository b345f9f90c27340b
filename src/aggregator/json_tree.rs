//! Assembles the reconstructed thread tree into its nested JSON form.
//!
//! Pure, derived view: nanosecond times become milliseconds, unknown runtimes
//! stay `null`, and per-thread metadata (sampled time, start callchain, metric
//! titles) is merged in. Only the root carries session-wide fields.

use crate::aggregator::metadata::SessionMetadata;
use crate::parser::{ThreadNode, ThreadTree};
use crate::utils::config::NS_PER_MS;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Build the nested JSON record for a thread tree.
///
/// An empty tree serializes to `{}`. Thread depth is capture-controlled, so
/// the walk runs on an explicit stack.
pub fn to_json_tree(tree: &ThreadTree, meta: &SessionMetadata) -> Value {
    let Some(root) = tree.root() else {
        return Value::Object(Map::new());
    };

    // Preorder, then build children before parents by walking it backwards.
    let mut order = Vec::with_capacity(tree.len());
    let mut stack = vec![root.tid];
    while let Some(tid) = stack.pop() {
        order.push(tid);
        stack.extend(tree.children_of(tid).iter().copied());
    }

    let mut built: HashMap<u32, Value> = HashMap::new();
    for &tid in order.iter().rev() {
        let Some(node) = tree.get(tid) else { continue };

        let children: Vec<Value> = tree
            .children_of(tid)
            .iter()
            .map(|c| built.remove(c).unwrap_or(Value::Null))
            .collect();

        built.insert(tid, node_json(node, meta, children));
    }

    let mut root_json = built.remove(&root.tid).unwrap_or(Value::Null);
    if let Value::Object(obj) = &mut root_json {
        obj.insert(
            "general_metrics".to_string(),
            json!(meta.general_metrics),
        );
        obj.insert("src".to_string(), json!(meta.src));
        obj.insert("src_index".to_string(), json!(meta.src_index));
    }
    root_json
}

fn node_json(node: &ThreadNode, meta: &SessionMetadata, children: Vec<Value>) -> Value {
    // Sampled-time and flame-file keys use the same pid_tid form with the
    // separator flattened for the filesystem.
    let key = node.pid_tid.replace('/', "_");

    let runtime_ms = node.runtime_ns.map(|ns| ns as f64 / NS_PER_MS);
    let sampled_time_ms = meta
        .sampled_times
        .get(&key)
        .map(|&ns| ns as f64 / NS_PER_MS)
        .or(runtime_ms);

    let off_cpu: Vec<(f64, f64)> = node
        .off_cpu
        .iter()
        .map(|&(start, len)| (start as f64 / NS_PER_MS, len as f64 / NS_PER_MS))
        .collect();

    let start_callchain = meta
        .callchains
        .get(&node.tid.to_string())
        .cloned()
        .unwrap_or_default();

    json!({
        "id": key,
        "start_time_ms": node.start_time_ns as f64 / NS_PER_MS,
        "runtime_ms": runtime_ms,
        "sampled_time_ms": sampled_time_ms,
        "name": node.name,
        "pid_tid": node.pid_tid,
        "off_cpu": off_cpu,
        "start_callchain": start_callchain,
        "metrics": meta.metrics,
        "children": children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{EventKind, TraceEvent, TraceProcessor};

    fn event(kind: EventKind, comm: &str, pid: u32, tid: u32, time: u64, ret: i64) -> TraceEvent {
        TraceEvent {
            kind,
            comm: comm.to_string(),
            pid,
            tid,
            time,
            ret,
            flags: vec![],
        }
    }

    #[test]
    fn test_empty_tree_is_empty_record() {
        let tree = ThreadTree::default();
        let out = to_json_tree(&tree, &SessionMetadata::default());
        assert_eq!(out, json!({}));
    }

    #[test]
    fn test_single_thread_conversion() {
        let events = vec![
            event(EventKind::Exec, "a.out", 10, 10, 1, 0),
            event(EventKind::ExitGroup, "a.out", 10, 10, 21476, 0),
        ];

        let tree = TraceProcessor::process("a.out", &events, &[], None).unwrap();
        let out = to_json_tree(&tree, &SessionMetadata::default());

        assert_eq!(out["id"], "10_10");
        assert_eq!(out["pid_tid"], "10/10");
        assert_eq!(out["start_time_ms"], 0.0);
        assert_eq!(out["runtime_ms"], 0.021475);
        // No sampled-time cache: falls back to the runtime.
        assert_eq!(out["sampled_time_ms"], 0.021475);
        assert_eq!(out["children"], json!([]));
        assert!(out.get("general_metrics").is_some());
    }

    #[test]
    fn test_unknown_runtime_stays_null() {
        let events = vec![
            event(EventKind::Exec, "a.out", 10, 10, 1_000_000, 0),
            event(EventKind::Clone3, "a.out", 10, 10, 2_000_000, 11),
            event(EventKind::Clone3, "a.out", 10, 11, 1_500_000, 0),
        ];

        let tree = TraceProcessor::process("a.out", &events, &[], None).unwrap();
        let out = to_json_tree(&tree, &SessionMetadata::default());

        assert_eq!(out["runtime_ms"], Value::Null);
        assert_eq!(out["sampled_time_ms"], Value::Null);
        assert_eq!(out["children"][0]["id"], "10_11");
        assert_eq!(out["children"][0]["start_time_ms"], 0.5);
        // Root-only fields never appear on child nodes.
        assert!(out["children"][0].get("src_index").is_none());
    }

    #[test]
    fn test_metadata_merged_per_node() {
        let events = vec![
            event(EventKind::Exec, "a.out", 10, 10, 1000, 0),
            event(EventKind::Clone3, "a.out", 10, 10, 2000, 11),
            event(EventKind::Clone3, "a.out", 10, 11, 1500, 0),
        ];
        let tree = TraceProcessor::process("a.out", &events, &[], None).unwrap();

        let mut meta = SessionMetadata::default();
        meta.sampled_times.insert("10_11".to_string(), 2_000_000);
        meta.callchains
            .insert("11".to_string(), vec!["main".to_string(), "worker".to_string()]);
        meta.metrics.insert(
            "task-clock".to_string(),
            crate::aggregator::MetricInfo {
                title: "CPU time".to_string(),
                flame_graph: true,
            },
        );

        let out = to_json_tree(&tree, &meta);
        let child = &out["children"][0];

        assert_eq!(child["sampled_time_ms"], 2.0);
        assert_eq!(child["start_callchain"], json!(["main", "worker"]));
        assert_eq!(child["metrics"]["task-clock"]["title"], "CPU time");
        assert_eq!(out["metrics"]["task-clock"]["flame_graph"], true);
    }
}
