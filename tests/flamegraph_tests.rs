//! Compression invariants across thresholds and inputs.

use pretty_assertions::assert_eq;
use threadflame::flamegraph::{compress, FlameBlock};

fn leaf(name: &str, value: u64) -> FlameBlock {
    FlameBlock::new(name, value)
}

fn node(name: &str, value: u64, children: Vec<FlameBlock>) -> FlameBlock {
    FlameBlock::with_children(name, value, children)
}

/// A tree whose every value equals the sum of its children (no self time),
/// so the fully expanded leaf sum equals the root value.
fn sample_tree() -> FlameBlock {
    node(
        "all",
        1000,
        vec![
            node(
                "alpha",
                500,
                vec![leaf("a1", 20), leaf("a2", 430), leaf("a3", 50)],
            ),
            leaf("beta", 15),
            leaf("gamma", 15),
            node(
                "delta",
                400,
                vec![
                    leaf("d1", 10),
                    leaf("d2", 10),
                    leaf("d3", 10),
                    leaf("d4", 10),
                    leaf("d5", 360),
                ],
            ),
            leaf("epsilon", 70),
        ],
    )
}

/// Replace every synthetic node by its hidden children, recursively.
fn expand(block: &FlameBlock) -> Vec<FlameBlock> {
    if block.is_synthetic() {
        let hidden = block.hidden_children.as_deref().unwrap_or_default();
        return hidden.iter().flat_map(expand).collect();
    }

    let mut out = block.clone();
    out.children = out.children.iter().flat_map(expand).collect();
    out.compressed_id = None;
    out.hidden_children = None;
    vec![out]
}

fn leaf_sum(block: &FlameBlock) -> u64 {
    if block.children.is_empty() {
        block.value
    } else {
        block.children.iter().map(leaf_sum).sum()
    }
}

fn child_names(blocks: &[FlameBlock]) -> Vec<&str> {
    blocks.iter().map(|b| b.name.as_str()).collect()
}

#[test]
fn test_value_conservation_for_all_thresholds() {
    let tree = sample_tree();

    for threshold in [0.0, 0.005, 0.01, 0.02, 0.05, 0.1, 0.33, 0.5, 1.0] {
        for time_ordered in [false, true] {
            let out = compress(&tree, tree.value, time_ordered, threshold);

            assert_eq!(out.value, tree.value, "root value at t={threshold}");
            let expanded: Vec<FlameBlock> =
                out.children.iter().flat_map(|c| expand(c)).collect();
            let total: u64 = expanded.iter().map(leaf_sum).sum();
            assert_eq!(
                total, tree.value,
                "expanded leaf sum at t={threshold} ordered={time_ordered}"
            );
        }
    }
}

#[test]
fn test_time_ordered_expansion_reconstructs_original_order() {
    let tree = sample_tree();

    for threshold in [0.0, 0.02, 0.05, 0.1, 0.5, 1.0] {
        let out = compress(&tree, tree.value, true, threshold);
        let expanded: Vec<FlameBlock> = out.children.iter().flat_map(expand).collect();

        assert_eq!(
            child_names(&expanded),
            vec!["alpha", "beta", "gamma", "delta", "epsilon"],
            "top-level order at t={threshold}"
        );
    }
}

#[test]
fn test_recompression_is_idempotent() {
    let tree = sample_tree();

    for time_ordered in [false, true] {
        let first = compress(&tree, tree.value, time_ordered, 0.05);

        // Expand the compressed tree back out and compress it again: same
        // structure, same compressed_id assignment.
        let expanded_children: Vec<FlameBlock> =
            first.children.iter().flat_map(expand).collect();
        let expanded = node("all", 1000, expanded_children);
        let second = compress(&expanded, expanded.value, time_ordered, 0.05);

        assert_eq!(first, second);
    }
}

#[test]
fn test_threshold_zero_is_identity() {
    let tree = sample_tree();

    assert_eq!(compress(&tree, tree.value, false, 0.0), tree);
    assert_eq!(compress(&tree, tree.value, true, 0.0), tree);
}

#[test]
fn test_threshold_one_folds_everything_below_total() {
    let tree = sample_tree();
    let out = compress(&tree, tree.value, false, 1.0);

    // Every child is below the total, so the root keeps exactly one
    // synthetic child covering the whole value.
    assert_eq!(out.children.len(), 1);
    assert!(out.children[0].is_synthetic());
    assert_eq!(out.children[0].value, 1000);
}

#[test]
fn test_aggregated_reference_scenario() {
    let tree = node("root", 100, vec![leaf("s1", 5), leaf("s2", 5), leaf("big", 90)]);
    let out = compress(&tree, 100, false, 0.10);

    assert_eq!(out.children.len(), 2);
    assert_eq!(out.children[0].name, "big");
    assert_eq!(out.children[0].value, 90);

    let folded = &out.children[1];
    assert_eq!(folded.name, "(compressed)");
    assert_eq!(folded.value, 10);
    let hidden = folded.hidden_children.as_ref().unwrap();
    assert_eq!(child_names(hidden), vec!["s1", "s2"]);
}

#[test]
fn test_deep_tree_does_not_overflow_stack() {
    // Linear chain deeper than any sane call stack; the compressor walks it
    // with an explicit stack.
    let mut tree = leaf("bottom", 1000);
    for i in 0..100_000 {
        tree = node(&format!("f{i}"), 1000, vec![tree]);
    }

    let out = compress(&tree, 1000, true, 0.5);
    assert_eq!(out.value, 1000);
}
