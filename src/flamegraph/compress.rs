//! Threshold-based flame graph compression.
//!
//! Blocks whose sample count falls below `threshold * total` are folded into
//! synthetic "(compressed)" nodes. `total` is the original root value of the
//! tree being compressed, fixed once and used at every depth, so a block's
//! significance does not depend on where it sits in the tree.
//!
//! Two invariants hold for every input and threshold: the sum of declared
//! child values under any node equals the pre-compression sum (a synthetic
//! node counts as its own value), and for time-ordered trees blocks are only
//! merged with their immediate chronological neighbours, never reordered.
//!
//! The tree depth is caller-controlled, so the whole pass runs on an explicit
//! work stack over an index arena rather than recursing.

use crate::flamegraph::block::FlameBlock;
use crate::utils::config::COMPRESSED_NODE_NAME;
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    value: u64,
    children: Vec<usize>,
    compressed_id: Option<u64>,
    hidden: Option<Vec<usize>>,
}

impl Slot {
    fn is_synthetic(&self) -> bool {
        self.compressed_id.is_some()
    }
}

struct Compressor {
    slots: Vec<Slot>,
    time_ordered: bool,
    /// `threshold * total`; a block with value below this is insignificant
    cutoff: f64,
    next_id: u64,
    /// Synthetic slots in creation order, for the flattening post-pass
    created: Vec<usize>,
    work: Vec<usize>,
}

/// Compress one flame graph tree.
///
/// Pure and deterministic: identical inputs produce identical trees,
/// including `compressed_id` assignment. `total` must be the root value of
/// the uncompressed tree; the root's declared value is never changed.
pub fn compress(tree: &FlameBlock, total: u64, time_ordered: bool, threshold: f64) -> FlameBlock {
    let mut compressor = Compressor {
        slots: Vec::new(),
        time_ordered,
        cutoff: threshold * total as f64,
        next_id: 0,
        created: Vec::new(),
        work: Vec::new(),
    };

    let root = compressor.intern(tree);
    compressor.work.push(root);

    while let Some(slot) = compressor.work.pop() {
        compressor.process(slot);
    }

    compressor.flatten_chains();
    compressor.rebuild(root)
}

impl Compressor {
    /// Copy the input tree into the arena (iteratively; input depth is
    /// unbounded). Compression metadata on the input is not carried over:
    /// the contract is an uncompressed tree.
    fn intern(&mut self, root: &FlameBlock) -> usize {
        let root_idx = self.push_slot(root);
        let mut stack = vec![(root, root_idx)];

        while let Some((block, idx)) = stack.pop() {
            for child in &block.children {
                let child_idx = self.push_slot(child);
                self.slots[idx].children.push(child_idx);
                stack.push((child, child_idx));
            }
        }

        root_idx
    }

    fn push_slot(&mut self, block: &FlameBlock) -> usize {
        self.slots.push(Slot {
            name: block.name.clone(),
            value: block.value,
            children: Vec::new(),
            compressed_id: None,
            hidden: None,
        });
        self.slots.len() - 1
    }

    fn insignificant(&self, slot: usize) -> bool {
        (self.slots[slot].value as f64) < self.cutoff
    }

    /// Compress one level: the visible children of a regular node, or the
    /// hidden children of a synthetic node (expanding a synthetic block in
    /// the viewer may reveal further-compressible content).
    fn process(&mut self, parent: usize) {
        let synthetic = self.slots[parent].is_synthetic();
        let kids: Vec<usize> = if synthetic {
            self.slots[parent].hidden.clone().unwrap_or_default()
        } else {
            self.slots[parent].children.clone()
        };
        if kids.is_empty() {
            return;
        }

        let out = if self.time_ordered {
            self.process_ordered(parent, synthetic, &kids)
        } else {
            self.process_aggregated(parent, synthetic, &kids)
        };

        if synthetic {
            self.slots[parent].hidden = Some(out);
        } else {
            self.slots[parent].children = out;
        }
    }

    /// Order-irrelevant variant: all insignificant children are folded into
    /// one synthetic node regardless of position.
    fn process_aggregated(&mut self, parent: usize, synthetic: bool, kids: &[usize]) -> Vec<usize> {
        let mut out = Vec::with_capacity(kids.len());
        let mut folded = Vec::new();

        for &kid in kids {
            if self.insignificant(kid) {
                folded.push(kid);
            } else {
                out.push(kid);
                self.work.push(kid);
            }
        }

        if folded.is_empty() {
            return out;
        }

        let folded_sum: u64 = folded.iter().map(|&k| self.slots[k].value).sum();
        if synthetic && folded_sum == self.slots[parent].value {
            // Re-wrapping a synthetic node's entire hidden set would add a
            // single-child 100%-value layer; the set stays flat.
            out.extend(folded);
        } else {
            let wrapper = self.new_synthetic(folded);
            out.push(wrapper);
            self.work.push(wrapper);
        }

        out
    }

    /// Time-ordered variant: runs of consecutive insignificant children are
    /// folded in place, so the surviving sequence is a subsequence-with-merges
    /// of the original order.
    fn process_ordered(&mut self, parent: usize, synthetic: bool, kids: &[usize]) -> Vec<usize> {
        let mut out = Vec::with_capacity(kids.len());
        let mut run = Vec::new();

        for &kid in kids {
            if self.insignificant(kid) {
                run.push(kid);
            } else {
                self.flush_run(parent, synthetic, &mut run, &mut out);
                out.push(kid);
                self.work.push(kid);
            }
        }
        self.flush_run(parent, synthetic, &mut run, &mut out);

        out
    }

    fn flush_run(
        &mut self,
        parent: usize,
        synthetic: bool,
        run: &mut Vec<usize>,
        out: &mut Vec<usize>,
    ) {
        if run.is_empty() {
            return;
        }
        // A lone block with nothing underneath is not worth hiding.
        if run.len() == 1 && self.slots[run[0]].children.is_empty() && !self.slots[run[0]].is_synthetic()
        {
            out.push(run[0]);
            run.clear();
            return;
        }
        let folded = std::mem::take(run);
        self.collapse_run(parent, synthetic, folded, out);
    }

    /// Fold one group of insignificant children, guarding against degenerate
    /// re-wrapping: when the group is the entire value of a parent that is
    /// itself synthetic, another wrapper would be a single-child 100% layer.
    /// A singleton group is spliced into the parent's hidden set instead; a
    /// larger group is split at the count midpoint into two siblings, so
    /// expanding the parent offers a real choice. Singleton halves are
    /// spliced for the same reason.
    fn collapse_run(
        &mut self,
        parent: usize,
        parent_synthetic: bool,
        run: Vec<usize>,
        out: &mut Vec<usize>,
    ) {
        let run_sum: u64 = run.iter().map(|&k| self.slots[k].value).sum();

        if parent_synthetic && run_sum == self.slots[parent].value {
            if run.len() == 1 {
                out.push(run[0]);
            } else {
                let mid = run.len() / 2;
                let (left, right) = run.split_at(mid);
                for half in [left, right] {
                    if half.len() == 1 {
                        out.push(half[0]);
                    } else {
                        let wrapper = self.new_synthetic(half.to_vec());
                        out.push(wrapper);
                        self.work.push(wrapper);
                    }
                }
            }
        } else {
            let wrapper = self.new_synthetic(run);
            out.push(wrapper);
            self.work.push(wrapper);
        }
    }

    fn new_synthetic(&mut self, hidden: Vec<usize>) -> usize {
        let value = hidden.iter().map(|&k| self.slots[k].value).sum();
        let id = self.next_id;
        self.next_id += 1;

        self.slots.push(Slot {
            name: COMPRESSED_NODE_NAME.to_string(),
            value,
            children: Vec::new(),
            compressed_id: Some(id),
            hidden: Some(hidden),
        });
        let idx = self.slots.len() - 1;
        self.created.push(idx);
        idx
    }

    /// Post-pass: a synthetic node whose only hidden child is itself
    /// synthetic is a redundant hop; splice the grandchild's hidden set
    /// directly into the parent.
    fn flatten_chains(&mut self) {
        let mut done: HashSet<u64> = HashSet::new();

        for i in 0..self.created.len() {
            let slot = self.created[i];
            let id = match self.slots[slot].compressed_id {
                Some(id) if !done.contains(&id) => id,
                _ => continue,
            };

            loop {
                let hidden = match &self.slots[slot].hidden {
                    Some(h) if h.len() == 1 => h.clone(),
                    _ => break,
                };
                let only = hidden[0];
                let Some(child_id) = self.slots[only].compressed_id else {
                    break;
                };
                done.insert(child_id);
                self.slots[slot].hidden = self.slots[only].hidden.clone();
            }

            done.insert(id);
        }
    }

    /// Materialize the arena back into an owned tree, children before
    /// parents, without recursion.
    fn rebuild(&self, root: usize) -> FlameBlock {
        let mut order = Vec::with_capacity(self.slots.len());
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.slots[i].children.iter().copied());
            if let Some(hidden) = &self.slots[i].hidden {
                stack.extend(hidden.iter().copied());
            }
        }

        let mut built: Vec<Option<FlameBlock>> = vec![None; self.slots.len()];
        for &i in order.iter().rev() {
            let slot = &self.slots[i];
            let children = slot
                .children
                .iter()
                .map(|&c| built[c].take().unwrap_or_else(|| FlameBlock::new("", 0)))
                .collect();
            let hidden_children = slot.hidden.as_ref().map(|hidden| {
                hidden
                    .iter()
                    .map(|&c| built[c].take().unwrap_or_else(|| FlameBlock::new("", 0)))
                    .collect()
            });

            built[i] = Some(FlameBlock {
                name: slot.name.clone(),
                value: slot.value,
                children,
                compressed_id: slot.compressed_id,
                hidden_children,
            });
        }

        built[root]
            .take()
            .unwrap_or_else(|| FlameBlock::new("", 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, value: u64) -> FlameBlock {
        FlameBlock::new(name, value)
    }

    /// Sum of declared child values, counting synthetic nodes as themselves.
    fn declared_child_sum(block: &FlameBlock) -> u64 {
        block.children.iter().map(|c| c.value).sum()
    }

    #[test]
    fn test_aggregated_folds_small_blocks() {
        let tree = FlameBlock::with_children(
            "all",
            100,
            vec![leaf("a", 5), leaf("b", 5), leaf("c", 90)],
        );

        let out = compress(&tree, 100, false, 0.10);

        assert_eq!(out.value, 100);
        assert_eq!(out.children.len(), 2);
        assert_eq!(out.children[0].name, "c");
        assert_eq!(out.children[0].value, 90);

        let folded = &out.children[1];
        assert_eq!(folded.name, COMPRESSED_NODE_NAME);
        assert_eq!(folded.value, 10);
        assert_eq!(folded.compressed_id, Some(0));
        let hidden = folded.hidden_children.as_ref().unwrap();
        assert_eq!(hidden.len(), 2);
        assert_eq!(hidden[0].value, 5);
        assert_eq!(hidden[1].value, 5);
    }

    #[test]
    fn test_threshold_zero_collapses_nothing() {
        let tree = FlameBlock::with_children(
            "all",
            100,
            vec![leaf("a", 1), leaf("b", 1), leaf("c", 98)],
        );

        let out = compress(&tree, 100, false, 0.0);
        assert_eq!(out, tree);

        let out = compress(&tree, 100, true, 0.0);
        assert_eq!(out, tree);
    }

    #[test]
    fn test_time_ordered_merges_only_neighbours() {
        // a small, BIG, small small: the two trailing smalls merge, the
        // leading one stays a lone childless block (not worth hiding).
        let tree = FlameBlock::with_children(
            "all",
            100,
            vec![
                leaf("a", 4),
                leaf("big", 80),
                FlameBlock::with_children("b", 8, vec![leaf("b1", 8)]),
                leaf("c", 8),
            ],
        );

        let out = compress(&tree, 100, true, 0.10);

        assert_eq!(out.children.len(), 3);
        assert_eq!(out.children[0].name, "a");
        assert_eq!(out.children[1].name, "big");
        let folded = &out.children[2];
        assert!(folded.is_synthetic());
        assert_eq!(folded.value, 16);
        let hidden = folded.hidden_children.as_ref().unwrap();
        assert_eq!(hidden[0].name, "b");
        assert_eq!(hidden[1].name, "c");
    }

    #[test]
    fn test_time_ordered_single_leaf_not_wrapped() {
        let tree = FlameBlock::with_children("all", 100, vec![leaf("a", 4), leaf("big", 96)]);

        let out = compress(&tree, 100, true, 0.10);

        assert_eq!(out.children.len(), 2);
        assert!(!out.children[0].is_synthetic());
        assert_eq!(out.children[0].name, "a");
    }

    #[test]
    fn test_synthetic_repass_splits_by_count() {
        // Four insignificant neighbours fold into one synthetic node; the
        // re-pass over its hidden set splits it into two synthetic halves
        // (by count, not by value) rather than re-wrapping all of it.
        let tree = FlameBlock::with_children(
            "all",
            100,
            vec![
                leaf("a", 1),
                leaf("b", 2),
                leaf("c", 3),
                leaf("d", 4),
                leaf("big", 90),
            ],
        );

        let out = compress(&tree, 100, true, 0.10);

        assert_eq!(out.children.len(), 2);
        let folded = &out.children[0];
        assert_eq!(folded.value, 10);
        assert_eq!(folded.compressed_id, Some(0));

        let halves = folded.hidden_children.as_ref().unwrap();
        assert_eq!(halves.len(), 2);
        assert!(halves[0].is_synthetic());
        assert!(halves[1].is_synthetic());
        // Count split: [a, b] and [c, d], not a value-balanced split.
        assert_eq!(halves[0].value, 3);
        assert_eq!(halves[1].value, 7);
        // Two-element halves splice rather than splitting further.
        let left = halves[0].hidden_children.as_ref().unwrap();
        assert_eq!(left[0].name, "a");
        assert_eq!(left[1].name, "b");
    }

    #[test]
    fn test_aggregated_hidden_set_stays_flat() {
        // In the order-irrelevant variant the hidden set is left as-is: the
        // viewer sorts it, so there is nothing to gain from nesting.
        let tree = FlameBlock::with_children(
            "all",
            100,
            vec![
                leaf("a", 1),
                leaf("b", 2),
                leaf("c", 3),
                leaf("d", 4),
                leaf("big", 90),
            ],
        );

        let out = compress(&tree, 100, false, 0.10);

        let folded = out
            .children
            .iter()
            .find(|c| c.is_synthetic())
            .expect("one synthetic child");
        assert_eq!(folded.value, 10);
        let hidden = folded.hidden_children.as_ref().unwrap();
        assert_eq!(hidden.len(), 4);
        assert!(hidden.iter().all(|h| !h.is_synthetic()));
    }

    #[test]
    fn test_value_conservation_at_every_level() {
        let tree = FlameBlock::with_children(
            "all",
            100,
            vec![
                FlameBlock::with_children("x", 50, vec![leaf("x1", 2), leaf("x2", 40)]),
                leaf("y", 3),
                leaf("z", 3),
                leaf("w", 44),
            ],
        );

        for time_ordered in [false, true] {
            let out = compress(&tree, 100, time_ordered, 0.05);
            assert_eq!(out.value, 100);
            assert_eq!(declared_child_sum(&out), declared_child_sum(&tree));
            let x = out
                .children
                .iter()
                .find(|c| c.name == "x")
                .expect("x must survive");
            assert_eq!(declared_child_sum(x), 42);
        }
    }
}
