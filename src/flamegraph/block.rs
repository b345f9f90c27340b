//! Flame graph block schema.
//!
//! `FlameBlock` is the wire format exchanged with the sampling pipeline and
//! the viewer: the upstream pipeline writes two uncompressed trees per thread
//! and event type (aggregated and time-ordered), and the compressor returns
//! trees of the same shape with synthetic "(compressed)" nodes added.

use serde::{Deserialize, Serialize};

/// One block of a flame graph.
///
/// For uncompressed input a node's `value` is at least the sum of its
/// children's values (self-time semantics). Synthetic nodes produced by the
/// compressor carry a `compressed_id` and keep the folded blocks in
/// `hidden_children`, recoverable by the viewer on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlameBlock {
    pub name: String,
    pub value: u64,
    #[serde(default)]
    pub children: Vec<FlameBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_children: Option<Vec<FlameBlock>>,
}

impl FlameBlock {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
            children: Vec::new(),
            compressed_id: None,
            hidden_children: None,
        }
    }

    pub fn with_children(name: impl Into<String>, value: u64, children: Vec<FlameBlock>) -> Self {
        Self {
            name: name.into(),
            value,
            children,
            compressed_id: None,
            hidden_children: None,
        }
    }

    /// True for synthetic nodes introduced by the compressor
    pub fn is_synthetic(&self) -> bool {
        self.compressed_id.is_some()
    }
}

/// Tree depth is capture-controlled, so the recursive drop glue the derived
/// type would get could overflow the stack on deep trees. Descendants are
/// drained into a worklist and dropped flat instead.
impl Drop for FlameBlock {
    fn drop(&mut self) {
        if self.children.is_empty() && self.hidden_children.is_none() {
            return;
        }

        let mut work: Vec<FlameBlock> = Vec::new();
        work.append(&mut self.children);
        if let Some(mut hidden) = self.hidden_children.take() {
            work.append(&mut hidden);
        }

        while let Some(mut block) = work.pop() {
            work.append(&mut block.children);
            if let Some(mut hidden) = block.hidden_children.take() {
                work.append(&mut hidden);
            }
        }
    }
}
