//! CLI command implementations.
//!
//! Each command is implemented in its own module. Commands orchestrate the
//! library components: session enumeration, thread-tree queries, flame graph
//! compression and the auxiliary listings.

pub mod callchains;
pub mod flame;
pub mod maps;
pub mod sessions;
pub mod tree;

// Re-export main command functions
pub use callchains::{execute_callchains, CallchainsArgs};
pub use flame::{execute_flame, FlameArgs};
pub use maps::{execute_maps, MapsArgs};
pub use sessions::{execute_sessions, SessionsArgs};
pub use tree::{execute_tree, TreeArgs};
