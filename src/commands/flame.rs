//! Flame command implementation.
//!
//! Compresses one thread's flame graphs at the requested threshold and
//! prints the event-type to [aggregated, time-ordered] mapping as JSON.

use anyhow::{bail, Context, Result};
use log::info;
use std::path::PathBuf;
use threadflame::session::Session;

/// Arguments for the flame command
#[derive(Debug, Clone)]
pub struct FlameArgs {
    /// Storage directory holding session subdirectories
    pub storage: PathBuf,

    /// Session identifier (directory name)
    pub id: String,

    /// Process id of the thread
    pub pid: u32,

    /// Thread id
    pub tid: u32,

    /// Compression threshold in [0, 1]
    pub threshold: f64,
}

/// Execute the flame command
pub fn execute_flame(args: FlameArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.threshold) {
        bail!("threshold must be within [0, 1], got {}", args.threshold);
    }

    let session = Session::open(&args.storage, &args.id)
        .with_context(|| format!("opening session {}", args.id))?;

    let graphs = session
        .flame_graph(args.pid, args.tid, args.threshold)
        .with_context(|| format!("compressing flame graphs for {}/{}", args.pid, args.tid))?;

    match graphs {
        Some(graphs) => {
            info!(
                "{} event types for {}/{} at threshold {}",
                graphs.len(),
                args.pid,
                args.tid,
                args.threshold
            );
            println!("{}", serde_json::to_string_pretty(&graphs)?);
        }
        None => bail!("no flame graph data recorded for {}/{}", args.pid, args.tid),
    }

    Ok(())
}
