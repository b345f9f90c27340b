//! Sessions command implementation.
//!
//! Lists every profiling session found under a storage directory, newest
//! first. Directories whose names do not match the session grammar are not
//! sessions and are omitted.

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use threadflame::session::SessionId;

/// Arguments for the sessions command
#[derive(Debug, Clone)]
pub struct SessionsArgs {
    /// Storage directory holding session subdirectories
    pub storage: PathBuf,
}

/// Execute the sessions command
pub fn execute_sessions(args: SessionsArgs) -> Result<()> {
    let ids = SessionId::enumerate(&args.storage)
        .with_context(|| format!("listing sessions in {}", args.storage.display()))?;

    info!("found {} sessions", ids.len());
    for id in ids {
        println!("{}\t{}", id.raw, id);
    }

    Ok(())
}
