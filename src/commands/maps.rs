//! Maps command implementation.
//!
//! Lists every symbol map in the session directory, entries sorted by start
//! address.

use anyhow::{Context, Result};
use std::path::PathBuf;
use threadflame::session::Session;

/// Arguments for the maps command
#[derive(Debug, Clone)]
pub struct MapsArgs {
    /// Storage directory holding session subdirectories
    pub storage: PathBuf,

    /// Session identifier (directory name)
    pub id: String,
}

/// Execute the maps command
pub fn execute_maps(args: MapsArgs) -> Result<()> {
    let session = Session::open(&args.storage, &args.id)
        .with_context(|| format!("opening session {}", args.id))?;

    let maps = session
        .symbol_maps()
        .with_context(|| format!("reading symbol maps for {}", args.id))?;

    for (name, entries) in &maps {
        println!("{name} ({} symbols)", entries.len());
        for entry in entries {
            println!("  {:#x} {:#x} {}", entry.start, entry.end, entry.name);
        }
    }

    Ok(())
}
