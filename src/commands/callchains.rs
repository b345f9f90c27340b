//! Callchains command implementation.
//!
//! Prints the compressed-symbol to callchain-frame dictionaries, grouped by
//! event type, as JSON.

use anyhow::{Context, Result};
use std::path::PathBuf;
use threadflame::session::Session;

/// Arguments for the callchains command
#[derive(Debug, Clone)]
pub struct CallchainsArgs {
    /// Storage directory holding session subdirectories
    pub storage: PathBuf,

    /// Session identifier (directory name)
    pub id: String,
}

/// Execute the callchains command
pub fn execute_callchains(args: CallchainsArgs) -> Result<()> {
    let session = Session::open(&args.storage, &args.id)
        .with_context(|| format!("opening session {}", args.id))?;

    let mappings = session
        .callchain_mappings()
        .with_context(|| format!("loading callchain dictionaries for {}", args.id))?;
    println!("{}", serde_json::to_string_pretty(&mappings)?);

    Ok(())
}
