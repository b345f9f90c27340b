//! Tree command implementation.
//!
//! The tree command:
//! 1. Opens the session
//! 2. Replays the raw trace and reconstructs the thread tree
//! 3. Writes the millisecond-normalized JSON form

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use threadflame::session::Session;

/// Arguments for the tree command
#[derive(Debug, Clone)]
pub struct TreeArgs {
    /// Storage directory holding session subdirectories
    pub storage: PathBuf,

    /// Session identifier (directory name)
    pub id: String,

    /// Output path; stdout when omitted
    pub output: Option<PathBuf>,
}

/// Execute the tree command
pub fn execute_tree(args: TreeArgs) -> Result<()> {
    let session = Session::open(&args.storage, &args.id)
        .with_context(|| format!("opening session {}", args.id))?;

    let tree = session
        .json_tree()
        .with_context(|| format!("building thread tree for {}", args.id))?;
    let json = serde_json::to_string_pretty(&tree)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("thread tree written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
