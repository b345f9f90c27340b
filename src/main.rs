//! threadflame CLI
//!
//! Queries profiling sessions captured by a kernel-tracing pipeline:
//! reconstructs thread/process trees from syscall traces and serves
//! compressed flame graphs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

mod commands;

use commands::{
    execute_callchains, execute_flame, execute_maps, execute_sessions, execute_tree,
    CallchainsArgs, FlameArgs, MapsArgs, SessionsArgs, TreeArgs,
};
use threadflame::utils::config::DEFAULT_THRESHOLD;

/// threadflame - thread trees and flame graphs from kernel traces
#[derive(Parser, Debug)]
#[command(name = "threadflame")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Storage directory holding session subdirectories
    #[arg(short, long, global = true, env = "THREADFLAME_STORAGE", default_value = ".")]
    storage: PathBuf,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// List sessions in the storage directory, newest first
    Sessions,

    /// Reconstruct a session's thread/process tree as JSON
    Tree {
        /// Session identifier (directory name)
        id: String,

        /// Output path for the JSON tree; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compressed flame graphs for one thread
    Flame {
        /// Session identifier (directory name)
        id: String,

        /// Process id of the thread
        pid: u32,

        /// Thread id
        tid: u32,

        /// Compression threshold in [0, 1]
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },

    /// Callchain dictionaries grouped by event type
    Callchains {
        /// Session identifier (directory name)
        id: String,
    },

    /// Symbol map listings
    Maps {
        /// Session identifier (directory name)
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let storage = cli.storage;
    match cli.command {
        Commands::Sessions => execute_sessions(SessionsArgs { storage })?,

        Commands::Tree { id, output } => execute_tree(TreeArgs {
            storage,
            id,
            output,
        })?,

        Commands::Flame {
            id,
            pid,
            tid,
            threshold,
        } => execute_flame(FlameArgs {
            storage,
            id,
            pid,
            tid,
            threshold,
        })?,

        Commands::Callchains { id } => execute_callchains(CallchainsArgs { storage, id })?,

        Commands::Maps { id } => execute_maps(MapsArgs { storage, id })?,
    }

    Ok(())
}
