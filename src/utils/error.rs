//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while decoding the replay subprocess output or the
/// off-CPU side-channel file
#[derive(Error, Debug)]
pub enum EventError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("malformed trace event on line {line}: {reason}")]
    MalformedEvent { line: usize, reason: String },

    #[error("malformed off-CPU sample on line {line}: {reason}")]
    MalformedOffCpu { line: usize, reason: String },
}

/// Errors that can occur while replaying trace events into a thread tree
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("exit_group references pid {0} with no registered process group")]
    UnknownProcessGroup(u32),

    #[error("clone flag {0} is not supported")]
    NotImplemented(String),

    #[error("thread {0} was linked into the tree but has no start record")]
    MissingStartTime(u32),

    #[error("trace produced more than one root thread ({0} and {1})")]
    MultipleRoots(u32, u32),
}

/// Errors that can occur in the session repository
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid session identifier: {0}")]
    InvalidIdentifier(String),

    #[error("failed to spawn trace replay command '{0}': {1}")]
    ReplaySpawn(String, std::io::Error),

    #[error("trace replay command exited with {status}: {stderr}")]
    ReplayFailed { status: String, stderr: String },

    #[error("malformed session metadata: {0}")]
    MalformedMetadata(String),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
}
