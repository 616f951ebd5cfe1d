//! Storage-specific error types.
//!
//! All accumulator and bundle operations return [`StorageError`] on failure,
//! which can be matched to determine the underlying cause.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to send command to the accumulator actor.
    #[error("failed to send command to accumulator")]
    ChannelSend,

    /// The accumulator dropped a reply before answering.
    #[error("accumulator stopped before replying")]
    ChannelRecv,

    /// The output location already exists.
    #[error("output location already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// One or more session files could not be written.
    #[error("failed to finalize bundle: {0}")]
    Finalize(String),

    /// The bundle could not be compressed; the directory is kept.
    #[error("archive error: {0}")]
    Archive(String),
}
