//! Error type for the on-disk block cache.
//!
//! Per the cache's failure semantics, almost nothing here is fatal: a read
//! failure is equivalent to a miss and a write failure is logged and
//! swallowed by the caller. [`CacheError`] exists so callers *can* observe
//! and log those failures, not because they need to propagate them.

use thiserror::Error;

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors from cache I/O.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// Underlying filesystem operation failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The checkpoint file contained something other than a plain integer.
    #[error("corrupt checkpoint for chain {chain_id}: {content:?}")]
    CorruptCheckpoint {
        /// Chain the checkpoint belongs to.
        chain_id: u32,
        /// The unparseable file content.
        content: String,
    },

    /// Caller tried to lower a checkpoint that must only move forward.
    #[error("checkpoint for chain {chain_id} must be monotone: current {current}, attempted {attempted}")]
    NonMonotoneCheckpoint {
        /// Chain the checkpoint belongs to.
        chain_id: u32,
        /// Checkpoint currently on disk.
        current: u64,
        /// Checkpoint the caller attempted to set.
        attempted: u64,
    },
}
