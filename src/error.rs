//! Error types for the store and the engine host

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`PersistentStore`](crate::services::PersistentStore) write.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store contents could not be encoded
    #[error("Store encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The in-memory map lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors returned by the async engine handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine loop has shut down and no longer accepts commands
    #[error("Timer engine is not running")]
    Unavailable,
}
