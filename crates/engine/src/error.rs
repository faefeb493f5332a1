use std::io;

use thiserror::Error;

/// Result type for the storage engine.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the store facade and the background actors.
///
/// Format and corrupt-name conditions arrive wrapped in [`StoreError::Table`]
/// (see [`sstable::TableError`]); WAL failures in [`StoreError::Wal`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Wal(#[from] wal::WalError),

    #[error(transparent)]
    Table(#[from] sstable::TableError),

    /// `start` was called on an actor whose thread is already running.
    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    /// `stop` was called on an actor that was never started (or has
    /// already been stopped).
    #[error("{0} is not running")]
    NotRunning(&'static str),

    /// The actor is mid-shutdown: another caller's `stop` is still joining
    /// the background thread.
    #[error("{0} is shutting down")]
    ShutdownInProgress(&'static str),
}
