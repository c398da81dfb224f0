//! Error taxonomy for cache operations.
//!
//! "Not found" is not an error: lookups return `Ok(None)` when a key is
//! absent, expired, filtered out, or was corrupt and has been purged.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Cache result type
pub type CacheResult<T> = Result<T, CacheError>;

/// Lock result type
pub type LockResult<T> = Result<T, LockError>;

/// Errors from lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock timeout after {0:?}")]
    Timeout(Duration),

    #[error("lock unavailable: {0}")]
    Io(#[from] io::Error),
}

/// Errors from encoding or decoding a cache record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode record: {0}")]
    Encode(String),

    #[error("failed to decode record: {0}")]
    Decode(String),
}

/// Errors from cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
}

impl CacheError {
    /// True when the failure came from lock acquisition rather than I/O.
    pub fn is_lock_unavailable(&self) -> bool {
        matches!(self, Self::Lock(_))
    }
}
