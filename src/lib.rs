//! fscache - filesystem-backed key/value cache
//!
//! Re-exports the storage engine from `fscache-store` and adds layered
//! settings loading plus the JSON helpers used by the `fscache` binary.

pub mod append;
pub mod config;

pub use append::append_value;
pub use config::{ConfigError, EffectiveSettings};
pub use fscache_store::{
    CacheConfig, CacheError, CacheKey, CacheRecord, CacheResult, FileCache, InvalidationReport,
    JsonCodec, LockMode, LockWait, LockedFile, Modify, Namespace, RecordCodec, TtlPolicy,
};
