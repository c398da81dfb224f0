//! Filesystem-backed key/value cache
//!
//! Entries are individual files under a cache root, grouped into nested
//! namespaces (directories) and coordinated purely through advisory file
//! locks, so independent processes can share one cache directory:
//!
//! - `store` takes an exclusive lock and only truncates once it holds it
//! - `retrieve` takes a shared lock; expired or corrupt entries are deleted
//! - `get_and_modify` holds an exclusive lock across read, transform and write
//! - group invalidation removes `*.cache` files, optionally recursively,
//!   skipping subdirectories whose names start with `.`
//!
//! ```no_run
//! use fscache_store::{CacheConfig, CacheKey, FileCache, Modify, TtlPolicy};
//!
//! let cache = FileCache::new(CacheConfig::new("cache"));
//! let key = CacheKey::in_group("my_key", "my_directory")?;
//!
//! cache.store(&key, &vec![1, 2, 3], Some(60))?;
//! let grown = cache.get_and_modify(&key, TtlPolicy::Preserve, |mut v: Vec<i32>| {
//!     v.push(4);
//!     Modify::Set(v)
//! })?;
//! assert_eq!(grown, Some(vec![1, 2, 3, 4]));
//! # Ok::<(), fscache_store::CacheError>(())
//! ```

mod codec;
mod config;
mod error;
mod invalidate;
mod key;
mod lock;
mod record;
mod store;

pub use codec::{JsonCodec, RecordCodec};
pub use config::{CacheConfig, LockWait};
pub use error::{CacheError, CacheResult, CodecError, LockError, LockResult};
pub use invalidate::{InvalidationEngine, InvalidationReport};
pub use key::{is_cache_file, CacheKey, KeyMapper, Namespace, CACHE_EXTENSION, SKIP_MARKER};
pub use lock::{LockMode, LockedFile};
pub use record::CacheRecord;
pub use store::{FileCache, Modify, TtlPolicy};
