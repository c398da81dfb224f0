//! Store, retrieve and atomic read-modify-write
//!
//! Nothing is cached in memory: every call resolves the key to its file,
//! takes the appropriate lock and re-reads from disk, so any number of
//! threads or processes sharing a cache root see a consistent view.
//!
//! Lookups report "not found" as `Ok(None)`. That covers a missing file, an
//! expired record, a record filtered out by a freshness bound, and a file
//! that failed to decode. Expired and corrupt files are deleted on sight.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use crate::codec::{JsonCodec, RecordCodec};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult, CodecError};
use crate::invalidate::{InvalidationEngine, InvalidationReport};
use crate::key::{CacheKey, KeyMapper, Namespace};
use crate::lock::{LockMode, LockedFile};
use crate::record::CacheRecord;

/// Result of a [`FileCache::get_and_modify`] transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Modify<V> {
    /// Replace the stored value
    Set(V),
    /// Give up: the entry is invalidated and the call reports not found
    Abort,
}

/// What happens to the expiry schedule when a value is modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlPolicy {
    /// Keep the original `created_at`/`expires_at`
    #[default]
    Preserve,
    /// Restart the clock from now with the original TTL
    Reset,
}

/// Outcome of reading one entry under a shared lock.
enum Lookup<V> {
    Missing,
    Corrupt(CodecError),
    Expired,
    Found(CacheRecord<V>),
}

/// Filesystem-backed key/value cache.
#[derive(Debug, Clone)]
pub struct FileCache<C = JsonCodec> {
    config: CacheConfig,
    mapper: KeyMapper,
    invalidator: InvalidationEngine,
    codec: C,
}

impl FileCache<JsonCodec> {
    /// Create a cache using JSON records.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }
}

impl<C: RecordCodec> FileCache<C> {
    /// Create a cache with a custom record codec.
    pub fn with_codec(config: CacheConfig, codec: C) -> Self {
        let mapper = KeyMapper::new(config.cache_root.clone());
        Self {
            invalidator: InvalidationEngine::new(mapper.clone()),
            mapper,
            config,
            codec,
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The key mapper.
    pub fn mapper(&self) -> &KeyMapper {
        &self.mapper
    }

    /// The invalidation engine.
    pub fn invalidator(&self) -> &InvalidationEngine {
        &self.invalidator
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.mapper.resolve(key)
    }

    /// True if a file exists for `key`. The record is not decoded, so an
    /// expired or corrupt entry still counts.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.mapper.resolve(key).is_file()
    }

    /// Store `value` under `key`, expiring after `ttl_seconds` if given.
    ///
    /// The record is encoded before the file is touched. Truncation happens
    /// only once the exclusive lock is held; if writing then fails, the old
    /// contents are gone and the entry will be treated as corrupt.
    pub fn store<V: Serialize>(
        &self,
        key: &CacheKey,
        value: &V,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        self.mapper.ensure_dirs(key)?;
        let path = self.mapper.resolve(key);

        let record = CacheRecord::new(key.key(), value, ttl_seconds);
        let bytes = self.codec.encode(&record).map_err(encode_error)?;

        let mut locked = LockedFile::open_for_write(&path, self.config.lock_wait)?;
        locked.replace_contents(&bytes, self.config.sync_writes)?;

        debug!(key = %key, path = %path.display(), ttl = ?record.ttl_seconds, "stored");
        Ok(())
    }

    /// Retrieve the value stored under `key`.
    pub fn retrieve<V: DeserializeOwned>(&self, key: &CacheKey) -> CacheResult<Option<V>> {
        Ok(self.retrieve_record(key)?.map(|record| record.value))
    }

    /// Retrieve the value only if it was written at or after `newer_than`.
    ///
    /// An older entry is reported as not found but left on disk.
    pub fn retrieve_newer_than<V: DeserializeOwned>(
        &self,
        key: &CacheKey,
        newer_than: DateTime<Utc>,
    ) -> CacheResult<Option<V>> {
        match self.retrieve_record(key)? {
            Some(record) if record.is_older_than(newer_than) => {
                debug!(key = %key, created_at = %record.created_at, "older than freshness bound");
                Ok(None)
            }
            Some(record) => Ok(Some(record.value)),
            None => Ok(None),
        }
    }

    /// Retrieve the full record (value plus timing metadata) for `key`.
    pub fn retrieve_record<V: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> CacheResult<Option<CacheRecord<V>>> {
        match self.read_shared(key)? {
            Lookup::Missing => Ok(None),
            Lookup::Corrupt(err) => {
                self.invalidator.purge_corrupt(key, &err)?;
                Ok(None)
            }
            Lookup::Expired => {
                debug!(key = %key, "expired");
                self.invalidator.invalidate(key)?;
                Ok(None)
            }
            Lookup::Found(record) => Ok(Some(record)),
        }
    }

    /// Atomically read, transform and rewrite the value under `key`.
    ///
    /// The exclusive lock is held across the read, the call to `transform`
    /// and the write, so concurrent modifications of the same key never
    /// lose an update. Returns the new value, or `None` if the entry was
    /// missing, expired, corrupt, or the transform returned
    /// [`Modify::Abort`]. In all but the missing case the entry is deleted.
    ///
    /// When the transform leaves the encoded record byte-for-byte unchanged
    /// under [`TtlPolicy::Preserve`], the file is not rewritten.
    pub fn get_and_modify<V, F>(
        &self,
        key: &CacheKey,
        ttl_policy: TtlPolicy,
        transform: F,
    ) -> CacheResult<Option<V>>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce(V) -> Modify<V>,
    {
        let path = self.mapper.resolve(key);
        let Some(mut locked) =
            LockedFile::open_existing(&path, LockMode::Exclusive, self.config.lock_wait)?
        else {
            return Ok(None);
        };

        let bytes = locked.read_all()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let record: CacheRecord<V> = match self.codec.decode(&bytes) {
            Ok(record) => record,
            Err(err) => {
                drop(locked);
                self.invalidator.purge_corrupt(key, &err)?;
                return Ok(None);
            }
        };

        if record.is_expired() {
            drop(locked);
            debug!(key = %key, "expired before modify");
            self.invalidator.invalidate(key)?;
            return Ok(None);
        }

        let CacheRecord {
            key: stored_key,
            value,
            ttl_seconds,
            created_at,
            expires_at,
        } = record;

        let new_value = match transform(value) {
            Modify::Set(new_value) => new_value,
            Modify::Abort => {
                drop(locked);
                debug!(key = %key, "modify aborted, invalidating");
                self.invalidator.invalidate(key)?;
                return Ok(None);
            }
        };

        let mut next = CacheRecord {
            key: stored_key,
            value: new_value,
            ttl_seconds,
            created_at,
            expires_at,
        };
        if ttl_policy == TtlPolicy::Reset {
            next.restart_clock();
        }

        let encoded = self.codec.encode(&next).map_err(encode_error)?;
        if ttl_policy == TtlPolicy::Preserve && encoded == bytes {
            debug!(key = %key, "modify produced no change");
            return Ok(Some(next.value));
        }

        locked.replace_contents(&encoded, self.config.sync_writes)?;
        debug!(key = %key, path = %path.display(), ?ttl_policy, "modified");
        Ok(Some(next.value))
    }

    /// Delete the entry for `key`. Returns whether a file was removed.
    pub fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        self.invalidator.invalidate(key)
    }

    /// Delete the cache files of a namespace, optionally its whole subtree.
    pub fn invalidate_group(
        &self,
        namespace: Option<&Namespace>,
        recursive: bool,
    ) -> CacheResult<InvalidationReport> {
        self.invalidator.invalidate_group(namespace, recursive)
    }

    /// Delete every cache file under the root.
    pub fn invalidate_all(&self) -> CacheResult<InvalidationReport> {
        self.invalidator.invalidate_all()
    }

    fn read_shared<V: DeserializeOwned>(&self, key: &CacheKey) -> CacheResult<Lookup<V>> {
        let path = self.mapper.resolve(key);
        let Some(mut locked) =
            LockedFile::open_existing(&path, LockMode::Shared, self.config.lock_wait)?
        else {
            return Ok(Lookup::Missing);
        };

        let bytes = locked.read_all()?;
        drop(locked);

        // A writer creates the file before it is granted the lock; an empty
        // file is one still being written, not a corrupt one.
        if bytes.is_empty() {
            return Ok(Lookup::Missing);
        }

        Ok(match self.codec.decode::<V>(&bytes) {
            Err(err) => Lookup::Corrupt(err),
            Ok(record) if record.is_expired() => Lookup::Expired,
            Ok(record) => Lookup::Found(record),
        })
    }
}

fn encode_error(err: CodecError) -> CacheError {
    CacheError::Encode(err.to_string())
}
