//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// How long a caller is willing to wait for a file lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockWait {
    /// Block until the platform grants the lock.
    #[default]
    Block,
    /// Poll for the lock and give up after the given duration.
    Timeout(Duration),
}

impl LockWait {
    /// Build from an optional timeout in milliseconds (`None` or 0 blocks).
    pub fn from_millis(timeout_ms: Option<u64>) -> Self {
        match timeout_ms {
            Some(ms) if ms > 0 => Self::Timeout(Duration::from_millis(ms)),
            _ => Self::Block,
        }
    }
}

/// Configuration for a [`FileCache`](crate::FileCache) instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory of the cache tree
    pub cache_root: PathBuf,
    /// Lock acquisition policy
    pub lock_wait: LockWait,
    /// Call `sync_data` after every write
    pub sync_writes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("cache"),
            lock_wait: LockWait::Block,
            sync_writes: false,
        }
    }
}

impl CacheConfig {
    /// Create a config rooted at `cache_root` with default settings.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }

    /// Give up on lock acquisition after `timeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait = LockWait::Timeout(timeout);
        self
    }

    /// Fsync record contents after each write.
    pub fn with_sync_writes(mut self) -> Self {
        self.sync_writes = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root_is_relative_cache_dir() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_root, PathBuf::from("cache"));
        assert_eq!(config.lock_wait, LockWait::Block);
        assert!(!config.sync_writes);
    }

    #[test]
    fn test_lock_wait_from_millis() {
        assert_eq!(LockWait::from_millis(None), LockWait::Block);
        assert_eq!(LockWait::from_millis(Some(0)), LockWait::Block);
        assert_eq!(
            LockWait::from_millis(Some(250)),
            LockWait::Timeout(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::new("/tmp/x")
            .with_lock_timeout(Duration::from_secs(2))
            .with_sync_writes();
        assert_eq!(config.cache_root, PathBuf::from("/tmp/x"));
        assert_eq!(config.lock_wait, LockWait::Timeout(Duration::from_secs(2)));
        assert!(config.sync_writes);
    }
}
