//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use fscache::{CacheConfig, CacheKey, FileCache};
use tempfile::TempDir;

pub const ORIGINAL_DATA: &str = "this is my data";

pub fn make_cache(temp_dir: &TempDir) -> FileCache {
    FileCache::new(CacheConfig::new(cache_root(temp_dir)))
}

pub fn cache_root(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("cache")
}

pub fn key(name: &str, group: &str) -> CacheKey {
    CacheKey::in_group(name, group).unwrap()
}
