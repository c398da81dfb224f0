//! Entry and group invalidation
//!
//! Deletion is not coordinated with lock holders. Unlinking is atomic at
//! the filesystem level; a reader that already has the file open finishes
//! reading the old contents, and a writer holding the lock writes into the
//! unlinked file, which then disappears with its descriptor.
//!
//! Group invalidation only ever removes files with the `.cache`
//! extension. Recursive invalidation skips any subdirectory whose name
//! starts with `.`, at every depth.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{CacheResult, CodecError};
use crate::key::{is_cache_file, CacheKey, KeyMapper, Namespace, SKIP_MARKER};

/// Summary of a group invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Number of cache files removed
    pub removed: usize,
    /// Subdirectories excluded by the skip marker
    pub skipped_dirs: Vec<PathBuf>,
}

/// Deletes single entries and whole namespaces.
#[derive(Debug, Clone)]
pub struct InvalidationEngine {
    mapper: KeyMapper,
}

impl InvalidationEngine {
    /// Create an engine over the mapper's cache root.
    pub fn new(mapper: KeyMapper) -> Self {
        Self { mapper }
    }

    /// Delete the entry for `key`. Returns whether a file was removed.
    pub fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        let path = self.mapper.resolve(key);
        let removed = remove_if_present(&path)?;
        if removed {
            debug!(key = %key, path = %path.display(), "invalidated");
        }
        Ok(removed)
    }

    /// Delete the entry for `key` after it failed to decode.
    pub fn purge_corrupt(&self, key: &CacheKey, err: &CodecError) -> CacheResult<bool> {
        warn!(key = %key, error = %err, "purging corrupt cache entry");
        self.invalidate(key)
    }

    /// Delete every cache file directly inside `namespace` (`None` is the
    /// root), and with `recursive` every cache file in its subtree.
    pub fn invalidate_group(
        &self,
        namespace: Option<&Namespace>,
        recursive: bool,
    ) -> CacheResult<InvalidationReport> {
        let dir = self.mapper.namespace_dir(namespace);
        let mut report = InvalidationReport::default();

        if !dir.is_dir() {
            return Ok(report);
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut skipped = Vec::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| {
                let excluded = entry.depth() > 0
                    && entry.file_type().is_dir()
                    && entry.file_name().to_string_lossy().starts_with(SKIP_MARKER);
                if excluded && recursive {
                    skipped.push(entry.path().to_path_buf());
                }
                !excluded
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_vanished(&e) => continue,
                Err(e) => return Err(io::Error::from(e).into()),
            };

            if entry.file_type().is_dir() || !is_cache_file(entry.path()) {
                continue;
            }
            if remove_if_present(entry.path())? {
                report.removed += 1;
            }
        }

        report.skipped_dirs = skipped;
        info!(
            dir = %dir.display(),
            recursive,
            removed = report.removed,
            skipped = report.skipped_dirs.len(),
            "invalidated group"
        );
        Ok(report)
    }

    /// Delete every cache file in the tree, honouring the skip marker.
    pub fn invalidate_all(&self) -> CacheResult<InvalidationReport> {
        self.invalidate_group(None, true)
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// Entries deleted by another process mid-walk are not errors.
fn is_vanished(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn setup() -> (TempDir, InvalidationEngine) {
        let temp = TempDir::new().unwrap();
        let engine = InvalidationEngine::new(KeyMapper::new(temp.path().join("cache")));
        (temp, engine)
    }

    #[test]
    fn test_invalidate_missing_key_is_noop() {
        let (_temp, engine) = setup();
        assert!(!engine.invalidate(&CacheKey::new("nothing")).unwrap());
    }

    #[test]
    fn test_invalidate_removes_file() {
        let (temp, engine) = setup();
        let key = CacheKey::in_group("k", "g").unwrap();
        let path = KeyMapper::new(temp.path().join("cache")).resolve(&key);
        touch(&path);

        assert!(engine.invalidate(&key).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_group_only_removes_cache_files() {
        let (temp, engine) = setup();
        let root = temp.path().join("cache");
        touch(&root.join("g/a.cache"));
        touch(&root.join("g/notes.txt"));
        touch(&root.join("g/a.cache.bak"));

        let ns = Namespace::parse("g").unwrap();
        let report = engine.invalidate_group(Some(&ns), false).unwrap();

        assert_eq!(report.removed, 1);
        assert!(!root.join("g/a.cache").exists());
        assert!(root.join("g/notes.txt").exists());
        assert!(root.join("g/a.cache.bak").exists());
    }

    #[test]
    fn test_group_non_recursive_keeps_subdirs() {
        let (temp, engine) = setup();
        let root = temp.path().join("cache");
        touch(&root.join("g/a.cache"));
        touch(&root.join("g/sub/b.cache"));

        let ns = Namespace::parse("g").unwrap();
        engine.invalidate_group(Some(&ns), false).unwrap();

        assert!(!root.join("g/a.cache").exists());
        assert!(root.join("g/sub/b.cache").exists());
    }

    #[test]
    fn test_non_recursive_reports_no_skipped_dirs() {
        let (temp, engine) = setup();
        let root = temp.path().join("cache");
        touch(&root.join("g/a.cache"));
        touch(&root.join("g/.internal/b.cache"));

        let ns = Namespace::parse("g").unwrap();
        let report = engine.invalidate_group(Some(&ns), false).unwrap();

        assert_eq!(report.removed, 1);
        assert!(report.skipped_dirs.is_empty());
        assert!(root.join("g/.internal/b.cache").exists());
    }

    #[test]
    fn test_group_recursive_descends_all_levels() {
        let (temp, engine) = setup();
        let root = temp.path().join("cache");
        touch(&root.join("g/a.cache"));
        touch(&root.join("g/sub/b.cache"));
        touch(&root.join("g/sub/deeper/c.cache"));

        let ns = Namespace::parse("g").unwrap();
        let report = engine.invalidate_group(Some(&ns), true).unwrap();

        assert_eq!(report.removed, 3);
        assert!(root.join("g/sub/deeper").is_dir());
    }

    #[test]
    fn test_recursive_skips_dot_directories() {
        let (temp, engine) = setup();
        let root = temp.path().join("cache");
        touch(&root.join("a.cache"));
        touch(&root.join(".internal/b.cache"));
        touch(&root.join("g/.reserved/c.cache"));
        touch(&root.join("g/d.cache"));

        let report = engine.invalidate_all().unwrap();

        assert_eq!(report.removed, 2);
        assert!(root.join(".internal/b.cache").exists());
        assert!(root.join("g/.reserved/c.cache").exists());
        assert_eq!(report.skipped_dirs.len(), 2);
    }

    #[test]
    fn test_root_non_recursive() {
        let (temp, engine) = setup();
        let root = temp.path().join("cache");
        touch(&root.join("a.cache"));
        touch(&root.join("g/b.cache"));

        let report = engine.invalidate_group(None, false).unwrap();

        assert_eq!(report.removed, 1);
        assert!(root.join("g/b.cache").exists());
    }

    #[test]
    fn test_missing_group_is_noop() {
        let (_temp, engine) = setup();
        let ns = Namespace::parse("never/created").unwrap();
        let report = engine.invalidate_group(Some(&ns), true).unwrap();
        assert_eq!(report, InvalidationReport::default());
    }
}
