//! Key to file path mapping
//!
//! Every entry lives at `<root>[/<namespace>]/<sha256(key)>.cache`. The hash
//! is stable across processes and runs, so independent processes agree on
//! where a key lives without any coordination.
//!
//! Two keys with the same digest in the same namespace share a file and
//! overwrite each other. With SHA-256 that is not expected to happen in
//! practice, but nothing detects it.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, CacheResult};

/// File extension marking cache entries. Invalidation only removes files
/// carrying it.
pub const CACHE_EXTENSION: &str = "cache";

/// Leading character that excludes a subdirectory from recursive
/// invalidation.
pub const SKIP_MARKER: char = '.';

/// A validated, slash-delimited directory path under the cache root.
///
/// Construction rejects anything that could resolve outside the root:
/// absolute paths, `.` and `..` components, backslashes, drive-style `:`
/// separators and NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace {
    components: Vec<String>,
}

impl Namespace {
    /// Parse a namespace such as `"group1/subgroup1"`.
    ///
    /// Empty components are dropped, so `"a//b/"` equals `"a/b"` and an
    /// empty string is the root namespace.
    pub fn parse(raw: &str) -> CacheResult<Self> {
        if raw.starts_with('/') {
            return Err(CacheError::InvalidNamespace(format!(
                "absolute path not allowed: {raw}"
            )));
        }

        let mut components = Vec::new();
        for part in raw.split('/') {
            if part.is_empty() {
                continue;
            }
            if part == "." || part == ".." {
                return Err(CacheError::InvalidNamespace(format!(
                    "relative component '{part}' in {raw}"
                )));
            }
            if part.contains('\\') || part.contains('\0') || part.contains(':') {
                return Err(CacheError::InvalidNamespace(format!(
                    "illegal character in component '{part}'"
                )));
            }
            components.push(part.to_string());
        }

        Ok(Self { components })
    }

    /// The root namespace (no subdirectory).
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// True for the root namespace.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Path segments in order.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Namespace of a child directory.
    pub fn child(&self, name: &str) -> CacheResult<Self> {
        let mut child = self.clone();
        child.components.extend(Self::parse(name)?.components);
        Ok(child)
    }

    /// Join this namespace onto a base directory.
    pub fn join_onto(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        for component in &self.components {
            path.push(component);
        }
        path
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components.join("/"))
    }
}

impl TryFrom<String> for Namespace {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.to_string()
    }
}

/// A cache key together with the namespace it is stored in.
///
/// The same namespace must be used to store and to retrieve an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    namespace: Namespace,
}

impl CacheKey {
    /// A key in the root namespace.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            namespace: Namespace::root(),
        }
    }

    /// A key inside `group` (e.g. `"group1/subgroup1"`).
    pub fn in_group(key: impl Into<String>, group: &str) -> CacheResult<Self> {
        Ok(Self {
            key: key.into(),
            namespace: Namespace::parse(group)?,
        })
    }

    /// A key inside an already-parsed namespace.
    pub fn with_namespace(key: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            key: key.into(),
            namespace,
        }
    }

    /// The raw key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Hex SHA-256 digest of the raw key. The namespace does not take part.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// File name of this entry: `<digest>.cache`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.digest(), CACHE_EXTENSION)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_root() {
            f.write_str(&self.key)
        } else {
            write!(f, "{}/{}", self.namespace, self.key)
        }
    }
}

/// Resolves keys to paths under a cache root.
#[derive(Debug, Clone)]
pub struct KeyMapper {
    root: PathBuf,
}

impl KeyMapper {
    /// Create a mapper for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`. Pure; touches nothing on disk.
    pub fn resolve(&self, key: &CacheKey) -> PathBuf {
        self.namespace_dir(Some(key.namespace())).join(key.file_name())
    }

    /// Directory of a namespace (`None` is the root).
    pub fn namespace_dir(&self, namespace: Option<&Namespace>) -> PathBuf {
        match namespace {
            Some(ns) => ns.join_onto(&self.root),
            None => self.root.clone(),
        }
    }

    /// Create the root and namespace directories of `key` if missing.
    pub fn ensure_dirs(&self, key: &CacheKey) -> io::Result<PathBuf> {
        let dir = self.namespace_dir(Some(key.namespace()));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// True if `path` looks like a cache entry (`*.cache`).
pub fn is_cache_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXTENSION)
}
