//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Cache root directory (default: "cache", relative to the working directory)
    pub cache_root: String,

    /// Lock timeout in milliseconds, 0 blocks indefinitely (default: 0)
    pub lock_timeout_ms: u64,

    /// Fsync after every write (default: false)
    pub sync_writes: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            cache_root: "cache".to_string(),
            lock_timeout_ms: 0,
            sync_writes: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "cache": {
                "root": self.cache_root,
                "lock_timeout_ms": self.lock_timeout_ms,
                "sync_writes": self.sync_writes
            }
        })
    }
}
