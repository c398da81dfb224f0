//! Layered settings
//!
//! Settings are merged from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Settings file (`fscache.toml` or `--config`)
//! 3. CLI flags
//!
//! The merged result converts into an engine [`CacheConfig`](fscache_store::CacheConfig).

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveSettings, DEFAULT_SETTINGS_FILE};
pub use merge::{deep_merge, merge_layers};
