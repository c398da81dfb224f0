//! fscache CLI
//!
//! Entry point for the `fscache` command-line tool. Values are JSON.
//!
//! Exit codes: 0 on success, 1 when a key is not found, 2 on errors.

use chrono::DateTime;
use clap::{Parser, Subcommand};
use fscache::config::DEFAULT_SETTINGS_FILE;
use fscache::{append_value, CacheKey, EffectiveSettings, FileCache, Namespace, TtlPolicy};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_NOT_FOUND: i32 = 1;
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "fscache")]
#[command(about = "Filesystem-backed key/value cache", version)]
struct Cli {
    /// Path to settings file (default: ./fscache.toml if present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Cache root directory (overrides settings)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Give up waiting for a file lock after this many milliseconds
    #[arg(long, global = true)]
    lock_timeout_ms: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a JSON value
    Store {
        key: String,

        /// JSON value (bare words are stored as strings)
        value: String,

        /// Group (namespace) to store under, e.g. "users/sessions"
        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Seconds until the entry expires
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Print a stored value
    Get {
        key: String,

        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Only return the value if it was stored at or after this Unix time
        #[arg(long)]
        newer_than: Option<i64>,
    },

    /// Atomically append to an array, string or number
    Append {
        key: String,

        /// JSON value to append
        value: String,

        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Restart the entry's TTL from now
        #[arg(long)]
        reset_ttl: bool,
    },

    /// Delete a single entry
    Invalidate {
        key: String,

        #[arg(long, short = 'g')]
        group: Option<String>,
    },

    /// Delete all entries in a group (the whole root if no group is given)
    InvalidateGroup {
        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Also clear subgroups (skipping those starting with '.')
        #[arg(long, short = 'r')]
        recursive: bool,
    },

    /// Print the effective settings as JSON
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match load_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(EXIT_ERROR);
        }
    };
    debug!(
        root = settings.get_str("cache.root").unwrap_or_default(),
        layers = settings.sources.len(),
        "loaded settings"
    );

    let code = match cli.command {
        Commands::Store {
            key,
            value,
            group,
            ttl,
        } => run_store(&settings, &key, &value, group.as_deref(), ttl),
        Commands::Get {
            key,
            group,
            newer_than,
        } => run_get(&settings, &key, group.as_deref(), newer_than),
        Commands::Append {
            key,
            value,
            group,
            reset_ttl,
        } => run_append(&settings, &key, &value, group.as_deref(), reset_ttl),
        Commands::Invalidate { key, group } => run_invalidate(&settings, &key, group.as_deref()),
        Commands::InvalidateGroup { group, recursive } => {
            run_invalidate_group(&settings, group.as_deref(), recursive)
        }
        Commands::Config => run_config(&settings),
    };

    process::exit(code);
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("FSCACHE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<EffectiveSettings, fscache::ConfigError> {
    let default_path = Path::new(DEFAULT_SETTINGS_FILE);
    let settings_path = cli.config.as_deref().unwrap_or(default_path);

    if cli.config.is_some() && !settings_path.exists() {
        return Err(fscache::ConfigError::IoError(format!(
            "settings file not found: {}",
            settings_path.display()
        )));
    }

    let mut overrides = serde_json::Map::new();
    if let Some(root) = &cli.root {
        overrides.insert(
            "root".to_string(),
            Value::String(root.to_string_lossy().to_string()),
        );
    }
    if let Some(ms) = cli.lock_timeout_ms {
        overrides.insert("lock_timeout_ms".to_string(), Value::from(ms));
    }

    let cli_layer = if overrides.is_empty() {
        None
    } else {
        Some(serde_json::json!({ "cache": overrides }))
    };

    EffectiveSettings::build(Some(settings_path), cli_layer)
}

fn open_cache(settings: &EffectiveSettings) -> FileCache {
    FileCache::new(settings.cache_config())
}

fn make_key(key: &str, group: Option<&str>) -> Result<CacheKey, i32> {
    let result = match group {
        Some(g) => CacheKey::in_group(key, g),
        None => Ok(CacheKey::new(key)),
    };
    result.map_err(|e| {
        eprintln!("Error: {}", e);
        EXIT_ERROR
    })
}

/// Parse a CLI value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_value(value: &Value) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing value: {}", e),
    }
}

fn run_store(
    settings: &EffectiveSettings,
    key: &str,
    value: &str,
    group: Option<&str>,
    ttl: Option<u64>,
) -> i32 {
    let key = match make_key(key, group) {
        Ok(k) => k,
        Err(code) => return code,
    };

    match open_cache(settings).store(&key, &parse_value(value), ttl) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error storing {}: {}", key, e);
            EXIT_ERROR
        }
    }
}

fn run_get(
    settings: &EffectiveSettings,
    key: &str,
    group: Option<&str>,
    newer_than: Option<i64>,
) -> i32 {
    let key = match make_key(key, group) {
        Ok(k) => k,
        Err(code) => return code,
    };
    let cache = open_cache(settings);

    let result = match newer_than {
        Some(secs) => match DateTime::from_timestamp(secs, 0) {
            Some(instant) => cache.retrieve_newer_than::<Value>(&key, instant),
            None => {
                eprintln!("Error: --newer-than {} is out of range", secs);
                return EXIT_ERROR;
            }
        },
        None => cache.retrieve::<Value>(&key),
    };

    match result {
        Ok(Some(value)) => {
            print_value(&value);
            0
        }
        Ok(None) => EXIT_NOT_FOUND,
        Err(e) => {
            eprintln!("Error retrieving {}: {}", key, e);
            EXIT_ERROR
        }
    }
}

fn run_append(
    settings: &EffectiveSettings,
    key: &str,
    value: &str,
    group: Option<&str>,
    reset_ttl: bool,
) -> i32 {
    let key = match make_key(key, group) {
        Ok(k) => k,
        Err(code) => return code,
    };
    let addition = parse_value(value);
    let policy = if reset_ttl {
        TtlPolicy::Reset
    } else {
        TtlPolicy::Preserve
    };

    match open_cache(settings).get_and_modify(&key, policy, |current: Value| {
        append_value(current, &addition)
    }) {
        Ok(Some(updated)) => {
            print_value(&updated);
            0
        }
        Ok(None) => EXIT_NOT_FOUND,
        Err(e) => {
            eprintln!("Error modifying {}: {}", key, e);
            EXIT_ERROR
        }
    }
}

fn run_invalidate(settings: &EffectiveSettings, key: &str, group: Option<&str>) -> i32 {
    let key = match make_key(key, group) {
        Ok(k) => k,
        Err(code) => return code,
    };

    match open_cache(settings).invalidate(&key) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("Error invalidating {}: {}", key, e);
            EXIT_ERROR
        }
    }
}

fn run_invalidate_group(settings: &EffectiveSettings, group: Option<&str>, recursive: bool) -> i32 {
    let namespace = match group.map(Namespace::parse).transpose() {
        Ok(ns) => ns,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_ERROR;
        }
    };

    match open_cache(settings).invalidate_group(namespace.as_ref(), recursive) {
        Ok(report) => {
            println!("Removed {} entries", report.removed);
            for dir in &report.skipped_dirs {
                println!("Skipped {}", dir.display());
            }
            0
        }
        Err(e) => {
            eprintln!("Error invalidating group: {}", e);
            EXIT_ERROR
        }
    }
}

fn run_config(settings: &EffectiveSettings) -> i32 {
    match settings.to_json() {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error serializing settings: {}", e);
            EXIT_ERROR
        }
    }
}
