//! Configuration Module
//!
//! Cache configuration is immutable once built. Callers describe the options
//! they care about in a `CacheOverrides` and merge it onto the defaults;
//! `Config::from_env` does the same from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Bytes per megabyte, used by the MB-denominated options.
pub const MB: u64 = 1024 * 1024;

// == Cache Config ==
/// Options recognized by the tiered cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Fast-tier memory budget in bytes
    pub max_memory_size: u64,
    /// Per-backend persistent storage budget in bytes
    pub max_storage_size: u64,
    /// TTL applied when `set` is called without one
    pub default_ttl: Duration,
    /// Payloads smaller than this many bytes are persisted uncompressed
    pub compression_threshold: usize,
    /// Write-through to the persistent tier
    pub enable_persistent_tier: bool,
    /// Invoke the warmup hook after writes
    pub enable_predictive: bool,
    /// Interval of the background TTL sweep
    pub sweep_interval: Duration,
    /// Entries at or below this many bytes stay memory-only
    pub persist_min_size: usize,
    /// Upper bound on any single persistent-tier operation
    pub persist_timeout: Duration,
    /// Directory of the durable file store; `None` runs fallback-only
    pub persist_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_size: 50 * MB,
            max_storage_size: 200 * MB,
            default_ttl: Duration::from_millis(600_000),
            compression_threshold: 10_240,
            enable_persistent_tier: true,
            enable_predictive: true,
            sweep_interval: Duration::from_secs(300),
            persist_min_size: 1024,
            persist_timeout: Duration::from_millis(2_000),
            persist_dir: None,
        }
    }
}

// == Overrides ==
/// Caller-supplied options; unset fields keep their default.
#[derive(Debug, Clone, Default)]
pub struct CacheOverrides {
    pub max_memory_size: Option<u64>,
    pub max_storage_size: Option<u64>,
    pub default_ttl: Option<Duration>,
    pub compression_threshold: Option<usize>,
    pub enable_persistent_tier: Option<bool>,
    pub enable_predictive: Option<bool>,
    pub sweep_interval: Option<Duration>,
    pub persist_min_size: Option<usize>,
    pub persist_timeout: Option<Duration>,
    pub persist_dir: Option<PathBuf>,
}

impl CacheConfig {
    /// Builds a config by merging `overrides` onto the defaults.
    ///
    /// A zero TTL is ignored because every entry must have a positive TTL.
    pub fn with_overrides(overrides: CacheOverrides) -> Self {
        let defaults = Self::default();
        Self {
            max_memory_size: overrides.max_memory_size.unwrap_or(defaults.max_memory_size),
            max_storage_size: overrides
                .max_storage_size
                .unwrap_or(defaults.max_storage_size),
            default_ttl: overrides
                .default_ttl
                .filter(|ttl| !ttl.is_zero())
                .unwrap_or(defaults.default_ttl),
            compression_threshold: overrides
                .compression_threshold
                .unwrap_or(defaults.compression_threshold),
            enable_persistent_tier: overrides
                .enable_persistent_tier
                .unwrap_or(defaults.enable_persistent_tier),
            enable_predictive: overrides
                .enable_predictive
                .unwrap_or(defaults.enable_predictive),
            sweep_interval: overrides
                .sweep_interval
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.sweep_interval),
            persist_min_size: overrides
                .persist_min_size
                .unwrap_or(defaults.persist_min_size),
            persist_timeout: overrides
                .persist_timeout
                .unwrap_or(defaults.persist_timeout),
            persist_dir: overrides.persist_dir.or(defaults.persist_dir),
        }
    }
}

// == Service Config ==
/// Configuration of the HTTP service binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Cache options
    pub cache: CacheConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MAX_MEMORY_SIZE_MB` - Fast-tier budget (default: 50)
    /// - `MAX_STORAGE_SIZE_MB` - Persistent budget per backend (default: 200)
    /// - `DEFAULT_TTL_MS` - Default TTL (default: 600000)
    /// - `COMPRESSION_THRESHOLD` - Bytes before compressing (default: 10240)
    /// - `ENABLE_PERSISTENT_TIER` / `ENABLE_PREDICTIVE` - Booleans (default: true)
    /// - `SWEEP_INTERVAL_SECS` - TTL sweep interval (default: 300)
    /// - `PERSIST_MIN_SIZE` - Persistence floor in bytes (default: 1024)
    /// - `PERSIST_TIMEOUT_MS` - Persistent-tier timeout (default: 2000)
    /// - `PERSIST_DIR` - Directory of the durable store (default: unset)
    pub fn from_env() -> Self {
        let overrides = CacheOverrides {
            max_memory_size: env_parse::<u64>("MAX_MEMORY_SIZE_MB").map(|mb| mb * MB),
            max_storage_size: env_parse::<u64>("MAX_STORAGE_SIZE_MB").map(|mb| mb * MB),
            default_ttl: env_parse("DEFAULT_TTL_MS").map(Duration::from_millis),
            compression_threshold: env_parse("COMPRESSION_THRESHOLD"),
            enable_persistent_tier: env_parse("ENABLE_PERSISTENT_TIER"),
            enable_predictive: env_parse("ENABLE_PREDICTIVE"),
            sweep_interval: env_parse("SWEEP_INTERVAL_SECS").map(Duration::from_secs),
            persist_min_size: env_parse("PERSIST_MIN_SIZE"),
            persist_timeout: env_parse("PERSIST_TIMEOUT_MS").map(Duration::from_millis),
            persist_dir: env::var("PERSIST_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        };

        Self {
            server_port: env_parse("SERVER_PORT").unwrap_or(3000),
            cache: CacheConfig::with_overrides(overrides),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache: CacheConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
