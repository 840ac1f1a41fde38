//! Configuration loader
//!
//! Loads [`CacheSettings`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. A `.env` file in the working directory is read into the environment
//!    (existing variables win)
//! 2. If `LAYERCACHE_BACKEND` is set, settings come from the environment
//! 3. Otherwise the first config file found by [`probe_config_paths`] is used
//! 4. With no file either, the defaults are used
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `LAYERCACHE_BACKEND`: `memory`, `remote` or `bounded` (required)
//! - `LAYERCACHE_COMPRESSION` / `LAYERCACHE_COMPRESSION_LEVEL`
//! - `LAYERCACHE_PARTITIONING` / `LAYERCACHE_SHARDS` (comma-separated)
//! - `LAYERCACHE_BOUNDED_CAPACITY` / `LAYERCACHE_BOUNDED_DURABLE`
//! - `LAYERCACHE_REMOTE_URL`, `LAYERCACHE_NODE_ID`
//! - `LAYERCACHE_WRITE_POLICY`: `through` or `behind`
//! - `LAYERCACHE_DEFAULT_TTL_MS`
//! - `LAYERCACHE_POOL_MIN` / `LAYERCACHE_POOL_MAX`
//! - `LAYERCACHE_STREAM_KEY`, `LAYERCACHE_CONSUMER_GROUP`,
//!   `LAYERCACHE_STREAM_MAX_LENGTH`, `LAYERCACHE_BLOCK_TIMEOUT_MS`
//! - `LAYERCACHE_LOG_LEVEL` / `LAYERCACHE_LOG_JSON`
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./layercache.toml` or `./layercache.json` (current working directory)
//! 2. `./config.toml` or `./config.json`
//! 3. The same names one and two directories up
//! 4. The same names next to the executable

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use layercache_domain::constants::ENV_PREFIX;
use layercache_domain::{CacheError, CacheResult, CacheSettings};

use crate::errors::InfraError;

const CONFIG_FILE_NAMES: [&str; 4] =
    ["layercache.toml", "layercache.json", "config.toml", "config.json"];

/// Load settings with automatic fallback strategy
///
/// # Errors
/// Returns `CacheError::Config` if the chosen source cannot be parsed or the
/// resulting settings fail validation.
pub fn load() -> CacheResult<CacheSettings> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    let settings = match load_from_env() {
        Ok(settings) => {
            tracing::info!("configuration loaded from environment variables");
            settings
        }
        Err(e) => {
            tracing::debug!(error = %e, "environment incomplete, trying file");
            match probe_config_paths() {
                Some(path) => load_from_file(Some(path))?,
                None => {
                    tracing::info!("no configuration source found, using defaults");
                    CacheSettings::default()
                }
            }
        }
    };

    settings.validate()?;
    Ok(settings)
}

/// Load settings from `LAYERCACHE_*` environment variables
///
/// `LAYERCACHE_BACKEND` must be present; everything else is optional. The
/// result is not validated.
///
/// # Errors
/// Returns `CacheError::Config` if `LAYERCACHE_BACKEND` is missing or any
/// variable has an invalid value.
pub fn load_from_env() -> CacheResult<CacheSettings> {
    let mut settings = CacheSettings {
        backend: parse_value("BACKEND", &env_var("BACKEND")?)?,
        ..CacheSettings::default()
    };

    settings.compression = env_bool("COMPRESSION", settings.compression);
    if let Some(level) = env_parse("COMPRESSION_LEVEL")? {
        settings.compression_level = level;
    }
    settings.partitioning = env_bool("PARTITIONING", settings.partitioning);
    if let Ok(shards) = env_var("SHARDS") {
        settings.shards = split_list(&shards);
    }
    if let Some(capacity) = env_parse("BOUNDED_CAPACITY")? {
        settings.bounded.capacity = capacity;
    }
    settings.bounded.durable = env_bool("BOUNDED_DURABLE", settings.bounded.durable);
    if let Ok(url) = env_var("REMOTE_URL") {
        settings.remote_url = url;
    }
    if let Ok(node_id) = env_var("NODE_ID") {
        settings.node_id = node_id;
    }
    if let Some(policy) = env_parse("WRITE_POLICY")? {
        settings.write_policy = policy;
    }
    if let Some(ttl_ms) = env_parse::<u64>("DEFAULT_TTL_MS")? {
        settings.default_ttl = Some(Duration::from_millis(ttl_ms));
    }

    if let Some(min) = env_parse("POOL_MIN")? {
        settings.pool.min = min;
    }
    if let Some(max) = env_parse("POOL_MAX")? {
        settings.pool.max = max;
    }

    if let Ok(stream_key) = env_var("STREAM_KEY") {
        settings.stream.stream_key = stream_key;
    }
    if let Ok(group) = env_var("CONSUMER_GROUP") {
        settings.stream.consumer_group = group;
    }
    if let Some(max_length) = env_parse("STREAM_MAX_LENGTH")? {
        settings.stream.max_length = max_length;
    }
    if let Some(block_ms) = env_parse::<u64>("BLOCK_TIMEOUT_MS")? {
        settings.stream.block_timeout = Duration::from_millis(block_ms);
    }

    if let Ok(level) = env_var("LOG_LEVEL") {
        settings.logging.level = level;
    }
    settings.logging.json = env_bool("LOG_JSON", settings.logging.json);

    Ok(settings)
}

/// Load settings from a file
///
/// If `path` is `None`, probes the standard locations. TOML and JSON are
/// supported, detected by extension. The result is not validated.
///
/// # Errors
/// Returns `CacheError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> CacheResult<CacheSettings> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CacheError::config(format!("config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CacheError::config("no config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;
    parse_config(&contents, &config_path)
}

/// Format is detected by file extension; anything but `.toml` is read as
/// JSON when the extension is missing
fn parse_config(contents: &str, path: &Path) -> CacheResult<CacheSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents).map_err(InfraError::from)?),
        "json" => Ok(serde_json::from_str(contents).map_err(InfraError::from)?),
        _ => Err(CacheError::config(format!("unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Read `LAYERCACHE_<name>`
///
/// # Errors
/// Returns `CacheError::Config` if the variable is not set.
fn env_var(name: &str) -> CacheResult<String> {
    let key = format!("{ENV_PREFIX}{name}");
    std::env::var(&key)
        .map_err(|_| CacheError::config(format!("missing environment variable: {key}")))
}

/// Parse `LAYERCACHE_<name>` if it is set
fn env_parse<T>(name: &str) -> CacheResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(name) {
        Ok(raw) => parse_value(name, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> CacheResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| CacheError::config(format!("invalid {ENV_PREFIX}{name} '{raw}': {e}")))
}

/// Parse boolean from `LAYERCACHE_<name>`
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(name: &str, default: bool) -> bool {
    env_var(name)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}
