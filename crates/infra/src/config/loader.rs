//! Configuration loader
//!
//! Loads [`ClientConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `TIDEWIRE_API_BASE_URL` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TIDEWIRE_API_BASE_URL`: REST API base URL (required)
//! - `TIDEWIRE_TIMEOUT_SECS`: Per-request timeout
//! - `TIDEWIRE_MAX_ATTEMPTS`: Total attempts for transient failures
//! - `TIDEWIRE_BASE_BACKOFF_MS`: Backoff base in milliseconds
//! - `TIDEWIRE_CACHE_TTL_SECS`: Default response cache TTL
//! - `TIDEWIRE_CACHE_MAX_ENTRIES`: Response cache capacity (0 = unbounded)
//! - `TIDEWIRE_CHUNK_SIZE_BYTES`: Upload chunk size
//! - `TIDEWIRE_PAGE_LIMIT`: Default page size
//! - `TIDEWIRE_SYNC_LOOKBACK_HOURS`: Sync window used before any checkpoint
//!
//! ## File Locations
//! The loader probes `tidewire.toml`, `tidewire.json`, `config.toml` and
//! `config.json` in the working directory, then in its parent and
//! grandparent.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tidewire_domain::{ClientConfig, Result, TidewireError};

const CONFIG_FILE_NAMES: [&str; 4] = ["tidewire.toml", "tidewire.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `TidewireError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only the base URL is required; unset optional variables keep their
/// defaults.
///
/// # Errors
/// Returns `TidewireError::Config` if the base URL is missing, a value does
/// not parse, or the result fails validation.
pub fn load_from_env() -> Result<ClientConfig> {
    let defaults = ClientConfig::default();

    let config = ClientConfig {
        base_url: env_var("TIDEWIRE_API_BASE_URL")?,
        timeout_secs: env_parse("TIDEWIRE_TIMEOUT_SECS", defaults.timeout_secs)?,
        max_attempts: env_parse("TIDEWIRE_MAX_ATTEMPTS", defaults.max_attempts)?,
        base_backoff_ms: env_parse("TIDEWIRE_BASE_BACKOFF_MS", defaults.base_backoff_ms)?,
        cache_ttl_secs: env_parse("TIDEWIRE_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
        cache_max_entries: env_parse("TIDEWIRE_CACHE_MAX_ENTRIES", defaults.cache_max_entries)?,
        chunk_size_bytes: env_parse("TIDEWIRE_CHUNK_SIZE_BYTES", defaults.chunk_size_bytes)?,
        page_limit: env_parse("TIDEWIRE_PAGE_LIMIT", defaults.page_limit)?,
        sync_default_lookback_hours: env_parse(
            "TIDEWIRE_SYNC_LOOKBACK_HOURS",
            defaults.sync_default_lookback_hours,
        )?,
        ..defaults
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is chosen by
/// extension.
///
/// # Errors
/// Returns `TidewireError::Config` if the file is missing, malformed, or
/// fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TidewireError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TidewireError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TidewireError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TidewireError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TidewireError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TidewireError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First config file found in the working directory or its two parents.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    probe_from(&cwd)
}

fn probe_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(3)
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        TidewireError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional environment variable, falling back to `default`.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| TidewireError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
