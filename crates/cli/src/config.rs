// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Layered configuration: CLI flag > `PGFORK_*` env var >
//! `$XDG_CONFIG_HOME/pgfork/config.toml` > built-in default.

use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_IMAGE: &str = "postgres:16";
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WAL_RETENTION_DAYS: u32 = 7;
const DEFAULT_LOCK_POLL_MS: u64 = 100;
const DEFAULT_LOCK_MAX_ATTEMPTS: u32 = 50;

/// On-disk `config.toml`, every field optional: absence falls through to
/// the env var / built-in default.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    state_dir: Option<PathBuf>,
    pool_name: Option<String>,
    default_image: Option<String>,
    health_timeout_secs: Option<u64>,
    stop_timeout_secs: Option<u64>,
    wal_retention_days: Option<u32>,
    lock_poll_interval_ms: Option<u64>,
    lock_max_attempts: Option<u32>,
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub pool_name: Option<String>,
    pub default_image: String,
    pub health_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub wal_retention_days: u32,
    pub lock_poll_interval_ms: u64,
    pub lock_max_attempts: u32,
}

impl Config {
    /// Resolve every field: CLI flag override > env var > config file > default.
    pub fn load(state_dir_flag: Option<PathBuf>, pool_flag: Option<String>) -> anyhow::Result<Self> {
        let file = load_file_config()?;

        let state_dir = state_dir_flag
            .or_else(|| std::env::var("PGFORK_STATE_DIR").ok().map(PathBuf::from))
            .or(file.state_dir)
            .unwrap_or_else(default_state_dir);

        let pool_name = pool_flag.or_else(|| std::env::var("PGFORK_POOL").ok()).or(file.pool_name);

        let default_image = std::env::var("PGFORK_IMAGE").ok().or(file.default_image).unwrap_or_else(|| DEFAULT_IMAGE.to_string());

        let health_timeout_secs = env_u64("PGFORK_HEALTH_TIMEOUT_SECS")
            .or(file.health_timeout_secs)
            .unwrap_or(DEFAULT_HEALTH_TIMEOUT_SECS);

        let stop_timeout_secs =
            env_u64("PGFORK_STOP_TIMEOUT_SECS").or(file.stop_timeout_secs).unwrap_or(DEFAULT_STOP_TIMEOUT_SECS);

        let wal_retention_days = std::env::var("PGFORK_WAL_RETENTION_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(file.wal_retention_days)
            .unwrap_or(DEFAULT_WAL_RETENTION_DAYS);

        let lock_poll_interval_ms =
            env_u64("PGFORK_LOCK_POLL_MS").or(file.lock_poll_interval_ms).unwrap_or(DEFAULT_LOCK_POLL_MS);

        let lock_max_attempts = std::env::var("PGFORK_LOCK_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(file.lock_max_attempts)
            .unwrap_or(DEFAULT_LOCK_MAX_ATTEMPTS);

        Ok(Self {
            state_dir,
            pool_name,
            default_image,
            health_timeout_secs,
            stop_timeout_secs,
            wal_retention_days,
            lock_poll_interval_ms,
            lock_max_attempts,
        })
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PGFORK_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("pgfork")
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pgfork").join("config.toml"))
}

fn load_file_config() -> anyhow::Result<FileConfig> {
    let Some(path) = config_file_path() else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    let parsed: FileConfig = toml::from_str(&contents)?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_built_in_defaults() {
        std::env::remove_var("PGFORK_STATE_DIR");
        std::env::remove_var("PGFORK_IMAGE");
        let cfg = Config::load(Some(PathBuf::from("/tmp/pgfork-test-state")), None).unwrap();
        assert_eq!(cfg.default_image, DEFAULT_IMAGE);
        assert_eq!(cfg.health_timeout_secs, DEFAULT_HEALTH_TIMEOUT_SECS);
        assert_eq!(cfg.wal_retention_days, DEFAULT_WAL_RETENTION_DAYS);
    }

    #[test]
    fn cli_flag_overrides_everything() {
        let cfg = Config::load(Some(PathBuf::from("/tmp/pgfork-flag-dir")), Some("tank2".into())).unwrap();
        assert_eq!(cfg.state_dir, PathBuf::from("/tmp/pgfork-flag-dir"));
        assert_eq!(cfg.pool_name.as_deref(), Some("tank2"));
    }
}
