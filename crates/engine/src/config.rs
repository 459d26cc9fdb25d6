// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Static configuration the orchestrator needs beyond the catalog itself.

use std::path::PathBuf;
use std::time::Duration;

/// Deterministic prefix applied to every container name this tool manages.
pub const CONTAINER_PREFIX: &str = "pgfork";

/// In-container path the database's data directory is bind-mounted to.
pub const CONTAINER_DATA_PATH: &str = "/var/lib/postgresql/data";

/// In-container path the branch's WAL archive directory is bind-mounted to.
pub const CONTAINER_WAL_ARCHIVE_PATH: &str = "/var/lib/postgresql/wal-archive";

/// In-container path the project's TLS material is bind-mounted to (read-only).
pub const CONTAINER_CERT_PATH: &str = "/var/lib/postgresql/certs";

/// Default container health-wait timeout.
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 60;

/// Default container stop timeout.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 30;

/// Default catalog lock poll interval.
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default catalog lock poll attempt bound.
pub const DEFAULT_LOCK_MAX_ATTEMPTS: u32 = 50;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for everything this invocation touches: catalog,
    /// WAL archives, TLS material.
    pub state_dir: PathBuf,
    /// How long to wait for a container to report healthy.
    pub health_timeout_secs: u64,
    /// How long to give a container to stop gracefully before the next step.
    pub stop_timeout_secs: u64,
    /// How long to sleep between attempts to acquire the catalog lock.
    pub lock_poll_interval: Duration,
    /// How many times to retry acquiring the catalog lock before giving up.
    pub lock_max_attempts: u32,
}

impl EngineConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            health_timeout_secs: DEFAULT_HEALTH_TIMEOUT_SECS,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            lock_max_attempts: DEFAULT_LOCK_MAX_ATTEMPTS,
        }
    }

    /// Like [`Self::new`] but with configurable health-wait/stop timeouts.
    pub fn with_timeouts(mut self, health_timeout_secs: u64, stop_timeout_secs: u64) -> Self {
        self.health_timeout_secs = health_timeout_secs;
        self.stop_timeout_secs = stop_timeout_secs;
        self
    }

    /// Like [`Self::new`] but with a configurable catalog lock poll interval/bound.
    pub fn with_lock_params(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.lock_poll_interval = poll_interval;
        self.lock_max_attempts = max_attempts;
        self
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir.join("catalog.json")
    }

    pub fn wal_archive_root(&self) -> PathBuf {
        self.state_dir.join("wal")
    }

    pub fn cert_dir(&self, project_name: &str) -> PathBuf {
        self.state_dir.join("certs").join(project_name)
    }
}
