// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Builds one [`Orchestrator`] per CLI invocation: the engine process is a
//! short-lived command executor, not a daemon, so there is no long-lived
//! state to hand off between commands.

use std::sync::Arc;

use pgfork_adapters::{DockerContainerDriver, ResticBackupAdapter};
use pgfork_engine::{EngineConfig, Orchestrator};
use pgfork_storage::CatalogStore;

use crate::config::Config;
use crate::drivers::build_pool_driver;

pub async fn build_orchestrator(config: &Config) -> anyhow::Result<Orchestrator> {
    let engine_config = EngineConfig::new(config.state_dir.clone())
        .with_timeouts(config.health_timeout_secs, config.stop_timeout_secs)
        .with_lock_params(
            std::time::Duration::from_millis(config.lock_poll_interval_ms),
            config.lock_max_attempts,
        );

    let pool = build_pool_driver(config).await?;
    let container = Arc::new(DockerContainerDriver::new());

    let mut orchestrator = Orchestrator::with_defaults(engine_config.clone(), pool, container);

    let store = CatalogStore::new(engine_config.catalog_path());
    if store.exists() {
        if let Ok(doc) = store.load() {
            if let Some(backup_config) = doc.backup {
                orchestrator = orchestrator.with_backup(Arc::new(ResticBackupAdapter::from_config(&backup_config)));
            }
        }
    }

    Ok(orchestrator)
}
