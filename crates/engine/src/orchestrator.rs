// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! The Branching Orchestrator: owns every external driver and
//! the catalog, and implements the create/delete/sync/reset/PITR protocols.

use std::sync::Arc;

use pgfork_adapters::{BackupAdapter, ContainerDriver, PoolDriver, WalManager};
use pgfork_core::{Clock, EngineError, SystemClock};
use pgfork_storage::{CatalogDocument, CatalogStore};

use crate::config::EngineConfig;

pub struct Orchestrator<C: Clock = SystemClock> {
    pub(crate) store: CatalogStore,
    pub(crate) pool: Arc<dyn PoolDriver>,
    pub(crate) container: Arc<dyn ContainerDriver>,
    pub(crate) wal: WalManager,
    pub(crate) backup: Option<Arc<dyn BackupAdapter>>,
    pub(crate) clock: C,
    pub(crate) config: EngineConfig,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        config: EngineConfig,
        pool: Arc<dyn PoolDriver>,
        container: Arc<dyn ContainerDriver>,
        clock: C,
    ) -> Self {
        let store = CatalogStore::with_lock_params(config.catalog_path(), config.lock_poll_interval, config.lock_max_attempts);
        let wal = WalManager::new(config.wal_archive_root());
        Self { store, pool, container, wal, backup: None, clock, config }
    }

    /// Attach the object-store backup driver; absent by
    /// default since it needs a backup repository to have been configured.
    pub fn with_backup(mut self, backup: Arc<dyn BackupAdapter>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Read-only snapshot of the full catalog document, for status/list/get
    /// views with no mutation of their own.
    pub fn catalog(&self) -> Result<CatalogDocument, EngineError> {
        self.store.load()
    }

    /// Has `createProject` ever run against this state directory?
    pub fn catalog_exists(&self) -> bool {
        self.store.exists()
    }
}

impl Orchestrator<SystemClock> {
    pub fn with_defaults(
        config: EngineConfig,
        pool: Arc<dyn PoolDriver>,
        container: Arc<dyn ContainerDriver>,
    ) -> Self {
        Self::new(config, pool, container, SystemClock)
    }
}
