// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! createProject.

use std::collections::BTreeMap;
use std::time::Duration;

use pgfork_core::{Branch, BranchLifecycle, Clock, EngineError, Project};
use pgfork_storage::CatalogDocument;
use tracing::info;

use crate::config::CONTAINER_PREFIX;
use crate::container_spec;
use crate::journal::RollbackJournal;
use crate::orchestrator::Orchestrator;

const DEFAULT_IMAGE: &str = "postgres:16";
const DEFAULT_DB_USER: &str = "postgres";

impl<C: Clock> Orchestrator<C> {
    /// Auto-initializes the catalog on first call: auto-detects the pool
    /// (exactly one present is used; zero or many without an override is
    /// an error), then creates credentials, the primary dataset, TLS
    /// material, and the primary container.
    pub async fn create_project(
        &self,
        name: &str,
        image: Option<&str>,
        pool_override: Option<&str>,
    ) -> Result<Project, EngineError> {
        if !pgfork_core::namespace::is_valid_name(name) {
            return Err(EngineError::user_with_hint(
                format!("invalid project name '{name}'"),
                "names must match [A-Za-z0-9_-]+ and be non-empty",
            ));
        }

        if !self.store.exists() {
            self.initialize_catalog(pool_override).await?;
        }

        let mut journal = RollbackJournal::new();

        let project = Project::new(
            name,
            DEFAULT_DB_USER,
            nanoid::nanoid!(24),
            name,
            image.unwrap_or(DEFAULT_IMAGE).to_string(),
            self.config.cert_dir(name).to_string_lossy().into_owned(),
        );

        let dataset_name = format!("{name}-main");
        self.pool
            .create_dataset(&dataset_name, &BTreeMap::new())
            .await?;
        {
            let dataset_name = dataset_name.clone();
            let pool = self.pool.clone();
            journal.push("destroy primary dataset", async move {
                let _ = pool.destroy_dataset(&dataset_name, true).await;
            });
        }

        let cert_dir = self.config.cert_dir(name);
        std::fs::create_dir_all(&cert_dir)
            .map_err(|e| EngineError::system(format!("failed to create cert dir {}: {e}", cert_dir.display())))?;

        let wal_path = self.wal.ensure_archive_dir(&dataset_name)?;

        let mountpoint = match self.pool.get_mountpoint(&dataset_name).await {
            Ok(m) => m,
            Err(e) => {
                journal.rollback().await;
                return Err(e);
            }
        };

        let container_name = format!("{CONTAINER_PREFIX}-{name}-main");
        let spec = container_spec::build(&container_name, &project, &mountpoint, &wal_path, &cert_dir);

        if let Err(e) = self.container.create(&spec).await {
            journal.rollback().await;
            return Err(e);
        }
        {
            let name = container_name.clone();
            let container = self.container.clone();
            journal.push("remove primary container", async move {
                let _ = container.remove(&name, true).await;
            });
        }

        if let Err(e) = self.container.start(&container_name).await {
            journal.rollback().await;
            return Err(e);
        }

        if let Err(e) = self
            .container
            .wait_healthy(&container_name, Duration::from_secs(self.config.health_timeout_secs))
            .await
        {
            journal.rollback().await;
            return Err(e);
        }

        let port = self.container.get_port(&container_name, 5432).await?;

        let primary = Branch {
            id: pgfork_core::BranchId::new(),
            project_name: name.to_string(),
            branch_name: "main".to_string(),
            parent_id: None,
            origin_snapshot: None,
            dataset_name,
            container_name,
            port,
            lifecycle: BranchLifecycle::Running,
            created_at: self.clock.now_utc(),
        };

        let result = self.store.with_lock(|doc| doc.add_project(project.clone(), primary));
        match result {
            Ok(()) => {
                journal.commit();
                info!(project = %name, "project created");
                Ok(project)
            }
            Err(e) => {
                journal.rollback().await;
                Err(e)
            }
        }
    }

    async fn initialize_catalog(&self, pool_override: Option<&str>) -> Result<(), EngineError> {
        let pool_id = match pool_override {
            Some(p) => p.to_string(),
            None => {
                let mut pools = self.pool.list_pools().await?;
                match pools.len() {
                    0 => {
                        return Err(EngineError::system_with_hint(
                            "no storage pool found",
                            "create a pool first, or pass an explicit pool override",
                        ))
                    }
                    1 => pools.pop().unwrap_or_default(),
                    _ => {
                        return Err(EngineError::user_with_hint(
                            format!("multiple storage pools found: {}", pools.join(", ")),
                            "pass an explicit pool override to disambiguate",
                        ))
                    }
                }
            }
        };

        if !self.pool.pool_exists(&pool_id).await? {
            return Err(EngineError::user(format!("pool '{pool_id}' does not exist")));
        }

        let dataset_base_path = format!("{pool_id}/{CONTAINER_PREFIX}");
        let doc = CatalogDocument::new(pool_id, dataset_base_path, self.clock.now_utc());
        self.store.save(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgfork_adapters::{container::fake::FakeContainerDriver, pool::fake::FakePoolDriver};
    use pgfork_core::FakeClock;
    use std::sync::Arc;

    fn test_orchestrator(dir: &std::path::Path) -> Orchestrator<FakeClock> {
        Orchestrator::new(
            crate::config::EngineConfig::new(dir),
            Arc::new(FakePoolDriver::new()),
            Arc::new(FakeContainerDriver::new()),
            FakeClock::new(),
        )
    }

    #[tokio::test]
    async fn creates_project_with_primary_branch() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        let project = orch.create_project("api", None, None).await.unwrap();
        assert_eq!(project.name, "api");

        let doc = orch.store.load().unwrap();
        let entry = doc.project("api").unwrap();
        assert_eq!(entry.branches.len(), 1);
        assert!(entry.branches[0].is_primary());
        assert_eq!(entry.branches[0].lifecycle, BranchLifecycle::Running);
    }

    #[tokio::test]
    async fn rejects_invalid_name() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        let err = orch.create_project("bad name!", None, None).await.unwrap_err();
        assert_eq!(err.kind(), pgfork_core::ErrorKind::User);
    }

    #[tokio::test]
    async fn second_project_reuses_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        orch.create_project("web", None, None).await.unwrap();
        let doc = orch.store.load().unwrap();
        assert_eq!(doc.projects.len(), 2);
    }
}
