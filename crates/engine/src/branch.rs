// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! createBranch, deleteBranch, and the container-only lifecycle operations.

use std::time::Duration;

use pgfork_core::{Branch, BranchLifecycle, Clock, EngineError, NamespacedName};
use tracing::info;

use crate::config::CONTAINER_PREFIX;
use crate::container_spec;
use crate::journal::RollbackJournal;
use crate::orchestrator::Orchestrator;

impl<C: Clock> Orchestrator<C> {
    /// The central branch-creation protocol.
    pub async fn create_branch(
        &self,
        target: &NamespacedName,
        source_override: Option<&NamespacedName>,
        pitr: Option<pgfork_core::RecoveryTarget>,
    ) -> Result<Branch, EngineError> {
        let source = match source_override {
            Some(s) => s.clone(),
            None => NamespacedName::new(target.project(), "main")?,
        };

        if source.project() != target.project() {
            return Err(EngineError::user("source and target must share a project"));
        }

        let doc = self.store.load()?;
        if doc.branch(target.project(), target.branch()).is_some() {
            return Err(EngineError::user(format!("branch '{target}' already exists")));
        }
        let source_branch = doc
            .branch(source.project(), source.branch())
            .ok_or_else(|| EngineError::user(format!("source branch '{source}' not found")))?
            .clone();
        let project = doc.project(target.project()).ok_or_else(|| EngineError::user("project not found"))?.project.clone();
        drop(doc);

        let mut journal = RollbackJournal::new();
        let is_pitr = pitr.is_some();

        // Phase 1: select origin snapshot.
        let fq_snapshot = match pitr {
            Some(ref target_time) => {
                let candidates = self.pool.list_snapshots(Some(&source_branch.dataset_name)).await?;
                let mut eligible: Vec<_> = candidates
                    .into_iter()
                    .filter(|s| s.created_at_epoch < target_time.0.timestamp())
                    .collect();
                eligible.sort_by_key(|s| s.created_at_epoch);
                eligible
                    .pop()
                    .ok_or_else(|| EngineError::user("no snapshot older than the requested recovery point"))?
                    .fq_name
            }
            None => {
                if self.container.inspect_status(&source_branch.container_name).await?
                    == pgfork_adapters::ContainerStatus::Running
                {
                    self.container
                        .exec_sql(&source_branch.container_name, "CHECKPOINT", &project.db_user)
                        .await?;
                }
                let label = format!("fork-{}", nanoid::nanoid!(8));
                let fq = self.pool.create_snapshot(&source_branch.dataset_name, &label).await?;
                let pool = self.pool.clone();
                let fq_undo = fq.clone();
                journal.push("destroy origin snapshot", async move {
                    let _ = pool.destroy_snapshot(&fq_undo).await;
                });
                fq
            }
        };

        // Phase 2: clone.
        let target_dataset = target.dataset_name();
        if let Err(e) = self.pool.clone_snapshot(&fq_snapshot, &target_dataset).await {
            journal.rollback().await;
            return Err(e);
        }
        {
            let pool = self.pool.clone();
            let dataset = target_dataset.clone();
            journal.push("destroy cloned dataset", async move {
                let _ = pool.destroy_dataset(&dataset, true).await;
            });
        }

        // Phase 3: mount.
        if let Err(e) = self.pool.mount_dataset(&target_dataset).await {
            journal.rollback().await;
            return Err(e);
        }
        let mountpoint = match self.pool.get_mountpoint(&target_dataset).await {
            Ok(m) => m,
            Err(e) => {
                journal.rollback().await;
                return Err(e);
            }
        };

        // Phase 4: WAL archive directory.
        let wal_path = match self.wal.ensure_archive_dir(&target_dataset) {
            Ok(p) => p,
            Err(e) => {
                journal.rollback().await;
                return Err(e);
            }
        };

        // Phase 5: PITR recovery config, sourced from the parent's archive.
        if let Some(target_time) = pitr {
            let parent_archive = self.wal.get_archive_path(&source_branch.dataset_name);
            if let Err(e) = self.wal.setup_pit_recovery(&mountpoint, &parent_archive, target_time) {
                journal.rollback().await;
                return Err(e);
            }
        }

        // Phase 6: create container.
        let container_name = target.container_name(CONTAINER_PREFIX);
        let cert_dir = self.config.cert_dir(target.project());
        let spec = container_spec::build(&container_name, &project, &mountpoint, &wal_path, &cert_dir);
        if let Err(e) = self.container.create(&spec).await {
            journal.rollback().await;
            return Err(e);
        }
        {
            let container = self.container.clone();
            let name = container_name.clone();
            journal.push("remove cloned container", async move {
                let _ = container.remove(&name, true).await;
            });
        }

        // Phase 7: start + wait healthy.
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

        // Phase 8: read port, persist.
        let port = match self.container.get_port(&container_name, 5432).await {
            Ok(p) => p,
            Err(e) => {
                journal.rollback().await;
                return Err(e);
            }
        };

        let branch = Branch {
            id: pgfork_core::BranchId::new(),
            project_name: target.project().to_string(),
            branch_name: target.branch().to_string(),
            parent_id: Some(source_branch.id),
            origin_snapshot: Some(fq_snapshot.clone()),
            dataset_name: target_dataset,
            container_name,
            port,
            lifecycle: BranchLifecycle::Running,
            created_at: self.clock.now_utc(),
        };

        let project_name = target.project().to_string();
        let result = self.store.with_lock(|doc| {
            doc.add_branch(&project_name, branch.clone())?;
            if !is_pitr {
                doc.add_snapshot(pgfork_core::Snapshot {
                    id: pgfork_core::SnapshotId::new(),
                    branch_name: source_branch.namespaced(),
                    fs_ref: fq_snapshot.clone(),
                    created_at: self.clock.now_utc(),
                    label: None,
                });
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                journal.commit();
                info!(branch = %target, "branch created");
                Ok(branch)
            }
            Err(e) => {
                journal.rollback().await;
                Err(e)
            }
        }
    }

    /// Refuses the primary. Without `force`, fails if descendants exist;
    /// with `force`, deletes descendants first (post-order).
    pub async fn delete_branch(&self, target: &NamespacedName, force: bool) -> Result<(), EngineError> {
        let doc = self.store.load()?;
        let branch = doc
            .branch(target.project(), target.branch())
            .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?
            .clone();
        if branch.is_primary() {
            return Err(EngineError::user("the primary branch can only be removed by deleting its project"));
        }
        let children = doc.children_of(target.project(), branch.id);
        if !children.is_empty() && !force {
            return Err(EngineError::user_with_hint(
                format!("branch '{target}' has dependent branches"),
                "pass force to delete them too",
            ));
        }
        let child_names: Vec<String> = children.iter().map(|b| b.branch_name.clone()).collect();
        drop(doc);

        for child in child_names {
            let child_ns = NamespacedName::new(target.project(), child)?;
            Box::pin(self.delete_branch(&child_ns, true)).await?;
        }

        self.destroy_branch_resources(&branch).await?;

        let namespaced = branch.namespaced();
        self.store.with_lock(|doc| {
            doc.remove_snapshots_for_branch(&namespaced);
            doc.remove_branch(target.project(), target.branch()).map(|_| ())
        })
    }

    pub(crate) async fn destroy_branch_resources(&self, branch: &Branch) -> Result<(), EngineError> {
        let _ = self.container.remove(&branch.container_name, true).await;
        let archive_path = self.wal.get_archive_path(&branch.dataset_name);
        let _ = std::fs::remove_dir_all(&archive_path);
        if self.pool.dataset_exists(&branch.dataset_name).await? {
            let _ = self.pool.unmount_dataset(&branch.dataset_name).await;
            self.pool.destroy_dataset(&branch.dataset_name, true).await?;
        }
        Ok(())
    }

    pub async fn start_branch(&self, target: &NamespacedName) -> Result<Branch, EngineError> {
        let branch = {
            let doc = self.store.load()?;
            doc.branch(target.project(), target.branch())
                .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?
                .clone()
        };

        if branch.lifecycle != BranchLifecycle::Running {
            self.container.start(&branch.container_name).await?;
            self.container
                .wait_healthy(&branch.container_name, Duration::from_secs(self.config.health_timeout_secs))
                .await?;
        }
        let port = self.container.get_port(&branch.container_name, 5432).await?;

        self.store.with_lock(|doc| {
            let branch = doc
                .branch_mut(target.project(), target.branch())
                .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?;
            branch.lifecycle = BranchLifecycle::Running;
            branch.port = port;
            Ok(branch.clone())
        })
    }

    pub async fn stop_branch(&self, target: &NamespacedName) -> Result<Branch, EngineError> {
        let branch = {
            let doc = self.store.load()?;
            doc.branch(target.project(), target.branch())
                .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?
                .clone()
        };

        if branch.lifecycle == BranchLifecycle::Running {
            self.container
                .stop(&branch.container_name, Duration::from_secs(self.config.stop_timeout_secs))
                .await?;
        }

        self.store.with_lock(|doc| {
            let branch = doc
                .branch_mut(target.project(), target.branch())
                .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?;
            branch.lifecycle = BranchLifecycle::Stopped;
            Ok(branch.clone())
        })
    }

    pub async fn restart_branch(&self, target: &NamespacedName) -> Result<Branch, EngineError> {
        let branch = {
            let doc = self.store.load()?;
            doc.branch(target.project(), target.branch())
                .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?
                .clone()
        };
        self.container.restart(&branch.container_name).await?;
        self.container
            .wait_healthy(&branch.container_name, Duration::from_secs(self.config.health_timeout_secs))
            .await?;
        let port = self.container.get_port(&branch.container_name, 5432).await?;

        self.store.with_lock(|doc| {
            let branch = doc
                .branch_mut(target.project(), target.branch())
                .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?;
            branch.lifecycle = BranchLifecycle::Running;
            branch.port = port;
            Ok(branch.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use pgfork_adapters::{container::fake::FakeContainerDriver, pool::fake::FakePoolDriver};
    use pgfork_core::FakeClock;
    use std::sync::Arc;

    fn test_orchestrator(dir: &std::path::Path) -> Orchestrator<FakeClock> {
        Orchestrator::new(
            EngineConfig::new(dir),
            Arc::new(FakePoolDriver::new()),
            Arc::new(FakeContainerDriver::new()),
            FakeClock::new(),
        )
    }

    async fn with_project(dir: &std::path::Path) -> Orchestrator<FakeClock> {
        let orch = test_orchestrator(dir);
        orch.create_project("api", None, None).await.unwrap();
        orch
    }

    #[tokio::test]
    async fn creates_branch_from_primary() {
        let dir = tempfile::tempdir().unwrap();
        let orch = with_project(dir.path()).await;
        let target = NamespacedName::new("api", "dev").unwrap();
        let branch = orch.create_branch(&target, None, None).await.unwrap();
        assert_eq!(branch.project_name, "api");
        assert!(!branch.is_primary());
        assert!(branch.port.is_some());
    }

    #[tokio::test]
    async fn rejects_duplicate_branch() {
        let dir = tempfile::tempdir().unwrap();
        let orch = with_project(dir.path()).await;
        let target = NamespacedName::new("api", "dev").unwrap();
        orch.create_branch(&target, None, None).await.unwrap();
        assert!(orch.create_branch(&target, None, None).await.is_err());
    }

    #[tokio::test]
    async fn delete_branch_refuses_primary() {
        let dir = tempfile::tempdir().unwrap();
        let orch = with_project(dir.path()).await;
        let main = NamespacedName::new("api", "main").unwrap();
        let err = orch.delete_branch(&main, false).await.unwrap_err();
        assert_eq!(err.kind(), pgfork_core::ErrorKind::User);
    }

    #[tokio::test]
    async fn delete_branch_refuses_with_dependents_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let orch = with_project(dir.path()).await;
        let dev = NamespacedName::new("api", "dev").unwrap();
        orch.create_branch(&dev, None, None).await.unwrap();
        let grandchild = NamespacedName::new("api", "dev2").unwrap();
        orch.create_branch(&grandchild, Some(&dev), None).await.unwrap();

        assert!(orch.delete_branch(&dev, false).await.is_err());
        orch.delete_branch(&dev, true).await.unwrap();

        let doc = orch.store.load().unwrap();
        assert!(doc.branch("api", "dev").is_none());
        assert!(doc.branch("api", "dev2").is_none());
    }

    #[tokio::test]
    async fn start_stop_restart_update_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let orch = with_project(dir.path()).await;
        let target = NamespacedName::new("api", "dev").unwrap();
        orch.create_branch(&target, None, None).await.unwrap();

        let stopped = orch.stop_branch(&target).await.unwrap();
        assert_eq!(stopped.lifecycle, BranchLifecycle::Stopped);

        let started = orch.start_branch(&target).await.unwrap();
        assert_eq!(started.lifecycle, BranchLifecycle::Running);
        assert!(started.port.is_some());

        let restarted = orch.restart_branch(&target).await.unwrap();
        assert_eq!(restarted.lifecycle, BranchLifecycle::Running);
    }
}
