// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! syncBranch and resetBranch: both rebuild a branch's dataset
//! from a snapshot and restart its container; they differ only in which
//! snapshot is reused, so they share one routine.

use std::time::Duration;

use pgfork_core::{Branch, BranchLifecycle, Clock, EngineError, NamespacedName};
use tracing::info;

use crate::orchestrator::Orchestrator;

/// Where the snapshot rebuilt from comes from.
enum Origin {
    /// Take a fresh snapshot of the parent now (`syncBranch`).
    FreshFromParent,
    /// Reuse the branch's own original origin snapshot (`resetBranch`).
    OwnOriginSnapshot,
}

impl<C: Clock> Orchestrator<C> {
    pub async fn sync_branch(&self, target: &NamespacedName, force: bool) -> Result<Branch, EngineError> {
        self.rebuild_branch(target, force, Origin::FreshFromParent).await
    }

    pub async fn reset_branch(&self, target: &NamespacedName, force: bool) -> Result<Branch, EngineError> {
        self.rebuild_branch(target, force, Origin::OwnOriginSnapshot).await
    }

    async fn rebuild_branch(
        &self,
        target: &NamespacedName,
        force: bool,
        origin: Origin,
    ) -> Result<Branch, EngineError> {
        let doc = self.store.load()?;
        let branch = doc
            .branch(target.project(), target.branch())
            .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?
            .clone();
        if branch.is_primary() {
            return Err(EngineError::user("the primary branch cannot be synced or reset"));
        }
        let parent_id = branch
            .parent_id
            .ok_or_else(|| EngineError::invariant("non-primary branch has no recorded parent"))?;
        let entry = doc
            .project(target.project())
            .ok_or_else(|| EngineError::invariant("branch's project is missing from the catalog"))?;
        let parent = entry
            .branches
            .iter()
            .find(|b| b.id == parent_id)
            .ok_or_else(|| EngineError::invariant("branch's parent is missing from its own project"))?
            .clone();
        let project = entry.project.clone();

        let dependents: Vec<String> =
            doc.children_of(target.project(), branch.id).iter().map(|b| b.branch_name.clone()).collect();
        if !dependents.is_empty() && !force {
            return Err(EngineError::user_with_hint(
                format!("branch '{target}' has dependent branches"),
                "pass force to delete them too",
            ));
        }
        drop(doc);

        for dependent in dependents {
            let ns = NamespacedName::new(target.project(), dependent)?;
            self.delete_branch(&ns, true).await?;
        }

        // Stop + remove own container, destroy own dataset (with clones).
        let _ = self
            .container
            .stop(&branch.container_name, Duration::from_secs(self.config.stop_timeout_secs))
            .await;
        let _ = self.container.remove(&branch.container_name, true).await;
        if self.pool.dataset_exists(&branch.dataset_name).await? {
            let _ = self.pool.unmount_dataset(&branch.dataset_name).await;
            self.pool.destroy_dataset(&branch.dataset_name, true).await?;
        }

        let fq_snapshot = match origin {
            Origin::FreshFromParent => {
                if self.container.inspect_status(&parent.container_name).await?
                    == pgfork_adapters::ContainerStatus::Running
                {
                    self.container.exec_sql(&parent.container_name, "CHECKPOINT", &project.db_user).await?;
                }
                let label = format!("sync-{}", nanoid::nanoid!(8));
                self.pool.create_snapshot(&parent.dataset_name, &label).await?
            }
            Origin::OwnOriginSnapshot => branch
                .origin_snapshot
                .clone()
                .ok_or_else(|| EngineError::invariant("branch has no recorded origin snapshot to reset to"))?,
        };

        self.pool.clone_snapshot(&fq_snapshot, &branch.dataset_name).await?;
        self.pool.mount_dataset(&branch.dataset_name).await?;
        let mountpoint = self.pool.get_mountpoint(&branch.dataset_name).await?;
        let wal_path = self.wal.ensure_archive_dir(&branch.dataset_name)?;
        let cert_dir = self.config.cert_dir(target.project());

        let spec = crate::container_spec::build(&branch.container_name, &project, &mountpoint, &wal_path, &cert_dir);
        self.container.create(&spec).await?;
        self.container.start(&branch.container_name).await?;
        self.container
            .wait_healthy(&branch.container_name, Duration::from_secs(self.config.health_timeout_secs))
            .await?;
        let port = self.container.get_port(&branch.container_name, 5432).await?;

        let new_origin_snapshot = fq_snapshot.clone();

        let updated = self.store.with_lock(|doc| {
            let entry = doc
                .branch_mut(target.project(), target.branch())
                .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?;
            entry.origin_snapshot = Some(new_origin_snapshot.clone());
            entry.port = port;
            entry.lifecycle = BranchLifecycle::Running;
            Ok(entry.clone())
        })?;

        info!(branch = %target, "branch rebuilt");
        Ok(updated)
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

    #[tokio::test]
    async fn sync_refuses_primary() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let main = NamespacedName::new("api", "main").unwrap();
        assert!(orch.sync_branch(&main, false).await.is_err());
    }

    #[tokio::test]
    async fn sync_rebuilds_branch_and_bumps_origin_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let dev = NamespacedName::new("api", "dev").unwrap();
        let original = orch.create_branch(&dev, None, None).await.unwrap();

        let synced = orch.sync_branch(&dev, false).await.unwrap();
        assert_eq!(synced.lifecycle, BranchLifecycle::Running);
        assert_ne!(synced.origin_snapshot, original.origin_snapshot);
    }

    #[tokio::test]
    async fn reset_reuses_original_origin_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let dev = NamespacedName::new("api", "dev").unwrap();
        let original = orch.create_branch(&dev, None, None).await.unwrap();

        let reset = orch.reset_branch(&dev, false).await.unwrap();
        assert_eq!(reset.origin_snapshot, original.origin_snapshot);
    }

    #[tokio::test]
    async fn sync_refuses_with_dependents_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let dev = NamespacedName::new("api", "dev").unwrap();
        orch.create_branch(&dev, None, None).await.unwrap();
        let grandchild = NamespacedName::new("api", "dev2").unwrap();
        orch.create_branch(&grandchild, Some(&dev), None).await.unwrap();

        assert!(orch.sync_branch(&dev, false).await.is_err());
        orch.sync_branch(&dev, true).await.unwrap();
        assert!(orch.store.load().unwrap().branch("api", "dev2").is_none());
    }
}
