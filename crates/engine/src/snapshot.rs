// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! createSnapshot, listSnapshots, deleteSnapshot, cleanupSnapshots:
//! straightforward catalog operations; `create` checkpoints a running branch
//! before taking the filesystem snapshot.

use chrono::Duration as ChronoDuration;
use pgfork_core::{Clock, EngineError, NamespacedName, Snapshot, SnapshotId};
use tracing::info;

use crate::orchestrator::Orchestrator;

impl<C: Clock> Orchestrator<C> {
    pub async fn create_snapshot(
        &self,
        target: &NamespacedName,
        label: Option<&str>,
    ) -> Result<Snapshot, EngineError> {
        let doc = self.store.load()?;
        let branch = doc
            .branch(target.project(), target.branch())
            .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?
            .clone();
        let project = doc
            .project(target.project())
            .ok_or_else(|| EngineError::user("project not found"))?
            .project
            .clone();
        drop(doc);

        if self.container.inspect_status(&branch.container_name).await?
            == pgfork_adapters::ContainerStatus::Running
        {
            self.container.exec_sql(&branch.container_name, "CHECKPOINT", &project.db_user).await?;
        }

        let short_label = label.map(str::to_string).unwrap_or_else(|| format!("manual-{}", nanoid::nanoid!(8)));
        let fq_snapshot = self.pool.create_snapshot(&branch.dataset_name, &short_label).await?;

        let snapshot = Snapshot {
            id: SnapshotId::new(),
            branch_name: target.to_string(),
            fs_ref: fq_snapshot,
            created_at: self.clock.now_utc(),
            label: label.map(str::to_string),
        };

        self.store.with_lock(|doc| {
            doc.add_snapshot(snapshot.clone());
            Ok(())
        })?;

        info!(branch = %target, snapshot = %snapshot.fs_ref, "snapshot created");
        Ok(snapshot)
    }

    /// `scope`, when given, restricts to snapshots recorded against that branch.
    pub fn list_snapshots(&self, scope: Option<&NamespacedName>) -> Result<Vec<Snapshot>, EngineError> {
        let doc = self.store.load()?;
        let snapshots = match scope {
            Some(ns) => doc.snapshots_for_branch(&ns.to_string()).into_iter().cloned().collect(),
            None => doc.snapshots.clone(),
        };
        Ok(snapshots)
    }

    pub async fn delete_snapshot(&self, id: SnapshotId) -> Result<(), EngineError> {
        let snapshot = self.store.with_lock(|doc| doc.remove_snapshot(id))?;
        if let Err(e) = self.pool.destroy_snapshot(&snapshot.fs_ref).await {
            tracing::warn!(snapshot = %snapshot.fs_ref, error = %e, "failed to destroy filesystem snapshot");
        }
        info!(snapshot = %snapshot.fs_ref, "snapshot deleted");
        Ok(())
    }

    /// Deletes snapshots older than `days` (optionally restricted to `scope`).
    /// With `dry_run`, reports what would be deleted without deleting it.
    pub async fn cleanup_snapshots(
        &self,
        scope: Option<&NamespacedName>,
        days: i64,
        dry_run: bool,
    ) -> Result<Vec<Snapshot>, EngineError> {
        let cutoff = self.clock.now_utc() - ChronoDuration::days(days);
        let doc = self.store.load()?;
        let stale: Vec<Snapshot> = doc
            .snapshots
            .iter()
            .filter(|s| s.created_at < cutoff)
            .filter(|s| scope.is_none_or(|ns| s.branch_name == ns.to_string()))
            .cloned()
            .collect();
        drop(doc);

        if dry_run {
            return Ok(stale);
        }
        for snapshot in &stale {
            self.delete_snapshot(snapshot.id).await?;
        }
        Ok(stale)
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
    async fn create_list_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let main = NamespacedName::new("api", "main").unwrap();

        let snap = orch.create_snapshot(&main, Some("checkpoint1")).await.unwrap();
        let listed = orch.list_snapshots(Some(&main)).unwrap();
        assert!(listed.iter().any(|s| s.id == snap.id));

        orch.delete_snapshot(snap.id).await.unwrap();
        let listed = orch.list_snapshots(Some(&main)).unwrap();
        assert!(listed.iter().all(|s| s.id != snap.id));
    }

    #[tokio::test]
    async fn cleanup_respects_dry_run_and_age_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let main = NamespacedName::new("api", "main").unwrap();
        orch.create_snapshot(&main, None).await.unwrap();

        let dry = orch.cleanup_snapshots(None, -1, true).await.unwrap();
        assert!(!dry.is_empty());
        // dry_run must not have deleted anything.
        assert!(!orch.list_snapshots(None).unwrap().is_empty());

        let removed = orch.cleanup_snapshots(None, -1, false).await.unwrap();
        assert_eq!(removed.len(), dry.len());
        assert!(orch.list_snapshots(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_keeps_snapshots_newer_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let main = NamespacedName::new("api", "main").unwrap();
        orch.create_snapshot(&main, None).await.unwrap();

        let removed = orch.cleanup_snapshots(None, 30, false).await.unwrap();
        assert!(removed.is_empty());
        assert!(!orch.list_snapshots(None).unwrap().is_empty());
    }
}
