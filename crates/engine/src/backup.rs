// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! backupInit, backupPush, backupPull, backupList, backupCleanup:
//! an optional object-store destination for snapshot and WAL content,
//! shipped through the attached [`BackupAdapter`].

use pgfork_adapters::{BackupEntry, PayloadKind};
use pgfork_core::{BackupConfig, Clock, EngineError, NamespacedName, SnapshotId};
use tracing::info;

use crate::orchestrator::Orchestrator;

impl<C: Clock> Orchestrator<C> {
    /// Record the backup repository in the catalog. Does not touch the
    /// adapter itself — that's attached separately via
    /// [`Orchestrator::with_backup`].
    pub async fn backup_init(&self, config: BackupConfig) -> Result<(), EngineError> {
        self.store.with_lock(|doc| {
            doc.set_backup_config(config.clone());
            Ok(())
        })
    }

    fn require_backup(&self) -> Result<&dyn pgfork_adapters::BackupAdapter, EngineError> {
        self.backup
            .as_deref()
            .ok_or_else(|| EngineError::user_with_hint("no backup repository configured", "run `pgfork backup init` first"))
    }

    /// Push a branch's current dataset snapshot and WAL archive to the
    /// backup repository.
    pub async fn backup_push(&self, target: &NamespacedName, snapshot_id: SnapshotId) -> Result<(), EngineError> {
        let adapter = self.require_backup()?;
        let doc = self.store.load()?;
        let branch = doc
            .branch(target.project(), target.branch())
            .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))?
            .clone();
        drop(doc);

        let mountpoint = self.pool.get_mountpoint(&branch.dataset_name).await?;
        let archive_path = self.wal.get_archive_path(&branch.dataset_name);

        let data_entry = BackupEntry {
            snapshot_id: snapshot_id.to_string(),
            branch_name: target.to_string(),
            dataset_name: branch.dataset_name.clone(),
            kind: PayloadKind::Data,
            created_at: self.clock.now_utc(),
        };
        adapter.push(&data_entry, &mountpoint).await?;

        let wal_entry = BackupEntry { kind: PayloadKind::Wal, ..data_entry };
        adapter.push(&wal_entry, &archive_path).await?;

        info!(branch = %target, snapshot = %snapshot_id, "pushed to backup repository");
        Ok(())
    }

    /// Restore a snapshot's data tree from the backup repository into `dest`.
    pub async fn backup_pull(&self, snapshot_id: SnapshotId, dest: &std::path::Path) -> Result<(), EngineError> {
        let adapter = self.require_backup()?;
        adapter.pull(snapshot_id.as_str(), PayloadKind::Data, dest).await
    }

    /// List entries currently archived in the backup repository.
    pub async fn backup_list(&self) -> Result<Vec<BackupEntry>, EngineError> {
        self.require_backup()?.list().await
    }

    /// Delete archived entries older than `days`; returns the count removed.
    pub async fn backup_cleanup(&self, days: i64) -> Result<usize, EngineError> {
        let cutoff = self.clock.now_utc() - chrono::Duration::days(days);
        self.require_backup()?.cleanup(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use pgfork_adapters::{backup::fake::FakeBackupAdapter, container::fake::FakeContainerDriver, pool::fake::FakePoolDriver};
    use pgfork_core::FakeClock;
    use std::sync::Arc;

    fn test_orchestrator(dir: &std::path::Path) -> Orchestrator<FakeClock> {
        Orchestrator::new(
            EngineConfig::new(dir),
            Arc::new(FakePoolDriver::new()),
            Arc::new(FakeContainerDriver::new()),
            FakeClock::new(),
        )
        .with_backup(Arc::new(FakeBackupAdapter::new()))
    }

    fn backup_config() -> BackupConfig {
        BackupConfig {
            endpoint: "https://s3.example.com".into(),
            bucket: "pgfork-backups".into(),
            credentials: "RESTIC_TEST_PASSWORD".into(),
            repository_prefix: "api".into(),
            local_config_path: "/tmp/restic.conf".into(),
        }
    }

    #[tokio::test]
    async fn push_without_init_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(
            EngineConfig::new(dir.path()),
            Arc::new(FakePoolDriver::new()),
            Arc::new(FakeContainerDriver::new()),
            FakeClock::new(),
        );
        orch.create_project("api", None, None).await.unwrap();
        let main = NamespacedName::new("api", "main").unwrap();
        let err = orch.backup_push(&main, SnapshotId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::User { .. }));
    }

    #[tokio::test]
    async fn push_then_list_then_pull_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        orch.backup_init(backup_config()).await.unwrap();

        let main = NamespacedName::new("api", "main").unwrap();
        let snapshot = orch.create_snapshot(&main, Some("pre-backup")).await.unwrap();
        orch.backup_push(&main, snapshot.id).await.unwrap();

        let entries = orch.backup_list().await.unwrap();
        assert!(entries.iter().any(|e| e.snapshot_id == snapshot.id.to_string()));

        let dest = dir.path().join("restore");
        orch.backup_pull(snapshot.id, &dest).await.unwrap();
    }

    #[tokio::test]
    async fn cleanup_removes_entries_older_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        orch.backup_init(backup_config()).await.unwrap();

        let main = NamespacedName::new("api", "main").unwrap();
        let snapshot = orch.create_snapshot(&main, None).await.unwrap();
        orch.backup_push(&main, snapshot.id).await.unwrap();

        let removed = orch.backup_cleanup(-1).await.unwrap();
        assert_eq!(removed, 2);
    }
}
