// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! walInfo, walVerify, walCleanup: read-only reporting and
//! retention cleanup over a branch's WAL archive directory.

use pgfork_adapters::{ArchiveInfo, SegmentGap};
use pgfork_core::{Clock, EngineError, NamespacedName};

use crate::orchestrator::Orchestrator;

impl<C: Clock> Orchestrator<C> {
    pub async fn wal_info(&self, target: &NamespacedName) -> Result<ArchiveInfo, EngineError> {
        let branch = self.lookup_branch(target)?;
        self.wal.get_archive_info(&branch.dataset_name)
    }

    pub async fn wal_verify(&self, target: &NamespacedName) -> Result<Vec<SegmentGap>, EngineError> {
        let branch = self.lookup_branch(target)?;
        self.wal.verify_archive_integrity(&branch.dataset_name)
    }

    /// Unlink WAL segments older than `retention_days`; returns the count removed.
    pub async fn wal_cleanup(&self, target: &NamespacedName, retention_days: u32) -> Result<usize, EngineError> {
        let branch = self.lookup_branch(target)?;
        self.wal.cleanup_old_wals(&branch.dataset_name, retention_days, std::time::SystemTime::now())
    }

    fn lookup_branch(&self, target: &NamespacedName) -> Result<pgfork_core::Branch, EngineError> {
        let doc = self.store.load()?;
        doc.branch(target.project(), target.branch())
            .cloned()
            .ok_or_else(|| EngineError::user(format!("branch '{target}' not found")))
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
    async fn info_reports_empty_archive_for_fresh_branch() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let main = NamespacedName::new("api", "main").unwrap();
        let info = orch.wal_info(&main).await.unwrap();
        assert_eq!(info.file_count, 0);
    }

    #[tokio::test]
    async fn info_rejects_unknown_branch() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        let ghost = NamespacedName::new("api", "ghost").unwrap();
        assert!(orch.wal_info(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn cleanup_reports_zero_on_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let main = NamespacedName::new("api", "main").unwrap();
        assert_eq!(orch.wal_cleanup(&main, 7).await.unwrap(), 0);
    }
}
