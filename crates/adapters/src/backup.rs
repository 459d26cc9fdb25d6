// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Backup Adapter: optionally ships snapshot and WAL content to
//! a content-addressed object-store repository and restores from it.
//! The real implementation wraps `restic`, keeping with this stack's
//! pattern of shelling out to a CLI rather than linking a storage SDK.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pgfork_core::{BackupConfig, EngineError};

use crate::process;

/// What kind of tree a backup entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Data,
    Wal,
}

impl PayloadKind {
    fn tag(self) -> &'static str {
        match self {
            PayloadKind::Data => "type:data",
            PayloadKind::Wal => "type:wal",
        }
    }
}

/// A single archived entry in the backup repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub snapshot_id: String,
    pub branch_name: String,
    pub dataset_name: String,
    pub kind: PayloadKind,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait BackupAdapter: Send + Sync {
    /// Push `source` (a mounted snapshot tree, or a WAL archive tree) into
    /// the repository, tagged by branch, dataset, snapshot, and kind.
    async fn push(&self, entry: &BackupEntry, source: &Path) -> Result<(), EngineError>;

    /// Pull the tagged tree for `snapshot_id`/`kind` into `target`.
    async fn pull(&self, snapshot_id: &str, kind: PayloadKind, target: &Path) -> Result<(), EngineError>;

    /// Delete entries older than `cutoff`.
    async fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize, EngineError>;

    /// List archived entries, most recent first.
    async fn list(&self) -> Result<Vec<BackupEntry>, EngineError>;
}

/// `restic`-backed [`BackupAdapter`].
pub struct ResticBackupAdapter {
    repository: String,
    password_env: String,
}

impl ResticBackupAdapter {
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            repository: format!("{}/{}", config.endpoint.trim_end_matches('/'), config.bucket),
            password_env: config.credentials.clone(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, EngineError> {
        let mut full_args = vec!["-r", &self.repository];
        full_args.extend_from_slice(args);
        std::env::set_var("RESTIC_PASSWORD", &self.password_env);
        process::run("restic", &full_args).await
    }
}

#[async_trait]
impl BackupAdapter for ResticBackupAdapter {
    async fn push(&self, entry: &BackupEntry, source: &Path) -> Result<(), EngineError> {
        let source_str = source.to_string_lossy().into_owned();
        let branch_tag = format!("branch:{}", entry.branch_name);
        let dataset_tag = format!("dataset:{}", entry.dataset_name);
        let snapshot_tag = format!("snapshot:{}", entry.snapshot_id);
        self.run(&[
            "backup",
            &source_str,
            "--tag",
            &branch_tag,
            "--tag",
            &dataset_tag,
            "--tag",
            &snapshot_tag,
            "--tag",
            entry.kind.tag(),
        ])
        .await?;
        Ok(())
    }

    async fn pull(&self, snapshot_id: &str, kind: PayloadKind, target: &Path) -> Result<(), EngineError> {
        let snapshot_tag = format!("tag:snapshot:{snapshot_id}");
        let target_str = target.to_string_lossy().into_owned();
        self.run(&["restore", "latest", "--tag", &snapshot_tag, "--tag", &format!("tag:{}", kind.tag()), "--target", &target_str])
            .await?;
        Ok(())
    }

    async fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize, EngineError> {
        let before = cutoff.to_rfc3339();
        let out = self
            .run(&["forget", "--prune", "--keep-within", &format!("{}s", (Utc::now() - cutoff).num_seconds().max(0))])
            .await?;
        let _ = before;
        Ok(out.lines().filter(|l| l.starts_with("remove")).count())
    }

    async fn list(&self) -> Result<Vec<BackupEntry>, EngineError> {
        let out = self.run(&["snapshots", "--json"]).await?;
        let raw: Vec<serde_json::Value> = serde_json::from_str(&out)
            .map_err(|e| EngineError::system(format!("failed to parse restic snapshot list: {e}")))?;

        let tag_value = |tags: &[String], prefix: &str| -> Option<String> {
            tags.iter().find_map(|t| t.strip_prefix(prefix).map(str::to_string))
        };

        let mut entries = Vec::new();
        for snap in &raw {
            let tags: Vec<String> = snap
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let snapshot_id = match tag_value(&tags, "snapshot:") {
                Some(id) => id,
                None => continue,
            };
            let branch_name = tag_value(&tags, "branch:").unwrap_or_default();
            let dataset_name = tag_value(&tags, "dataset:").unwrap_or_default();
            let kind = if tags.iter().any(|t| t == "type:wal") { PayloadKind::Wal } else { PayloadKind::Data };
            let created_at = snap
                .get("time")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            entries.push(BackupEntry { snapshot_id, branch_name, dataset_name, kind, created_at });
        }
        entries.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        Ok(entries)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeBackupAdapter {
        entries: Mutex<Vec<BackupEntry>>,
    }

    impl FakeBackupAdapter {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl BackupAdapter for FakeBackupAdapter {
        async fn push(&self, entry: &BackupEntry, _source: &Path) -> Result<(), EngineError> {
            self.entries.lock().push(entry.clone());
            Ok(())
        }

        async fn pull(&self, snapshot_id: &str, kind: PayloadKind, _target: &Path) -> Result<(), EngineError> {
            let found = self.entries.lock().iter().any(|e| e.snapshot_id == snapshot_id && e.kind == kind);
            if found {
                Ok(())
            } else {
                Err(EngineError::user(format!("no backup entry for snapshot '{snapshot_id}'")))
            }
        }

        async fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize, EngineError> {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|e| e.created_at >= cutoff);
            Ok(before - entries.len())
        }

        async fn list(&self) -> Result<Vec<BackupEntry>, EngineError> {
            let mut entries = self.entries.lock().clone();
            entries.sort_by_key(|e| std::cmp::Reverse(e.created_at));
            Ok(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeBackupAdapter;
    use super::*;
    use std::path::PathBuf;

    fn entry(id: &str) -> BackupEntry {
        BackupEntry {
            snapshot_id: id.to_string(),
            branch_name: "api/dev".into(),
            dataset_name: "api-dev".into(),
            kind: PayloadKind::Data,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn push_then_pull_round_trips() {
        let adapter = FakeBackupAdapter::new();
        adapter.push(&entry("snap1"), &PathBuf::from("/tmp/src")).await.unwrap();
        adapter.pull("snap1", PayloadKind::Data, &PathBuf::from("/tmp/dst")).await.unwrap();
    }

    #[tokio::test]
    async fn pull_missing_snapshot_is_user_error() {
        let adapter = FakeBackupAdapter::new();
        let err = adapter.pull("ghost", PayloadKind::Data, &PathBuf::from("/tmp/dst")).await.unwrap_err();
        assert_eq!(err.kind(), pgfork_core::ErrorKind::User);
    }

    #[tokio::test]
    async fn cleanup_removes_entries_before_cutoff() {
        let adapter = FakeBackupAdapter::new();
        adapter.push(&entry("old"), &PathBuf::from("/tmp/src")).await.unwrap();
        let removed = adapter.cleanup(Utc::now() + chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 1);
    }
}
