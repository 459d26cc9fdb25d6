// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Snapshot/Clone Driver: wraps a copy-on-write block store.
//! The only implementation shells out to the `zfs`/`zpool` CLIs, matching
//! how the rest of this stack talks to external systems (see [`crate::process`]).

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use pgfork_core::EngineError;

use crate::process;

/// Abstraction over a copy-on-write filesystem pool. All `name` arguments
/// are short names, normalized internally against `pool/base/name`.
#[async_trait]
pub trait PoolDriver: Send + Sync {
    /// Names of every pool visible to the host, for auto-detection on
    /// first-run.
    async fn list_pools(&self) -> Result<Vec<String>, EngineError>;
    async fn pool_exists(&self, pool: &str) -> Result<bool, EngineError>;
    /// Short names of every dataset that exists directly under the base path,
    /// for orphan reconciliation.
    async fn list_datasets(&self) -> Result<Vec<String>, EngineError>;
    async fn create_dataset(&self, name: &str, props: &BTreeMap<String, String>) -> Result<(), EngineError>;
    async fn dataset_exists(&self, name: &str) -> Result<bool, EngineError>;
    async fn destroy_dataset(&self, name: &str, recursive: bool) -> Result<(), EngineError>;
    async fn mount_dataset(&self, name: &str) -> Result<(), EngineError>;
    async fn unmount_dataset(&self, name: &str) -> Result<(), EngineError>;
    async fn get_mountpoint(&self, name: &str) -> Result<PathBuf, EngineError>;
    async fn create_snapshot(&self, dataset: &str, label: &str) -> Result<String, EngineError>;
    async fn destroy_snapshot(&self, fq_snapshot: &str) -> Result<(), EngineError>;
    async fn list_snapshots(&self, scope: Option<&str>) -> Result<Vec<SnapshotInfo>, EngineError>;
    async fn clone_snapshot(&self, fq_snapshot: &str, target: &str) -> Result<(), EngineError>;
    async fn get_used_space(&self, name: &str) -> Result<u64, EngineError>;
}

/// A filesystem snapshot as reported by the pool, ordered by creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub fq_name: String,
    pub created_at_epoch: i64,
}

/// ZFS-backed [`PoolDriver`].
pub struct ZfsPoolDriver {
    /// `pool/base`, the prefix every managed dataset lives under.
    base_path: String,
}

impl ZfsPoolDriver {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self { base_path: base_path.into() }
    }

    fn full_name(&self, short: &str) -> String {
        format!("{}/{short}", self.base_path)
    }

    /// Build a fully qualified snapshot reference `dataset@label`.
    pub fn fq_snapshot(&self, dataset: &str, label: &str) -> String {
        format!("{}@{label}", self.full_name(dataset))
    }
}

#[async_trait]
impl PoolDriver for ZfsPoolDriver {
    async fn list_pools(&self) -> Result<Vec<String>, EngineError> {
        let out = process::run("zpool", &["list", "-H", "-o", "name"]).await?;
        Ok(out.lines().map(str::to_string).collect())
    }

    async fn pool_exists(&self, pool: &str) -> Result<bool, EngineError> {
        Ok(process::run("zpool", &["list", "-H", "-o", "name", pool]).await.is_ok())
    }

    async fn list_datasets(&self) -> Result<Vec<String>, EngineError> {
        let out = process::run("zfs", &["list", "-H", "-r", "-o", "name", &self.base_path]).await?;
        let prefix = format!("{}/", self.base_path);
        Ok(out
            .lines()
            .filter(|l| *l != self.base_path)
            .filter_map(|l| l.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }

    async fn create_dataset(&self, name: &str, props: &BTreeMap<String, String>) -> Result<(), EngineError> {
        let full = self.full_name(name);
        let mut prop_strings = Vec::new();
        for (k, v) in props {
            prop_strings.push(format!("{k}={v}"));
        }
        let mut args = vec!["create"];
        for p in &prop_strings {
            args.push("-o");
            args.push(p);
        }
        args.push(&full);
        process::run_ok("zfs", &args).await
    }

    async fn dataset_exists(&self, name: &str) -> Result<bool, EngineError> {
        let full = self.full_name(name);
        Ok(process::run("zfs", &["list", "-H", "-o", "name", &full]).await.is_ok())
    }

    async fn destroy_dataset(&self, name: &str, recursive: bool) -> Result<(), EngineError> {
        let full = self.full_name(name);
        let mut args = vec!["destroy"];
        if recursive {
            args.push("-r");
        }
        args.push(&full);
        process::run_ok("zfs", &args).await
    }

    async fn mount_dataset(&self, name: &str) -> Result<(), EngineError> {
        let full = self.full_name(name);
        match process::run_ok("zfs", &["mount", &full]).await {
            Ok(()) => Ok(()),
            // Already mounted is not an error; mount/unmount are idempotent.
            Err(e) if e.to_string().contains("already mounted") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn unmount_dataset(&self, name: &str) -> Result<(), EngineError> {
        let full = self.full_name(name);
        match process::run_ok("zfs", &["unmount", &full]).await {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("not currently mounted") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_mountpoint(&self, name: &str) -> Result<PathBuf, EngineError> {
        let full = self.full_name(name);
        let out = process::run("zfs", &["get", "-H", "-o", "value", "mountpoint", &full]).await?;
        Ok(PathBuf::from(out))
    }

    async fn create_snapshot(&self, dataset: &str, label: &str) -> Result<String, EngineError> {
        let fq = self.fq_snapshot(dataset, label);
        process::run_ok("zfs", &["snapshot", &fq]).await?;
        Ok(fq)
    }

    async fn destroy_snapshot(&self, fq_snapshot: &str) -> Result<(), EngineError> {
        process::run_ok("zfs", &["destroy", fq_snapshot]).await
    }

    async fn list_snapshots(&self, scope: Option<&str>) -> Result<Vec<SnapshotInfo>, EngineError> {
        let mut args = vec!["list", "-t", "snapshot", "-H", "-p", "-o", "name,creation", "-s", "creation"];
        let scoped;
        if let Some(scope) = scope {
            args.push("-r");
            scoped = self.full_name(scope);
            args.push(&scoped);
        }
        let out = process::run("zfs", &args).await?;
        let mut snapshots = Vec::new();
        for line in out.lines().filter(|l| !l.is_empty()) {
            let mut parts = line.splitn(2, '\t');
            let name = parts.next().unwrap_or_default().to_string();
            let created_at_epoch = parts.next().and_then(|s| s.trim().parse().ok()).unwrap_or(0);
            snapshots.push(SnapshotInfo { fq_name: name, created_at_epoch });
        }
        Ok(snapshots)
    }

    async fn clone_snapshot(&self, fq_snapshot: &str, target: &str) -> Result<(), EngineError> {
        let full_target = self.full_name(target);
        process::run_ok("zfs", &["clone", fq_snapshot, &full_target]).await
    }

    async fn get_used_space(&self, name: &str) -> Result<u64, EngineError> {
        let full = self.full_name(name);
        let out = process::run("zfs", &["get", "-H", "-p", "-o", "value", "used", &full]).await?;
        out.parse()
            .map_err(|_| EngineError::system(format!("unexpected `zfs get used` output: '{out}'")))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    /// In-memory [`PoolDriver`] for orchestrator tests; no `zfs` binary required.
    #[derive(Default)]
    pub struct FakePoolDriver {
        datasets: Mutex<BTreeSet<String>>,
        snapshots: Mutex<Vec<SnapshotInfo>>,
        mounted: Mutex<BTreeSet<String>>,
        epoch: Mutex<i64>,
    }

    impl FakePoolDriver {
        pub fn new() -> Self {
            Self::default()
        }

        fn next_epoch(&self) -> i64 {
            let mut epoch = self.epoch.lock();
            *epoch += 1;
            *epoch
        }
    }

    #[async_trait]
    impl PoolDriver for FakePoolDriver {
        async fn list_pools(&self) -> Result<Vec<String>, EngineError> {
            Ok(vec!["tank".to_string()])
        }

        async fn pool_exists(&self, _pool: &str) -> Result<bool, EngineError> {
            Ok(true)
        }

        async fn list_datasets(&self) -> Result<Vec<String>, EngineError> {
            Ok(self.datasets.lock().iter().cloned().collect())
        }

        async fn create_dataset(&self, name: &str, _props: &BTreeMap<String, String>) -> Result<(), EngineError> {
            self.datasets.lock().insert(name.to_string());
            self.mounted.lock().insert(name.to_string());
            Ok(())
        }

        async fn dataset_exists(&self, name: &str) -> Result<bool, EngineError> {
            Ok(self.datasets.lock().contains(name))
        }

        async fn destroy_dataset(&self, name: &str, recursive: bool) -> Result<(), EngineError> {
            if !recursive
                && self.snapshots.lock().iter().any(|s| s.fq_name.starts_with(&format!("{name}@")))
            {
                return Err(EngineError::system(format!("dataset '{name}' has snapshots; use recursive destroy")));
            }
            self.datasets.lock().remove(name);
            self.mounted.lock().remove(name);
            self.snapshots.lock().retain(|s| !s.fq_name.starts_with(&format!("{name}@")));
            Ok(())
        }

        async fn mount_dataset(&self, name: &str) -> Result<(), EngineError> {
            self.mounted.lock().insert(name.to_string());
            Ok(())
        }

        async fn unmount_dataset(&self, name: &str) -> Result<(), EngineError> {
            self.mounted.lock().remove(name);
            Ok(())
        }

        async fn get_mountpoint(&self, name: &str) -> Result<PathBuf, EngineError> {
            Ok(PathBuf::from(format!("/fake-mnt/{name}")))
        }

        async fn create_snapshot(&self, dataset: &str, label: &str) -> Result<String, EngineError> {
            let fq = format!("{dataset}@{label}");
            self.snapshots.lock().push(SnapshotInfo { fq_name: fq.clone(), created_at_epoch: self.next_epoch() });
            Ok(fq)
        }

        async fn destroy_snapshot(&self, fq_snapshot: &str) -> Result<(), EngineError> {
            self.snapshots.lock().retain(|s| s.fq_name != fq_snapshot);
            Ok(())
        }

        async fn list_snapshots(&self, scope: Option<&str>) -> Result<Vec<SnapshotInfo>, EngineError> {
            let snaps = self.snapshots.lock().clone();
            Ok(match scope {
                Some(scope) => snaps.into_iter().filter(|s| s.fq_name.starts_with(&format!("{scope}@"))).collect(),
                None => snaps,
            })
        }

        async fn clone_snapshot(&self, _fq_snapshot: &str, target: &str) -> Result<(), EngineError> {
            self.datasets.lock().insert(target.to_string());
            self.mounted.lock().insert(target.to_string());
            Ok(())
        }

        async fn get_used_space(&self, _name: &str) -> Result<u64, EngineError> {
            Ok(1024)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakePoolDriver;
    use super::*;

    #[tokio::test]
    async fn fake_driver_create_snapshot_clone_roundtrip() {
        let driver = FakePoolDriver::new();
        driver.create_dataset("api-main", &BTreeMap::new()).await.unwrap();
        let fq = driver.create_snapshot("api-main", "fork1").await.unwrap();
        assert_eq!(fq, "api-main@fork1");
        driver.clone_snapshot(&fq, "api-dev").await.unwrap();
        assert!(driver.dataset_exists("api-dev").await.unwrap());
    }

    #[tokio::test]
    async fn destroy_non_recursive_blocked_by_snapshot() {
        let driver = FakePoolDriver::new();
        driver.create_dataset("api-main", &BTreeMap::new()).await.unwrap();
        driver.create_snapshot("api-main", "s1").await.unwrap();
        assert!(driver.destroy_dataset("api-main", false).await.is_err());
        assert!(driver.destroy_dataset("api-main", true).await.is_ok());
    }

    #[test]
    fn zfs_driver_normalizes_names() {
        let driver = ZfsPoolDriver::new("tank/pgfork");
        assert_eq!(driver.full_name("api-main"), "tank/pgfork/api-main");
        assert_eq!(driver.fq_snapshot("api-main", "fork1"), "tank/pgfork/api-main@fork1");
    }
}
