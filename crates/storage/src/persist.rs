// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Durable load/save of the catalog document.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pgfork_core::EngineError;

use crate::catalog::CatalogDocument;
use crate::lock;

const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_LOCK_MAX_ATTEMPTS: u32 = 50;

/// Handle to the catalog file on disk. Every mutation goes through
/// [`CatalogStore::with_lock`], which serializes access via the
/// cooperative file lock and re-validates before and after mutation.
pub struct CatalogStore {
    path: PathBuf,
    lock_poll_interval: Duration,
    lock_max_attempts: u32,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            lock_max_attempts: DEFAULT_LOCK_MAX_ATTEMPTS,
        }
    }

    /// Like [`Self::new`] but with configurable lock poll interval/bound
    /// (spec's configuration section: "lock poll interval/bound").
    pub fn with_lock_params(path: impl Into<PathBuf>, poll_interval: Duration, max_attempts: u32) -> Self {
        Self { path: path.into(), lock_poll_interval: poll_interval, lock_max_attempts: max_attempts }
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("backup")
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the document without taking the lock. Used for read-only
    /// status queries; mutating call sites should go through
    /// [`CatalogStore::with_lock`] instead.
    pub fn load(&self) -> Result<CatalogDocument, EngineError> {
        let bytes = fs::read(&self.path)
            .map_err(|e| EngineError::system(format!("failed to read catalog {}: {e}", self.path.display())))?;
        let doc: CatalogDocument = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::invariant(format!("catalog file is corrupt: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Atomically persist `doc`: write `.tmp`, fsync, rename over the
    /// real path, fsync the containing directory. The prior document (if
    /// any) is preserved at `.backup` first.
    pub fn save(&self, doc: &CatalogDocument) -> Result<(), EngineError> {
        doc.validate()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::system(format!("failed to create catalog directory: {e}")))?;
        }

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())
                .map_err(|e| EngineError::system(format!("failed to write catalog backup: {e}")))?;
        }

        let tmp = self.tmp_path();
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| EngineError::system(format!("failed to serialize catalog: {e}")))?;
        {
            let mut file = File::create(&tmp)
                .map_err(|e| EngineError::system(format!("failed to create {}: {e}", tmp.display())))?;
            file.write_all(&bytes)
                .map_err(|e| EngineError::system(format!("failed to write catalog: {e}")))?;
            file.sync_all()
                .map_err(|e| EngineError::system(format!("failed to fsync catalog: {e}")))?;
        }

        fs::rename(&tmp, &self.path)
            .map_err(|e| EngineError::system(format!("failed to rename catalog into place: {e}")))?;

        sync_dir(&self.path)?;

        Ok(())
    }

    /// Acquire the exclusive lock, load, run `f`, and save the result if
    /// `f` returns `Some`. The lock is held across the whole operation
    /// and released on drop regardless of outcome.
    pub fn with_lock<T>(
        &self,
        f: impl FnOnce(&mut CatalogDocument) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let _guard = lock::acquire_with(&self.lock_path(), self.lock_poll_interval, self.lock_max_attempts)?;
        let mut doc = self.load()?;
        let result = f(&mut doc)?;
        self.save(&doc)?;
        Ok(result)
    }
}

fn sync_dir(path: &Path) -> Result<(), EngineError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let dir_file =
        File::open(dir).map_err(|e| EngineError::system(format!("failed to open {} for fsync: {e}", dir.display())))?;
    dir_file
        .sync_all()
        .map_err(|e| EngineError::system(format!("failed to fsync directory {}: {e}", dir.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pgfork_core::test_support::fake_primary_branch;

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.json"));
        let mut doc = CatalogDocument::new("tank", "tank/pgfork", Utc::now());
        doc.add_project(pgfork_core::test_support::fake_project("api"), fake_primary_branch("api"))
            .unwrap();
        store.save(&doc).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.project("api").unwrap().project.name, "api");
    }

    #[test]
    fn save_preserves_previous_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.json"));
        let doc1 = CatalogDocument::new("tank", "tank/pgfork", Utc::now());
        store.save(&doc1).unwrap();
        let doc2 = CatalogDocument::new("tank2", "tank/pgfork", Utc::now());
        store.save(&doc2).unwrap();

        let backup = store.backup_path();
        assert!(backup.exists());
        let backed_up: CatalogDocument = serde_json::from_slice(&fs::read(backup).unwrap()).unwrap();
        assert_eq!(backed_up.pool_id, "tank");
    }

    #[test]
    fn with_lock_persists_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.json"));
        store.save(&CatalogDocument::new("tank", "tank/pgfork", Utc::now())).unwrap();

        store
            .with_lock(|doc| {
                doc.add_project(pgfork_core::test_support::fake_project("api"), fake_primary_branch("api"))
            })
            .unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.project("api").is_some());
    }

    #[test]
    fn corrupt_catalog_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, b"not json").unwrap();
        let store = CatalogStore::new(path);
        assert!(store.load().is_err());
    }
}
