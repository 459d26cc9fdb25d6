// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! WAL Manager: per-branch write-ahead-log archive directory.
//! Pure filesystem operations — no external CLI involved.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use pgfork_core::EngineError;

const RECOVERY_SIGNAL_FILE: &str = "recovery.signal";
const AUTO_CONF_FILE: &str = "postgresql.auto.conf";

/// Aggregate statistics over a branch's archive directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub file_count: usize,
    pub total_bytes: u64,
    pub oldest_segment: Option<String>,
    pub newest_segment: Option<String>,
    pub oldest_timestamp: Option<DateTime<Utc>>,
    pub newest_timestamp: Option<DateTime<Utc>>,
}

/// A gap in the WAL segment sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentGap {
    pub after: String,
    pub before: String,
}

pub struct WalManager {
    archive_root: PathBuf,
}

impl WalManager {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self { archive_root: archive_root.into() }
    }

    /// Deterministic absolute archive path for a dataset.
    pub fn get_archive_path(&self, dataset: &str) -> PathBuf {
        self.archive_root.join(dataset)
    }

    /// Create the archive directory if absent, with permissions that let
    /// the in-container database user write into it.
    pub fn ensure_archive_dir(&self, dataset: &str) -> Result<PathBuf, EngineError> {
        let path = self.get_archive_path(dataset);
        fs::create_dir_all(&path)
            .map_err(|e| EngineError::system(format!("failed to create WAL archive dir {}: {e}", path.display())))?;
        set_world_writable(&path)?;
        Ok(path)
    }

    pub fn get_archive_info(&self, dataset: &str) -> Result<ArchiveInfo, EngineError> {
        let mut segments = self.list_segments(dataset)?;
        segments.sort();
        let total_bytes = segments
            .iter()
            .filter_map(|s| fs::metadata(self.get_archive_path(dataset).join(s)).ok())
            .map(|m| m.len())
            .sum();
        let oldest_timestamp = segments.first().and_then(|s| self.segment_mtime(dataset, s));
        let newest_timestamp = segments.last().and_then(|s| self.segment_mtime(dataset, s));
        Ok(ArchiveInfo {
            file_count: segments.len(),
            total_bytes,
            oldest_segment: segments.first().cloned(),
            newest_segment: segments.last().cloned(),
            oldest_timestamp,
            newest_timestamp,
        })
    }

    fn segment_mtime(&self, dataset: &str, segment: &str) -> Option<DateTime<Utc>> {
        let modified: SystemTime = fs::metadata(self.get_archive_path(dataset).join(segment)).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    /// Sort segments by segment-number order and report gaps in the sequence.
    /// WAL segment names are 24 hex-digit filenames, strictly increasing.
    pub fn verify_archive_integrity(&self, dataset: &str) -> Result<Vec<SegmentGap>, EngineError> {
        let mut segments = self.list_segments(dataset)?;
        segments.sort();

        let mut gaps = Vec::new();
        for pair in segments.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if let (Ok(a), Ok(b)) = (u128::from_str_radix(prev, 16), u128::from_str_radix(next, 16)) {
                if b != a + 1 {
                    gaps.push(SegmentGap { after: prev.clone(), before: next.clone() });
                }
            }
        }
        Ok(gaps)
    }

    /// Unlink segments strictly older than `retention_days`; return the count removed.
    pub fn cleanup_old_wals(&self, dataset: &str, retention_days: u32, now: std::time::SystemTime) -> Result<usize, EngineError> {
        let cutoff = now
            .checked_sub(std::time::Duration::from_secs(u64::from(retention_days) * 86_400))
            .unwrap_or(std::time::UNIX_EPOCH);

        let path = self.get_archive_path(dataset);
        let mut removed = 0;
        if !path.exists() {
            return Ok(0);
        }
        for entry in fs::read_dir(&path)
            .map_err(|e| EngineError::system(format!("failed to read {}: {e}", path.display())))?
        {
            let entry = entry.map_err(|e| EngineError::system(format!("failed to read dir entry: {e}")))?;
            let modified = entry.metadata().and_then(|m| m.modified()).unwrap_or(now);
            if modified < cutoff {
                fs::remove_file(entry.path())
                    .map_err(|e| EngineError::system(format!("failed to remove {}: {e}", entry.path().display())))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Emit the two files that put a cloned data directory into PITR
    /// recovery mode against `source_archive_path`.
    pub fn setup_pit_recovery(
        &self,
        mountpoint: &Path,
        source_archive_path: &Path,
        recovery_target: pgfork_core::RecoveryTarget,
    ) -> Result<(), EngineError> {
        fs::write(mountpoint.join(RECOVERY_SIGNAL_FILE), "")
            .map_err(|e| EngineError::system(format!("failed to write recovery signal: {e}")))?;

        let restore_command = format!("cp '{}/%f' '%p'", source_archive_path.display());
        let target_time = pgfork_core::format_timestamp(recovery_target.0);
        let contents = format!(
            "restore_command = '{restore_command}'\nrecovery_target_time = '{target_time}'\nrecovery_target_action = 'promote'\n"
        );
        fs::write(mountpoint.join(AUTO_CONF_FILE), contents)
            .map_err(|e| EngineError::system(format!("failed to write recovery auto-config: {e}")))?;
        Ok(())
    }

    fn list_segments(&self, dataset: &str) -> Result<Vec<String>, EngineError> {
        let path = self.get_archive_path(dataset);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&path)
            .map_err(|e| EngineError::system(format!("failed to read {}: {e}", path.display())))?
        {
            let entry = entry.map_err(|e| EngineError::system(format!("failed to read dir entry: {e}")))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

#[cfg(unix)]
fn set_world_writable(path: &Path) -> Result<(), EngineError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|e| EngineError::system(format!("failed to stat {}: {e}", path.display())))?
        .permissions();
    perms.set_mode(0o777);
    fs::set_permissions(path, perms)
        .map_err(|e| EngineError::system(format!("failed to chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn set_world_writable(_path: &Path) -> Result<(), EngineError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn write_segment(dir: &Path, dataset: &str, hex: &str) {
        let archive = dir.join(dataset);
        fs::create_dir_all(&archive).unwrap();
        fs::write(archive.join(hex), b"wal-bytes").unwrap();
    }

    #[test]
    fn ensure_archive_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = WalManager::new(dir.path());
        let p1 = mgr.ensure_archive_dir("api-main").unwrap();
        let p2 = mgr.ensure_archive_dir("api-main").unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn archive_info_reports_counts_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = WalManager::new(dir.path());
        write_segment(dir.path(), "api-main", "000000010000000000000001");
        write_segment(dir.path(), "api-main", "000000010000000000000002");
        let info = mgr.get_archive_info("api-main").unwrap();
        assert_eq!(info.file_count, 2);
        assert_eq!(info.oldest_segment.as_deref(), Some("000000010000000000000001"));
        assert_eq!(info.newest_segment.as_deref(), Some("000000010000000000000002"));
        assert!(info.oldest_timestamp.is_some());
        assert!(info.newest_timestamp.is_some());
    }

    #[test]
    fn integrity_check_detects_gap() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = WalManager::new(dir.path());
        write_segment(dir.path(), "api-main", "000000010000000000000001");
        write_segment(dir.path(), "api-main", "000000010000000000000003");
        let gaps = mgr.verify_archive_integrity("api-main").unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].after, "000000010000000000000001");
        assert_eq!(gaps[0].before, "000000010000000000000003");
    }

    #[test]
    fn cleanup_removes_only_old_segments() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = WalManager::new(dir.path());
        write_segment(dir.path(), "api-main", "000000010000000000000001");
        let removed = mgr.cleanup_old_wals("api-main", 7, SystemTime::now() + Duration::from_secs(8 * 86_400)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(mgr.get_archive_info("api-main").unwrap().file_count, 0);
    }

    #[test]
    fn setup_pit_recovery_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let mountpoint = dir.path().join("mnt");
        fs::create_dir_all(&mountpoint).unwrap();
        let mgr = WalManager::new(dir.path());
        let target = pgfork_core::RecoveryTarget(chrono::Utc::now());
        mgr.setup_pit_recovery(&mountpoint, &dir.path().join("archive/api-main"), target).unwrap();
        assert!(mountpoint.join(RECOVERY_SIGNAL_FILE).exists());
        let conf = fs::read_to_string(mountpoint.join(AUTO_CONF_FILE)).unwrap();
        assert!(conf.contains("restore_command"));
        assert!(conf.contains("recovery_target_time"));
    }
}
