// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Cooperative, polling exclusive file lock with stale-lock reclamation.
//! Not an OS advisory lock: acquisition is a bounded sequence of
//! atomic-create attempts, so a crashed holder's lock can be detected and
//! reclaimed without a wrapper daemon.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use pgfork_core::EngineError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// An acquired lock; releases on drop.
#[derive(Debug)]
pub struct FileLockGuard {
    path: PathBuf,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Acquire the exclusive lock at `path`, polling at fixed intervals up to
/// a bounded number of attempts. A held lock whose process id is no
/// longer alive is treated as stale: it is unlinked and retried in place.
pub fn acquire(path: &Path) -> Result<FileLockGuard, EngineError> {
    acquire_with(path, DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
}

pub fn acquire_with(
    path: &Path,
    poll_interval: Duration,
    max_attempts: u32,
) -> Result<FileLockGuard, EngineError> {
    for attempt in 0..max_attempts {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id()).map_err(|e| {
                    EngineError::system(format!("failed writing lock pid: {e}"))
                })?;
                return Ok(FileLockGuard { path: path.to_path_buf() });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if holder_is_dead(path) {
                    let _ = fs::remove_file(path);
                    continue;
                }
                if attempt + 1 < max_attempts {
                    thread::sleep(poll_interval);
                }
            }
            Err(e) => {
                return Err(EngineError::system(format!(
                    "failed to create lock file {}: {e}",
                    path.display()
                )))
            }
        }
    }

    Err(EngineError::system_with_hint(
        format!("catalog busy: could not acquire lock at {}", path.display()),
        "another pgfork invocation appears to be running; retry shortly",
    ))
}

/// Is the process id recorded in the lock file no longer running?
/// A lock file that can't be read or parsed is treated as stale too,
/// since a healthy holder always writes its pid before releasing.
fn holder_is_dead(path: &Path) -> bool {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return true,
    };
    let pid: i32 = match contents.trim().parse() {
        Ok(p) => p,
        Err(_) => return true,
    };
    !process_alive(pid)
}

fn process_alive(pid: i32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn acquires_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.lock");
        {
            let _guard = acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.lock");
        let _guard = acquire(&path).unwrap();
        let err = acquire_with(&path, Duration::from_millis(1), 3).unwrap_err();
        assert_eq!(err.kind(), pgfork_core::ErrorKind::System);
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.lock");
        // A pid that is vanishingly unlikely to be alive.
        fs::write(&path, "999999\n").unwrap();
        let _guard = acquire(&path).unwrap();
        assert!(path.exists());
    }
}
