// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Shared helper for shelling out to external CLI tools (`zfs`, `zpool`,
//! `docker`, `restic`). Every driver in this crate wraps a CLI rather than
//! linking an SDK, matching how the rest of this stack talks to external
//! systems.

use pgfork_core::EngineError;

/// Run `program args...` and return trimmed stdout on success.
pub async fn run(program: &str, args: &[&str]) -> Result<String, EngineError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| EngineError::system(format!("failed to exec {program}: {e}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(EngineError::system(format!(
            "{program} {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )))
    }
}

/// Like [`run`] but success is just a clean exit; stdout is discarded.
pub async fn run_ok(program: &str, args: &[&str]) -> Result<(), EngineError> {
    run(program, args).await.map(|_| ())
}
