// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork backup` — the optional object-store destination.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use pgfork_core::{BackupConfig, SnapshotId};

use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};
use crate::Context;

#[derive(Args)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Configure the backup repository.
    Init {
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        bucket: String,
        /// Name of the env var holding the repository password.
        #[arg(long)]
        credentials: String,
        #[arg(long)]
        repository_prefix: String,
    },
    /// Push a branch's current snapshot and WAL archive to the repository.
    Push { target: pgfork_core::NamespacedName, snapshot_id: String },
    /// Restore a snapshot's data tree into a local directory.
    Pull { snapshot_id: String, dest: PathBuf },
    /// List entries archived in the repository.
    List {},
    /// Delete archived entries older than `--days`.
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

pub async fn handle(ctx: &Context, command: BackupCommand, format: OutputFormat) -> Result<()> {
    match command {
        BackupCommand::Init { endpoint, bucket, credentials, repository_prefix } => {
            let local_config_path = ctx.config.state_dir.join("restic.conf").to_string_lossy().into_owned();
            let config = BackupConfig { endpoint, bucket, credentials, repository_prefix, local_config_path };
            ctx.orchestrator.backup_init(config).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "initialized": true }), || println!("backup repository configured"))?;
        }
        BackupCommand::Push { target, snapshot_id } => {
            ctx.orchestrator.backup_push(&target, SnapshotId::from(snapshot_id.clone())).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "pushed": snapshot_id }), || println!("pushed snapshot '{snapshot_id}'"))?;
        }
        BackupCommand::Pull { snapshot_id, dest } => {
            ctx.orchestrator.backup_pull(SnapshotId::from(snapshot_id.clone()), &dest).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "restored_to": dest }), || println!("restored into {}", dest.display()))?;
        }
        BackupCommand::List {} => {
            let entries = ctx.orchestrator.backup_list().await.map_err(ExitError::from)?;
            handle_list(format, &entries.iter().map(entry_json).collect::<Vec<_>>(), "no backup entries", |items| {
                for e in items {
                    println!("{}", e);
                }
            })?;
        }
        BackupCommand::Cleanup { days } => {
            let removed = ctx.orchestrator.backup_cleanup(days).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "removed": removed }), || println!("removed {removed} entries"))?;
        }
    }
    Ok(())
}

fn entry_json(e: &pgfork_adapters::BackupEntry) -> String {
    format!("{:<24}  {:<24}  {:?}  {}", e.snapshot_id, e.branch_name, e.kind, e.created_at)
}
