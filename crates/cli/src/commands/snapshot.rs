// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork snapshot` — createSnapshot, listSnapshots, deleteSnapshot, cleanupSnapshots.

use anyhow::Result;
use clap::{Args, Subcommand};
use pgfork_core::{NamespacedName, SnapshotId};

use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};
use crate::Context;

#[derive(Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// Checkpoint (if running) and snapshot a branch's current state.
    Create {
        target: NamespacedName,
        #[arg(long)]
        label: Option<String>,
    },
    /// List snapshots, optionally restricted to one branch.
    List {
        #[arg(long)]
        branch: Option<NamespacedName>,
    },
    /// Delete a snapshot by id.
    Delete { id: String },
    /// Delete snapshots older than `--days`, optionally restricted to one branch.
    Cleanup {
        #[arg(long)]
        branch: Option<NamespacedName>,
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn handle(ctx: &Context, command: SnapshotCommand, format: OutputFormat) -> Result<()> {
    match command {
        SnapshotCommand::Create { target, label } => {
            let snapshot = ctx.orchestrator.create_snapshot(&target, label.as_deref()).await.map_err(ExitError::from)?;
            format_or_json(format, &snapshot, || println!("created snapshot '{}' ({})", snapshot.id, snapshot.fs_ref))?;
        }
        SnapshotCommand::List { branch } => {
            let snapshots = ctx.orchestrator.list_snapshots(branch.as_ref()).map_err(ExitError::from)?;
            handle_list(format, &snapshots, "no snapshots", |items| {
                for s in items {
                    println!("{:<24}  {:<24}  {}", s.id, s.branch_name, s.fs_ref);
                }
            })?;
        }
        SnapshotCommand::Delete { id } => {
            ctx.orchestrator.delete_snapshot(SnapshotId::from(id.clone())).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "deleted": id }), || println!("deleted snapshot '{id}'"))?;
        }
        SnapshotCommand::Cleanup { branch, days, dry_run } => {
            let removed = ctx.orchestrator.cleanup_snapshots(branch.as_ref(), days, dry_run).await.map_err(ExitError::from)?;
            handle_list(format, &removed, "no snapshots to clean up", |items| {
                let verb = if dry_run { "would remove" } else { "removed" };
                for s in items {
                    println!("{verb} {} ({})", s.id, s.branch_name);
                }
            })?;
        }
    }
    Ok(())
}
