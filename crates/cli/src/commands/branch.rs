// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork branch` — branch create/list/get/delete/sync/reset and the
//! container-only lifecycle verbs.

use anyhow::Result;
use clap::{Args, Subcommand};
use pgfork_core::NamespacedName;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};
use crate::Context;

#[derive(Args)]
pub struct BranchArgs {
    #[command(subcommand)]
    pub command: BranchCommand,
}

#[derive(Subcommand)]
pub enum BranchCommand {
    /// Fork a new branch from a source branch (default: the project's `main`).
    Create {
        target: NamespacedName,
        #[arg(long)]
        from: Option<NamespacedName>,
        /// Recovery target: ISO-8601, or a relative expression ("10 minutes ago").
        #[arg(long)]
        at: Option<String>,
    },
    /// List every branch in a project.
    List { project: String },
    /// Show one branch.
    Get {
        target: NamespacedName,
        /// Print a `postgresql://` connection string instead of the branch record.
        #[arg(long)]
        connection_string: bool,
    },
    /// Delete a non-primary branch.
    Delete {
        target: NamespacedName,
        #[arg(long)]
        force: bool,
    },
    /// Rebuild from a fresh snapshot of the branch's current parent state.
    Sync {
        target: NamespacedName,
        #[arg(long)]
        force: bool,
    },
    /// Rebuild from the branch's original origin snapshot.
    Reset {
        target: NamespacedName,
        #[arg(long)]
        force: bool,
    },
    /// Start the branch's container.
    Start { target: NamespacedName },
    /// Stop the branch's container.
    Stop { target: NamespacedName },
    /// Restart the branch's container.
    Restart { target: NamespacedName },
}

pub async fn handle(ctx: &Context, command: BranchCommand, format: OutputFormat) -> Result<()> {
    match command {
        BranchCommand::Create { target, from, at } => {
            let pitr = match at {
                Some(raw) => {
                    Some(pgfork_core::parse_recovery_target(&raw, chrono::Utc::now()).map_err(ExitError::from)?)
                }
                None => None,
            };
            let branch =
                ctx.orchestrator.create_branch(&target, from.as_ref(), pitr).await.map_err(ExitError::from)?;
            format_or_json(format, &branch, || println!("created branch '{}'", branch.namespaced()))?;
        }
        BranchCommand::List { project } => {
            let doc = ctx.orchestrator.catalog().map_err(ExitError::from)?;
            let entry = doc.project(&project).ok_or_else(|| ExitError::new(1, format!("project '{project}' not found")))?;
            handle_list(format, &entry.branches, "no branches", |items| {
                for b in items {
                    println!("{:<24}  {:?}  port={:?}", b.namespaced(), b.lifecycle, b.port);
                }
            })?;
        }
        BranchCommand::Get { target, connection_string } => {
            let doc = ctx.orchestrator.catalog().map_err(ExitError::from)?;
            let entry = doc.project(target.project()).ok_or_else(|| ExitError::new(1, format!("project '{target}' not found")))?;
            let branch = doc
                .branch(target.project(), target.branch())
                .ok_or_else(|| ExitError::new(1, format!("branch '{target}' not found")))?;
            if connection_string {
                let port = branch.port.ok_or_else(|| ExitError::new(1, format!("branch '{target}' is not running")))?;
                println!(
                    "postgresql://{}:{}@127.0.0.1:{}/{}",
                    entry.project.db_user, entry.project.db_password, port, entry.project.db_name
                );
            } else {
                format_or_json(format, branch, || {
                    println!("branch {} [{:?}] port={:?}", branch.namespaced(), branch.lifecycle, branch.port);
                })?;
            }
        }
        BranchCommand::Delete { target, force } => {
            ctx.orchestrator.delete_branch(&target, force).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "deleted": target.to_string() }), || {
                println!("deleted branch '{target}'")
            })?;
        }
        BranchCommand::Sync { target, force } => {
            let branch = ctx.orchestrator.sync_branch(&target, force).await.map_err(ExitError::from)?;
            format_or_json(format, &branch, || println!("synced branch '{}'", branch.namespaced()))?;
        }
        BranchCommand::Reset { target, force } => {
            let branch = ctx.orchestrator.reset_branch(&target, force).await.map_err(ExitError::from)?;
            format_or_json(format, &branch, || println!("reset branch '{}'", branch.namespaced()))?;
        }
        BranchCommand::Start { target } => {
            let branch = ctx.orchestrator.start_branch(&target).await.map_err(ExitError::from)?;
            format_or_json(format, &branch, || println!("started branch '{}'", branch.namespaced()))?;
        }
        BranchCommand::Stop { target } => {
            let branch = ctx.orchestrator.stop_branch(&target).await.map_err(ExitError::from)?;
            format_or_json(format, &branch, || println!("stopped branch '{}'", branch.namespaced()))?;
        }
        BranchCommand::Restart { target } => {
            let branch = ctx.orchestrator.restart_branch(&target).await.map_err(ExitError::from)?;
            format_or_json(format, &branch, || println!("restarted branch '{}'", branch.namespaced()))?;
        }
    }
    Ok(())
}
