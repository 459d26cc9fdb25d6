// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork wal` — walInfo, walVerify, walCleanup.

use anyhow::Result;
use clap::{Args, Subcommand};
use pgfork_core::NamespacedName;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};
use crate::Context;

#[derive(Args)]
pub struct WalArgs {
    #[command(subcommand)]
    pub command: WalCommand,
}

#[derive(Subcommand)]
pub enum WalCommand {
    /// Report archive segment counts and byte totals for a branch.
    Info { target: NamespacedName },
    /// Report gaps in the WAL segment sequence.
    Verify { target: NamespacedName },
    /// Unlink WAL segments older than `--retention-days`.
    Cleanup {
        target: NamespacedName,
        #[arg(long, default_value_t = 7)]
        retention_days: u32,
    },
}

pub async fn handle(ctx: &Context, command: WalCommand, format: OutputFormat) -> Result<()> {
    match command {
        WalCommand::Info { target } => {
            let info = ctx.orchestrator.wal_info(&target).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({
                "file_count": info.file_count,
                "total_bytes": info.total_bytes,
                "oldest_segment": info.oldest_segment,
                "newest_segment": info.newest_segment,
                "oldest_timestamp": info.oldest_timestamp,
                "newest_timestamp": info.newest_timestamp,
            }), || {
                println!("{} segments, {} bytes", info.file_count, info.total_bytes);
                if let (Some(oldest), Some(newest)) = (&info.oldest_segment, &info.newest_segment) {
                    println!("range: {oldest} .. {newest}");
                }
                if let (Some(oldest), Some(newest)) = (info.oldest_timestamp, info.newest_timestamp) {
                    println!("timestamps: {oldest} .. {newest}");
                }
            })?;
        }
        WalCommand::Verify { target } => {
            let gaps = ctx.orchestrator.wal_verify(&target).await.map_err(ExitError::from)?;
            format_or_json(format, &gaps.iter().map(|g| (g.after.clone(), g.before.clone())).collect::<Vec<_>>(), || {
                if gaps.is_empty() {
                    println!("no gaps in WAL sequence");
                } else {
                    for gap in &gaps {
                        println!("gap between {} and {}", gap.after, gap.before);
                    }
                }
            })?;
        }
        WalCommand::Cleanup { target, retention_days } => {
            let removed = ctx.orchestrator.wal_cleanup(&target, retention_days).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "removed": removed }), || println!("removed {removed} segment(s)"))?;
        }
    }
    Ok(())
}
