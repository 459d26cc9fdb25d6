// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork cleanup` — detectOrphans/cleanup reconciliation.

use anyhow::Result;
use clap::Args;

use crate::exit_error::ExitError;
use crate::output::{handle_list, OutputFormat};
use crate::Context;

#[derive(Args)]
pub struct CleanupArgs {
    /// Report orphans without destroying them.
    #[arg(long)]
    pub dry_run: bool,
    /// Destroy every detected orphan.
    #[arg(long)]
    pub force: bool,
}

pub async fn handle(ctx: &Context, args: CleanupArgs, format: OutputFormat) -> Result<()> {
    let orphans = ctx.orchestrator.cleanup(args.dry_run, args.force).await.map_err(ExitError::from)?;
    let rendered: Vec<String> = orphans
        .iter()
        .map(|o| match o {
            pgfork_engine::orphan::Orphan::Dataset(name) => format!("dataset {name}"),
            pgfork_engine::orphan::Orphan::Container(name) => format!("container {name}"),
        })
        .collect();

    let verb = if args.force && !args.dry_run { "removed" } else { "found" };
    handle_list(format, &rendered, "no orphans found", |items| {
        for item in items {
            println!("{verb} orphan {item}");
        }
    })?;
    Ok(())
}
