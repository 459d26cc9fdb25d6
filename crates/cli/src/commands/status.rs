// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork status` — catalog summary plus an orphan-reconciliation hint.

use anyhow::Result;

use crate::exit_error::ExitError;
use crate::output::OutputFormat;
use crate::Context;

pub async fn handle(ctx: &Context, format: OutputFormat) -> Result<()> {
    if !ctx.orchestrator.catalog_exists() {
        match format {
            OutputFormat::Json => println!(r#"{{ "initialized": false }}"#),
            OutputFormat::Text => println!("pgfork: no catalog yet (run `pgfork project create` to initialize)"),
        }
        return Ok(());
    }

    let doc = ctx.orchestrator.catalog().map_err(ExitError::from)?;
    let orphans = ctx.orchestrator.detect_orphans().await.map_err(ExitError::from)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "pool_id": doc.pool_id,
                    "project_count": doc.projects.len(),
                    "snapshot_count": doc.snapshots.len(),
                    "orphan_count": orphans.len(),
                }))?
            );
        }
        OutputFormat::Text => {
            println!("pool: {}", doc.pool_id);
            println!("projects: {}", doc.projects.len());
            for entry in &doc.projects {
                let running = entry.branches.iter().filter(|b| b.lifecycle == pgfork_core::BranchLifecycle::Running).count();
                println!("  {:<20} {} branch(es), {} running", entry.project.name, entry.branches.len(), running);
            }
            println!("snapshots: {}", doc.snapshots.len());
            if orphans.is_empty() {
                println!("orphans: none");
            } else {
                println!("orphans: {} (run `pgfork cleanup --force` to reconcile)", orphans.len());
            }
        }
    }
    Ok(())
}
