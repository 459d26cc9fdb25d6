// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork project` — project lifecycle commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};
use crate::Context;

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Create a project and its primary branch.
    Create {
        name: String,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        pool: Option<String>,
    },
    /// List every project known to the catalog.
    List {},
    /// Show one project and its branches.
    Get { name: String },
    /// Delete a project (and, with `--force`, its non-primary branches).
    Delete {
        name: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct ProjectSummary {
    name: String,
    image: String,
    branch_count: usize,
}

pub async fn handle(ctx: &Context, command: ProjectCommand, format: OutputFormat) -> Result<()> {
    match command {
        ProjectCommand::Create { name, image, pool } => {
            let project = ctx.orchestrator.create_project(&name, image.as_deref(), pool.as_deref()).await.map_err(ExitError::from)?;
            format_or_json(format, &project, || println!("created project '{}' (image {})", project.name, project.image))?;
        }
        ProjectCommand::List {} => {
            let doc = ctx.orchestrator.catalog().map_err(ExitError::from)?;
            let summaries: Vec<ProjectSummary> = doc
                .projects
                .iter()
                .map(|p| ProjectSummary { name: p.project.name.clone(), image: p.project.image.clone(), branch_count: p.branches.len() })
                .collect();
            handle_list(format, &summaries, "no projects", |items| {
                for p in items {
                    println!("{:<20}  {:<20}  {} branch(es)", p.name, p.image, p.branch_count);
                }
            })?;
        }
        ProjectCommand::Get { name } => {
            let doc = ctx.orchestrator.catalog().map_err(ExitError::from)?;
            let entry = doc.project(&name).ok_or_else(|| ExitError::new(1, format!("project '{name}' not found")))?;
            format_or_json(format, entry, || {
                println!("project {}", entry.project.name);
                println!("  image: {}", entry.project.image);
                for branch in &entry.branches {
                    println!("  branch {} [{:?}]", branch.branch_name, branch.lifecycle);
                }
            })?;
        }
        ProjectCommand::Delete { name, force } => {
            ctx.orchestrator.delete_project(&name, force).await.map_err(ExitError::from)?;
            format_or_json(format, &serde_json::json!({ "deleted": name }), || println!("deleted project '{name}'"))?;
        }
    }
    Ok(())
}
