// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! pgfork: instant, space-efficient copy-on-write branching for a
//! relational database service. Every invocation builds its own
//! orchestrator, runs one command, and exits — there is no daemon.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod config;
mod context;
mod drivers;
mod exit_error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pgfork_engine::Orchestrator;
use tracing_subscriber::EnvFilter;

use crate::commands::{backup, branch, cleanup, doctor, project, snapshot, status, wal};
use crate::config::Config;
use crate::exit_error::ExitError;
use crate::output::OutputFormat;

/// pgfork: branch a database like a filesystem.
#[derive(Parser)]
#[command(name = "pgfork", version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ")"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Override the state directory (catalog, WAL archives, TLS material).
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Override the storage pool used for new projects.
    #[arg(long, global = true)]
    pool: Option<String>,

    /// Raise logging to debug and print full error causes instead of a one-line hint.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Project lifecycle: create, list, get, delete.
    Project(project::ProjectArgs),
    /// Branch lifecycle: create, list, get, delete, sync, reset, start, stop, restart.
    Branch(branch::BranchArgs),
    /// Point-in-time snapshots: create, list, delete, cleanup.
    Snapshot(snapshot::SnapshotArgs),
    /// WAL archive inspection: info, verify, cleanup.
    Wal(wal::WalArgs),
    /// Object-store backup: init, push, pull, list, cleanup.
    Backup(backup::BackupArgs),
    /// Catalog summary and orphan-reconciliation hint.
    Status,
    /// Reconcile externally visible resources with no catalog record.
    Cleanup(cleanup::CleanupArgs),
    /// Read-only preflight: is everything this tool shells out to present.
    Doctor,
}

/// Shared by every command handler: one orchestrator built for this
/// invocation, plus the resolved config it was built from.
pub struct Context {
    pub orchestrator: Orchestrator,
    pub config: Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        match err.downcast::<ExitError>() {
            Ok(exit_err) => {
                eprintln!("error: {exit_err}");
                std::process::exit(exit_err.code);
            }
            Err(err) => {
                eprintln!("error: {err:#}");
                std::process::exit(1);
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.state_dir, cli.pool)?;

    if matches!(cli.command, Command::Doctor) {
        return doctor::handle(&config, cli.format).await;
    }

    let orchestrator = context::build_orchestrator(&config).await?;
    let ctx = Context { orchestrator, config };

    match cli.command {
        Command::Project(args) => project::handle(&ctx, args.command, cli.format).await,
        Command::Branch(args) => branch::handle(&ctx, args.command, cli.format).await,
        Command::Snapshot(args) => snapshot::handle(&ctx, args.command, cli.format).await,
        Command::Wal(args) => wal::handle(&ctx, args.command, cli.format).await,
        Command::Backup(args) => backup::handle(&ctx, args.command, cli.format).await,
        Command::Status => status::handle(&ctx, cli.format).await,
        Command::Cleanup(args) => cleanup::handle(&ctx, args, cli.format).await,
        Command::Doctor => unreachable!("handled above"),
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = std::env::var("PGFORK_LOG")
        .ok()
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
