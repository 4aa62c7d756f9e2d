// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hivepool - multi-process worker pool supervisor
//!
//! The same binary is the supervisor and the worker: a process spawned with
//! `HIVEPOOL_WORKER` set runs the built-in entry points over its stdio.

mod commands;
mod entry_points;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{run, status};
use hp_core::{ExitOutcome, WORKER_ENV};
use output::OutputFormat;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "hivepool",
    version,
    about = "hivepool - multi-process worker pool supervisor"
)]
struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pool described by a TOML file until it stops
    Run(run::RunArgs),
    /// Show the worker slots of a running pool
    Status(status::StatusArgs),
}

fn main() {
    let code = if std::env::var_os(WORKER_ENV).is_some() {
        worker_main()
    } else {
        cli_main()
    };
    std::process::exit(code);
}

fn cli_main() -> i32 {
    let cli = Cli::parse();
    let result = runtime()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(dispatch(cli)));
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", format_error(&e));
            1
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run::handle(args).await,
        Commands::Status(args) => status::handle(args, cli.output),
    }
}

/// Run as a worker process. The exit code only matters to humans: the
/// supervisor learns the outcome from the control channel.
fn worker_main() -> i32 {
    let guard = match logging::init(hp_engine::env::log_file().as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build the worker runtime");
            return 1;
        }
    };

    let code = match runtime.block_on(hp_engine::run_worker(&entry_points::registry())) {
        Ok(ExitOutcome::Clean) => 0,
        Ok(_) => 1,
        Err(e) => {
            error!(error = %e, "worker failed");
            1
        }
    };

    // The stdin reader is parked in a blocking read that nothing cancels.
    runtime.shutdown_background();
    drop(guard);
    code
}

/// Supervisor and worker alike run on one thread.
fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level message already contains every source message, the
/// "Caused by" chain is skipped.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
