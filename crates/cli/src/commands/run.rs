// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hivepool run`: start a pool from a definition file and supervise it
//! until every worker is done, a worker fails fatally, or a signal arrives.

use anyhow::{Context, Result};
use hp_engine::{PoolFile, WorkerPool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{entry_points, logging};

#[derive(clap::Args)]
pub struct RunArgs {
    /// Pool definition file (TOML with `[pool]` and `[[groups]]`)
    #[arg(short, long)]
    pub config: PathBuf,
}

pub async fn handle(args: RunArgs) -> Result<()> {
    let file = PoolFile::load(&args.config)?;
    let config = file.pool.with_env_overrides();
    let _log_guard = logging::init(config.log_file.as_deref())?;

    let pool = WorkerPool::new(config, Arc::new(entry_points::registry()));
    for group in file.groups {
        let entry_point = group.entry_point.clone();
        let group_id = pool
            .describe_group(group)
            .with_context(|| format!("invalid group {:?}", entry_point))?;
        info!(%group_id, %entry_point, "group described");
    }

    pool.start()?;
    info!(
        runtime_dir = %pool.config().runtime_dir.display(),
        pid = std::process::id(),
        "pool started"
    );

    let started = pool.clone();
    tokio::spawn(async move {
        if started.await_start().await.is_ok() {
            info!(workers = started.get_workers().len(), "all workers started");
        }
    });

    let signal = shutdown_signal()?;
    tokio::select! {
        result = pool.wait() => {
            result?;
            info!("pool finished");
            return Ok(());
        }
        name = signal => info!(signal = name, "stopping the pool"),
    }

    if let Err(e) = pool.stop(None).await {
        warn!(error = %e, "pool did not stop cleanly");
    }
    pool.wait().await?;
    info!("pool stopped");
    Ok(())
}

/// Resolves with the name of the first stop signal received.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = &'static str>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl std::future::Future<Output = &'static str>> {
    Ok(async {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    })
}
