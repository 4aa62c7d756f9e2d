// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hivepool status`: print the state slots of a running pool.

use std::fmt::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use hp_core::{Clock, SystemClock, WorkerId};
use hp_engine::PoolConfig;
use hp_storage::{WorkerState, WorkerStorage};

use crate::output::{format_age, format_bytes, OutputFormat};

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Runtime directory of the pool [default: HIVEPOOL_RUNTIME_DIR, else the
    /// system temp dir]
    #[arg(long)]
    pub runtime_dir: Option<PathBuf>,
}

pub fn handle(args: StatusArgs, format: OutputFormat) -> Result<()> {
    let config = match args.runtime_dir {
        Some(dir) => PoolConfig::new(dir),
        None => PoolConfig::default().with_env_overrides(),
    };
    let path = config.storage_path();
    let storage = WorkerStorage::open_read_only(&path)
        .with_context(|| format!("no running pool in {}", config.runtime_dir.display()))?;

    let application = storage.application_state()?.snapshot();
    let workers = storage
        .foreach_workers()
        .collect::<Result<Vec<_>, _>>()?;

    print!(
        "{}",
        render(&application, &workers, SystemClock.epoch_ms(), format)?
    );
    Ok(())
}

pub(crate) fn render(
    application: &WorkerState,
    workers: &[(WorkerId, WorkerState)],
    now_ms: u64,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(application, workers, now_ms)),
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "pool": {
                    "running": application.is_ready,
                    "pid": application.pid,
                    "restarts": application.restarts_count,
                    "started_at": application.started_at,
                    "finished_at": application.finished_at,
                },
                "workers": workers.iter().map(|(id, s)| worker_json(*id, s)).collect::<Vec<_>>(),
            });
            Ok(format!("{}\n", serde_json::to_string_pretty(&obj)?))
        }
    }
}

fn worker_json(id: WorkerId, state: &WorkerState) -> serde_json::Value {
    serde_json::json!({
        "id": id.get(),
        "group_id": state.group_id.get(),
        "pid": state.pid,
        "ready": state.is_ready,
        "restarts": state.restarts_count,
        "weight": state.weight,
        "started_at": state.started_at,
        "finished_at": state.finished_at,
        "updated_at": state.updated_at,
        "memory_usage": state.memory_usage,
        "memory_peak_usage": state.memory_peak_usage,
        "jobs": {
            "accepted": state.jobs.accepted,
            "processing": state.jobs.processing,
            "processed": state.jobs.processed,
            "errors": state.jobs.errors,
        },
        "connections": {
            "accepted": state.connections.accepted,
            "processing": state.connections.processing,
            "rejected": state.connections.rejected,
        },
    })
}

fn render_text(
    application: &WorkerState,
    workers: &[(WorkerId, WorkerState)],
    now_ms: u64,
) -> String {
    let mut out = String::new();
    if application.is_ready {
        let _ = writeln!(
            out,
            "pool {} running for {}, {} restart(s)",
            application.pid,
            format_age(application.started_at, now_ms),
            application.restarts_count
        );
    } else {
        let _ = writeln!(
            out,
            "pool stopped {} ago, {} restart(s)",
            format_age(application.finished_at, now_ms),
            application.restarts_count
        );
    }

    let _ = writeln!(
        out,
        "{:<4} {:<6} {:<8} {:<6} {:<9} {:<12} {:<8} {:<8} UPDATED",
        "ID", "GROUP", "PID", "READY", "RESTARTS", "JOBS", "ERRORS", "MEMORY"
    );
    for (id, state) in workers {
        let (group, pid) = if state.group_id.is_assigned() {
            (state.group_id.to_string(), state.pid.to_string())
        } else {
            ("-".to_string(), "-".to_string())
        };
        let _ = writeln!(
            out,
            "{:<4} {:<6} {:<8} {:<6} {:<9} {:<12} {:<8} {:<8} {}",
            id,
            group,
            pid,
            if state.is_ready { "yes" } else { "no" },
            state.restarts_count,
            format!("{}/{}", state.jobs.processed, state.jobs.accepted),
            state.jobs.errors,
            format_bytes(state.memory_usage),
            format_age(state.updated_at, now_ms),
        );
    }
    out
}
