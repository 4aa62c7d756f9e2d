// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::memory::{self, MemorySampler};
use super::{EntryPoint, EntryPointRegistry, Worker};
use crate::control;
use crate::env;
use crate::error::{EntryPointError, WorkerError};
use hp_core::{Bootstrap, Clock, ExitOutcome, FromWorker, SystemClock, ToWorker, WorkerGroup};
use hp_ipc::{wire, ProtocolError};
use hp_storage::{WorkerState, WorkerStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Run this process as a worker, with the control channel on stdio.
pub async fn run_worker(registry: &EntryPointRegistry) -> Result<ExitOutcome, WorkerError> {
    run_worker_on(
        registry,
        tokio::io::stdin(),
        tokio::io::stdout(),
        env::bootstrap_timeout(),
    )
    .await
}

/// Run a worker over an arbitrary control channel.
///
/// Waits for the bootstrap message, prepares the state slot, reports
/// `Started`, drives the group's entry point, and reports `Exiting` with its
/// outcome. Bootstrap problems are reported as fatal before returning the
/// error.
pub async fn run_worker_on<R, W>(
    registry: &EntryPointRegistry,
    mut input: R,
    output: W,
    bootstrap_timeout: Duration,
) -> Result<ExitOutcome, WorkerError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let close = CancellationToken::new();
    let (control, writer) = control::spawn_writer::<FromWorker, _>(output, close.clone());

    let prepared = match prepare(registry, &mut input, bootstrap_timeout).await {
        Ok(prepared) => prepared,
        Err(e) => {
            error!(error = %e, "worker bootstrap failed");
            let _ = control.send(FromWorker::Exiting {
                outcome: ExitOutcome::Fatal(e.to_string()),
            });
            close.cancel();
            let _ = writer.await;
            return Err(e);
        }
    };

    let Prepared {
        bootstrap,
        group,
        storage,
        entry,
    } = prepared;
    let span = info_span!("worker", id = %bootstrap.id, group = %group.name);

    let abort = CancellationToken::new();
    let worker = Arc::new(Worker::new(
        bootstrap,
        group,
        storage,
        control.clone(),
        abort.clone(),
    ));

    let outcome = drive(worker, entry, input, control.clone(), abort)
        .instrument(span)
        .await;

    let _ = control.send(FromWorker::Exiting {
        outcome: outcome.clone(),
    });
    close.cancel();
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "exit report not delivered"),
        Err(e) => debug!(error = %e, "control writer task failed"),
    }
    Ok(outcome)
}

struct Prepared {
    bootstrap: Bootstrap,
    group: WorkerGroup,
    storage: Arc<WorkerStorage>,
    entry: Box<dyn EntryPoint>,
}

async fn prepare<R: AsyncRead + Unpin>(
    registry: &EntryPointRegistry,
    input: &mut R,
    timeout: Duration,
) -> Result<Prepared, WorkerError> {
    let frame = wire::read_frame_timeout(input, timeout)
        .await
        .map_err(|e| WorkerError::Bootstrap(e.to_string()))?;
    let bootstrap = match serde_json::from_slice::<ToWorker>(&frame) {
        Ok(ToWorker::Bootstrap(bootstrap)) => *bootstrap,
        Ok(other) => {
            return Err(WorkerError::Bootstrap(format!(
                "expected bootstrap, got {other:?}"
            )))
        }
        Err(e) => return Err(WorkerError::Bootstrap(e.to_string())),
    };
    if !bootstrap.id.is_assigned() {
        return Err(WorkerError::Bootstrap("worker id 0 is reserved".into()));
    }

    let group = bootstrap
        .groups_scheme
        .get(bootstrap.group)
        .cloned()
        .ok_or(WorkerError::UnknownGroup(bootstrap.group))?;
    let entry = registry
        .create(&group.entry_point)
        .ok_or_else(|| WorkerError::UnknownEntryPoint(group.entry_point.clone()))?;

    let storage = Arc::new(WorkerStorage::open(&bootstrap.storage_path)?);
    let now = SystemClock.epoch_ms();
    let pid = std::process::id();
    let memory_usage = MemorySampler::new().sample();
    storage.update_worker_state(bootstrap.id, |s| {
        if s.first_started_at == 0 {
            s.first_started_at = now;
        } else {
            s.restarts_count += 1;
        }
        s.is_ready = false;
        s.pid = pid;
        s.group_id = group.id;
        s.started_at = now;
        s.finished_at = 0;
        s.memory_usage = memory_usage;
        s.memory_peak_usage = memory_usage;
    })?;

    Ok(Prepared {
        bootstrap,
        group,
        storage,
        entry,
    })
}

async fn drive<R>(
    worker: Arc<Worker>,
    mut entry: Box<dyn EntryPoint>,
    input: R,
    control: mpsc::UnboundedSender<FromWorker>,
    abort: CancellationToken,
) -> ExitOutcome
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let pid = std::process::id();
    if let Err(e) = worker.update_state(|s| s.is_ready = true) {
        warn!(error = %e, "failed to mark worker ready");
    }
    let _ = control.send(FromWorker::Started { pid });
    info!(pid, "worker started");

    let done = abort.child_token();
    let commands = tokio::spawn(
        receive_commands(Arc::clone(&worker), input, control, abort.clone()).in_current_span(),
    );
    let refresh = tokio::spawn(refresh_state(Arc::clone(&worker), done.clone()).in_current_span());

    let result = tokio::select! {
        _ = abort.cancelled() => {
            info!("worker aborted");
            Ok(())
        }
        result = entry.run(Arc::clone(&worker)) => result,
    };
    done.cancel();
    let _ = refresh.await;
    drop(entry);

    worker.close_job_client().await;
    let finished_at = SystemClock.epoch_ms();
    if let Err(e) = worker.update_state(|s| {
        s.is_ready = false;
        s.finished_at = finished_at;
    }) {
        warn!(error = %e, "failed to mark worker finished");
    }
    abort.cancel();
    let _ = commands.await;

    let outcome = match result {
        Ok(()) => ExitOutcome::Clean,
        Err(EntryPointError::Terminate) => ExitOutcome::Terminate,
        Err(EntryPointError::Fatal(cause)) => ExitOutcome::Fatal(cause),
        Err(EntryPointError::Failed(cause)) => ExitOutcome::Unclassified(cause),
    };
    info!(?outcome, "worker exiting");
    outcome
}

/// Apply supervisor commands until the channel closes or the worker ends.
async fn receive_commands<R>(
    worker: Arc<Worker>,
    input: R,
    control: mpsc::UnboundedSender<FromWorker>,
    abort: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut commands = control::spawn_reader::<ToWorker, _>(input);
    loop {
        let command = tokio::select! {
            _ = abort.cancelled() => return,
            command = commands.recv() => command,
        };
        match command {
            Some(Ok(ToWorker::Shutdown { soft: true })) => {
                debug!("soft shutdown requested");
                worker.request_shutdown();
            }
            Some(Ok(ToWorker::Shutdown { soft: false })) => {
                debug!("hard shutdown requested");
                abort.cancel();
            }
            Some(Ok(ToWorker::Ping)) => {
                let _ = control.send(FromWorker::Pong);
            }
            Some(Ok(ToWorker::ScaleResult { group_id, applied })) => {
                debug!(%group_id, applied, "scale result");
                worker.on_scale_result(group_id, applied);
            }
            Some(Ok(ToWorker::Bootstrap(_))) => {
                warn!("ignoring repeated bootstrap");
            }
            Some(Err(ProtocolError::ConnectionClosed)) | None => {
                info!("supervisor closed the control channel");
                abort.cancel();
                return;
            }
            Some(Err(e)) => {
                warn!(error = %e, "control channel failed");
                abort.cancel();
                return;
            }
        }
    }
}

async fn refresh_state(worker: Arc<Worker>, done: CancellationToken) {
    let mut interval = tokio::time::interval(env::state_refresh_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut sampler = MemorySampler::new();
    loop {
        tokio::select! {
            _ = done.cancelled() => return,
            _ = interval.tick() => {}
        }
        let current = sampler.sample();
        if let Err(e) = worker.update_state(|s: &mut WorkerState| memory::record(s, current)) {
            warn!(error = %e, "state refresh failed");
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
