// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{Phase, PoolInner};
use crate::control;
use crate::error::PoolError;
use crate::runner::{ProcessRunner, WorkerProcess};
use hp_core::{
    Bootstrap, Clock, ExitCause, ExitOutcome, FromWorker, RestartStrategy, SystemClock, ToWorker,
    WorkerGroup, WorkerId,
};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long an exited worker's last messages are waited for.
const EXIT_REPORT_GRACE: Duration = Duration::from_millis(200);

/// Everything needed to start one process in a slot.
struct Launch {
    group: WorkerGroup,
    runner: Arc<dyn ProcessRunner>,
    restart: Arc<dyn RestartStrategy>,
    kill: CancellationToken,
    bootstrap: Bootstrap,
}

enum Next {
    Respawn,
    Done,
    Fatal(String),
}

/// Supervise one worker slot until it is no longer wanted.
pub(super) async fn supervise(pool: Arc<PoolInner>, worker_id: WorkerId) -> Result<(), PoolError> {
    let result = supervise_slot(&pool, worker_id).await;
    pool.slot_released(worker_id);
    result
}

async fn supervise_slot(pool: &Arc<PoolInner>, worker_id: WorkerId) -> Result<(), PoolError> {
    let mut respawn = false;
    loop {
        if respawn {
            tokio::select! {
                _ = pool.stopping.cancelled() => return Ok(()),
                _ = tokio::time::sleep(pool.config.restart_delay()) => {}
            }
        }
        let Some(launch) = pool.prepare_launch(worker_id) else {
            return Ok(());
        };

        let process = match launch.runner.spawn(worker_id, &launch.group).await {
            Ok(process) => process,
            Err(source) => {
                let message = source.to_string();
                pool.fail(PoolError::Spawn { worker_id, source });
                return Err(PoolError::WorkerTask { worker_id, message });
            }
        };
        let pid = process.pid;
        info!(%worker_id, group = %launch.group.name, pid, "worker process started");

        let cause = drive(pool, worker_id, process, launch.bootstrap, &launch.kill).await;
        pool.heal_slot(worker_id, pid);

        match pool.after_exit(worker_id, &cause, launch.restart.as_ref()) {
            Next::Respawn => respawn = true,
            Next::Done => return Ok(()),
            Next::Fatal(cause) => {
                pool.fail(PoolError::FatalWorker {
                    worker_id,
                    cause: cause.clone(),
                });
                return Err(PoolError::WorkerTask {
                    worker_id,
                    message: format!("fatal: {cause}"),
                });
            }
        }
    }
}

/// Feed the process its bootstrap, relay its messages, and classify its exit.
async fn drive(
    pool: &Arc<PoolInner>,
    worker_id: WorkerId,
    process: WorkerProcess,
    bootstrap: Bootstrap,
    kill: &CancellationToken,
) -> ExitCause {
    let WorkerProcess {
        mut child,
        stdin,
        stdout,
        pid,
    } = process;
    let close = CancellationToken::new();
    let (control, writer) = control::spawn_writer::<ToWorker, _>(stdin, close.clone());
    let mut messages = control::spawn_reader::<FromWorker, _>(stdout);
    let _ = control.send(ToWorker::Bootstrap(Box::new(bootstrap)));
    pool.attach(worker_id, pid, control.clone());

    let mut outcome = None;
    let mut transport = None;
    let mut reading = true;

    let status = loop {
        tokio::select! {
            biased;
            _ = kill.cancelled() => {
                debug!(%worker_id, pid, "killing worker");
                if let Err(e) = child.start_kill() {
                    warn!(%worker_id, pid, error = %e, "failed to kill worker");
                }
                let _ = child.wait().await;
                close.cancel();
                writer.abort();
                return ExitCause::Cancelled;
            }
            status = child.wait() => break status,
            message = messages.recv(), if reading => match message {
                Some(Ok(message)) => {
                    pool.handle_message(worker_id, message, &control, &mut outcome)
                }
                Some(Err(e)) => {
                    warn!(%worker_id, error = %e, "control channel failed");
                    transport = Some(e.to_string());
                }
                None => reading = false,
            },
        }
    };

    // Messages written just before exit may still be in the pipe.
    if reading {
        while let Ok(Some(message)) =
            tokio::time::timeout(EXIT_REPORT_GRACE, messages.recv()).await
        {
            if let Ok(message) = message {
                pool.handle_message(worker_id, message, &control, &mut outcome);
            }
        }
    }
    close.cancel();
    writer.abort();
    classify(status, outcome, transport)
}

fn classify(
    status: std::io::Result<ExitStatus>,
    outcome: Option<ExitOutcome>,
    transport: Option<String>,
) -> ExitCause {
    match (outcome, transport) {
        (Some(outcome), _) => ExitCause::from(outcome),
        (None, Some(error)) => ExitCause::Transport(error),
        (None, None) => ExitCause::Transport(match status {
            Ok(status) => format!("{status} without reporting an outcome"),
            Err(e) => format!("waiting for the process failed: {e}"),
        }),
    }
}

impl PoolInner {
    fn prepare_launch(&self, worker_id: WorkerId) -> Option<Launch> {
        let mut state = self.state.lock();
        if state.phase != Phase::Running {
            return None;
        }
        let storage_path = state.storage.as_ref()?.path().to_path_buf();
        let kill = self.kill_all.child_token();
        let descriptor = state.workers.get_mut(&worker_id)?;
        if !descriptor.should_be_started {
            return None;
        }
        descriptor.should_be_restarted = false;
        descriptor.kill = kill.clone();
        let group_id = descriptor.group_id;

        let group = state.scheme.get(group_id)?.clone();
        let runtime = state.groups.get(&group_id)?;
        let runner = runtime
            .runner
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.runner));
        let restart = Arc::clone(&runtime.restart);
        Some(Launch {
            group,
            runner,
            restart,
            kill,
            bootstrap: Bootstrap {
                id: worker_id,
                group: group_id,
                groups_scheme: state.scheme.clone(),
                storage_path,
                runtime_dir: self.config.runtime_dir.clone(),
                context: self.config.context.clone(),
            },
        })
    }

    fn attach(&self, worker_id: WorkerId, pid: u32, control: mpsc::UnboundedSender<ToWorker>) {
        let mut state = self.state.lock();
        let running = state.phase == Phase::Running;
        if let Some(descriptor) = state.workers.get_mut(&worker_id) {
            descriptor.pid = Some(pid);
            // The pool stopped or the slot was scaled away while starting.
            if !running || !descriptor.should_be_started {
                let _ = control.send(ToWorker::Shutdown { soft: true });
            }
            descriptor.control = Some(control);
        }
    }

    fn handle_message(
        self: &Arc<Self>,
        worker_id: WorkerId,
        message: FromWorker,
        control: &mpsc::UnboundedSender<ToWorker>,
        outcome: &mut Option<ExitOutcome>,
    ) {
        match message {
            FromWorker::Started { pid } => {
                debug!(%worker_id, pid, "worker reported started");
                self.changed.notify_waiters();
            }
            FromWorker::Pong => debug!(%worker_id, "pong"),
            FromWorker::ScaleRequest { group_id, delta } => {
                let applied = self.scale_workers(group_id, delta).unwrap_or_else(|e| {
                    warn!(%worker_id, %group_id, error = %e, "scale request rejected");
                    0
                });
                let _ = control.send(ToWorker::ScaleResult { group_id, applied });
            }
            FromWorker::Exiting { outcome: reported } => {
                debug!(%worker_id, outcome = ?reported, "worker reported exit");
                *outcome = Some(reported);
            }
        }
    }

    /// Clear readiness left behind by a worker that died without doing so.
    fn heal_slot(&self, worker_id: WorkerId, pid: u32) {
        let Some(storage) = self.state.lock().storage.clone() else {
            return;
        };
        let result = storage.get_worker_state(worker_id).and_then(|mut slot| {
            if slot.is_ready && slot.pid == pid {
                slot.is_ready = false;
                slot.finished_at = SystemClock.epoch_ms();
                slot.update()?;
                debug!(%worker_id, pid, "cleared stale readiness");
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(%worker_id, error = %e, "failed to check worker slot");
        }
    }

    fn after_exit(
        &self,
        worker_id: WorkerId,
        cause: &ExitCause,
        restart: &dyn RestartStrategy,
    ) -> Next {
        let mut state = self.state.lock();
        let running = state.phase == Phase::Running;
        let Some(descriptor) = state.workers.get_mut(&worker_id) else {
            return Next::Done;
        };
        descriptor.pid = None;
        descriptor.control = None;
        let restart_requested = std::mem::take(&mut descriptor.should_be_restarted);
        let wanted = running && descriptor.should_be_started;

        let next = match cause {
            ExitCause::Fatal(cause) => Next::Fatal(cause.clone()),
            ExitCause::Terminate => Next::Done,
            ExitCause::Cancelled => {
                if wanted && restart_requested {
                    Next::Respawn
                } else {
                    Next::Done
                }
            }
            _ => {
                if wanted && (restart_requested || restart.should_restart(worker_id, cause)) {
                    Next::Respawn
                } else {
                    Next::Done
                }
            }
        };
        // A slot given up while the pool runs frees its id.
        if running && !matches!(next, Next::Respawn) {
            descriptor.should_be_started = false;
        }

        match cause {
            ExitCause::Fatal(_) => error!(%worker_id, %cause, "worker failed fatally"),
            ExitCause::Transport(_) | ExitCause::Unclassified(_) => {
                warn!(%worker_id, %cause, respawn = matches!(next, Next::Respawn), "worker failed")
            }
            ExitCause::Cancelled => debug!(%worker_id, "worker killed"),
            ExitCause::Clean | ExitCause::Terminate => {
                info!(%worker_id, %cause, respawn = matches!(next, Next::Respawn), "worker exited")
            }
        }
        next
    }

    fn slot_released(&self, worker_id: WorkerId) {
        let mut state = self.state.lock();
        let released = state
            .workers
            .get(&worker_id)
            .is_some_and(|d| !d.should_be_started);
        if released {
            state.workers.remove(&worker_id);
            debug!(%worker_id, "worker slot released");
        }
        drop(state);
        self.changed.notify_waiters();
    }
}

#[cfg(test)]
#[path = "supervise_tests.rs"]
mod tests;
