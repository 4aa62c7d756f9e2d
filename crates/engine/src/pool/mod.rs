// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool orchestrator.
//!
//! One supervision task per worker slot spawns the process, feeds it the
//! bootstrap message, relays its control messages, and decides after every
//! exit whether the slot is respawned.

mod supervise;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::runner::{DefaultRunner, ProcessRunner};
use crate::strategies;
use crate::worker::EntryPointRegistry;
use fs2::FileExt;
use futures::StreamExt;
use hp_core::{
    Clock, ConfigError, GroupId, GroupsScheme, RestartStrategy, SystemClock, ToWorker,
    WorkerGroup, WorkerId,
};
use hp_storage::WorkerStorage;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Snapshot of one worker slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub group_id: GroupId,
    /// Set while a process is running in the slot.
    pub pid: Option<u32>,
    pub should_be_started: bool,
}

struct WorkerDescriptor {
    id: WorkerId,
    group_id: GroupId,
    should_be_started: bool,
    should_be_restarted: bool,
    pid: Option<u32>,
    control: Option<mpsc::UnboundedSender<ToWorker>>,
    /// Fired to kill the current process; replaced on every spawn.
    kill: CancellationToken,
    task: Option<JoinHandle<Result<(), PoolError>>>,
}

impl WorkerDescriptor {
    fn new(id: WorkerId, group_id: GroupId) -> Self {
        Self {
            id,
            group_id,
            should_be_started: true,
            should_be_restarted: false,
            pid: None,
            control: None,
            kill: CancellationToken::new(),
            task: None,
        }
    }

    /// Ask the process to stop; a soft request falls back to a kill when the
    /// control channel is not attached.
    fn shutdown(&self, soft: bool) {
        if soft {
            if let Some(control) = &self.control {
                if control.send(ToWorker::Shutdown { soft: true }).is_ok() {
                    return;
                }
            }
        }
        self.kill.cancel();
    }

    fn has_live_task(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

/// Live strategies of one group.
struct GroupRuntime {
    restart: Arc<dyn RestartStrategy>,
    runner: Option<Arc<dyn ProcessRunner>>,
}

struct PoolState {
    scheme: GroupsScheme,
    groups: HashMap<GroupId, GroupRuntime>,
    workers: BTreeMap<WorkerId, WorkerDescriptor>,
    phase: Phase,
    storage: Option<Arc<WorkerStorage>>,
    // NOTE(lifetime): held for the exclusive lock on the runtime directory
    #[allow(dead_code)]
    lock: Option<File>,
    fatal: Option<PoolError>,
}

struct PoolInner {
    config: PoolConfig,
    registry: Arc<EntryPointRegistry>,
    runner: Arc<dyn ProcessRunner>,
    state: Mutex<PoolState>,
    tracker: TaskTracker,
    /// Fired once the pool starts stopping.
    stopping: CancellationToken,
    /// Fired when the graceful stop gives up.
    kill_all: CancellationToken,
    changed: Notify,
}

/// Handle on a worker pool. Clones share the pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Pool whose workers run the configured worker program.
    pub fn new(config: PoolConfig, registry: Arc<EntryPointRegistry>) -> Self {
        let runner = Arc::new(DefaultRunner::from_config(&config));
        Self::with_runner(config, registry, runner)
    }

    pub fn with_runner(
        config: PoolConfig,
        registry: Arc<EntryPointRegistry>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                registry,
                runner,
                state: Mutex::new(PoolState {
                    scheme: GroupsScheme::new(),
                    groups: HashMap::new(),
                    workers: BTreeMap::new(),
                    phase: Phase::Idle,
                    storage: None,
                    lock: None,
                    fatal: None,
                }),
                tracker: TaskTracker::new(),
                stopping: CancellationToken::new(),
                kill_all: CancellationToken::new(),
                changed: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Validate and register a group; its `min_workers` slots are created
    /// now and started by [`WorkerPool::run`].
    pub fn describe_group(&self, group: WorkerGroup) -> Result<GroupId, ConfigError> {
        if !self.inner.registry.contains(&group.entry_point) {
            let name = if group.name.is_empty() {
                group.default_name()
            } else {
                group.name.clone()
            };
            return Err(ConfigError::UnknownEntryPoint {
                group: name,
                entry_point: group.entry_point,
            });
        }

        let mut state = self.inner.state.lock();
        if state.phase != Phase::Idle {
            return Err(ConfigError::Invalid(
                "groups must be described before the pool starts".into(),
            ));
        }
        let group = state.scheme.describe(group)?.clone();
        let first = state
            .workers
            .keys()
            .next_back()
            .map_or(1, |id| id.get() + 1);
        for n in 0..group.min_workers {
            let id = WorkerId::new(first + n);
            state.workers.insert(id, WorkerDescriptor::new(id, group.id));
        }
        state.groups.insert(
            group.id,
            GroupRuntime {
                restart: strategies::restart_for(group.restart),
                runner: None,
            },
        );
        info!(
            group_id = %group.id,
            name = %group.name,
            entry_point = %group.entry_point,
            min = group.min_workers,
            max = group.max_workers,
            "worker group described"
        );
        Ok(group.id)
    }

    /// Replace the restart strategy built from the group's description.
    pub fn set_restart_strategy(
        &self,
        group_id: GroupId,
        strategy: Arc<dyn RestartStrategy>,
    ) -> Result<(), ConfigError> {
        let mut state = self.inner.state.lock();
        let runtime = state
            .groups
            .get_mut(&group_id)
            .ok_or(ConfigError::UnknownGroup(group_id))?;
        runtime.restart = strategy;
        Ok(())
    }

    /// Start this group's workers with `runner` instead of the pool's.
    pub fn set_runner(
        &self,
        group_id: GroupId,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<(), ConfigError> {
        let mut state = self.inner.state.lock();
        let runtime = state
            .groups
            .get_mut(&group_id)
            .ok_or(ConfigError::UnknownGroup(group_id))?;
        runtime.runner = Some(runner);
        Ok(())
    }

    pub fn groups_scheme(&self) -> GroupsScheme {
        self.inner.state.lock().scheme.clone()
    }

    pub fn storage(&self) -> Option<Arc<WorkerStorage>> {
        self.inner.state.lock().storage.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().phase == Phase::Running
    }

    /// Fires once the pool starts stopping.
    pub fn stopping(&self) -> CancellationToken {
        self.inner.stopping.clone()
    }

    /// Start the pool and wait until it has stopped.
    ///
    /// Returns the first fatal worker error, if one stopped the pool.
    pub async fn run(&self) -> Result<(), PoolError> {
        self.start()?;
        self.wait().await
    }

    /// Start every described worker and return.
    pub fn start(&self) -> Result<(), PoolError> {
        self.inner.start()
    }

    /// Wait until every supervision task of a started pool has ended.
    pub async fn wait(&self) -> Result<(), PoolError> {
        if self.inner.state.lock().phase == Phase::Idle {
            return Err(PoolError::NotStarted);
        }
        self.inner.tracker.wait().await;
        self.inner.stopping.cancel();
        let mut state = self.inner.state.lock();
        if state.phase == Phase::Running {
            state.phase = Phase::Stopped;
            info!("every worker has ended");
            mark_application_stopped(&state);
        }
        match state.fatal.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Wait until every worker that should run reports ready.
    ///
    /// Fails with [`PoolError::Cancelled`] when the pool stops first.
    pub async fn await_start(&self) -> Result<(), PoolError> {
        loop {
            let changed = self.inner.changed.notified();
            if self.inner.all_started()? {
                return Ok(());
            }
            tokio::select! {
                _ = self.inner.stopping.cancelled() => return Err(PoolError::Cancelled),
                _ = changed => {}
                _ = tokio::time::sleep(self.inner.config.start_poll()) => {}
            }
        }
    }

    /// Stop every worker.
    ///
    /// Workers are asked to stop softly and killed when `cancellation` fires
    /// or the shutdown timeout elapses.
    pub async fn stop(&self, cancellation: Option<CancellationToken>) -> Result<(), PoolError> {
        self.inner.stop(cancellation).await
    }

    /// Stop and respawn every worker.
    pub fn restart(&self, soft: bool) -> Result<(), PoolError> {
        self.inner.restart(soft)
    }

    /// Stop and respawn one worker, softly.
    pub fn restart_worker(&self, worker_id: WorkerId) -> Result<(), PoolError> {
        self.inner.restart_worker(worker_id)
    }

    /// Send a liveness check; the answer is logged by the worker's
    /// supervision task. Returns false when no process is attached.
    pub fn ping_worker(&self, worker_id: WorkerId) -> Result<bool, PoolError> {
        let state = self.inner.state.lock();
        let descriptor = state
            .workers
            .get(&worker_id)
            .ok_or(PoolError::UnknownWorker(worker_id))?;
        Ok(descriptor
            .control
            .as_ref()
            .is_some_and(|control| control.send(ToWorker::Ping).is_ok()))
    }

    /// Grow or shrink a group within its bounds; returns how many workers
    /// were started or stopped.
    pub fn scale_workers(&self, group_id: GroupId, delta: i32) -> Result<u32, PoolError> {
        self.inner.scale_workers(group_id, delta)
    }

    /// Workers of a group that should be running.
    ///
    /// `only_running` counts those with a live process, `not_running` those
    /// without; with neither, all of them.
    pub fn count_workers(&self, group_id: GroupId, only_running: bool, not_running: bool) -> usize {
        self.inner
            .state
            .lock()
            .workers
            .values()
            .filter(|d| d.group_id == group_id && d.should_be_started)
            .filter(|d| {
                if only_running {
                    d.pid.is_some()
                } else if not_running {
                    d.pid.is_none()
                } else {
                    true
                }
            })
            .count()
    }

    pub fn get_workers(&self) -> Vec<WorkerInfo> {
        self.inner
            .state
            .lock()
            .workers
            .values()
            .map(|d| WorkerInfo {
                id: d.id,
                group_id: d.group_id,
                pid: d.pid,
                should_be_started: d.should_be_started,
            })
            .collect()
    }
}

impl PoolInner {
    fn start(self: &Arc<Self>) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if state.phase != Phase::Idle {
            return Err(PoolError::AlreadyRunning);
        }
        state.scheme.validate()?;
        if !state.workers.values().any(|d| d.should_be_started) {
            return Err(ConfigError::NoWorkersToStart.into());
        }

        std::fs::create_dir_all(&self.config.runtime_dir)?;
        let lock = lock_runtime_dir(&self.config)?;
        let storage = Arc::new(WorkerStorage::create(
            &self.config.storage_path(),
            state.scheme.total_max_workers(),
        )?);
        {
            let now = SystemClock.epoch_ms();
            let mut app = storage.application_state()?;
            app.is_ready = true;
            app.pid = std::process::id();
            app.first_started_at = now;
            app.started_at = now;
            app.update()?;
        }

        state.lock = Some(lock);
        state.storage = Some(storage);
        state.phase = Phase::Running;
        let ids: Vec<WorkerId> = state.workers.keys().copied().collect();
        for id in &ids {
            self.spawn_supervisor(&mut state, *id);
        }
        drop(state);
        self.tracker.close();

        info!(
            workers = ids.len(),
            runtime_dir = %self.config.runtime_dir.display(),
            "pool started"
        );
        Ok(())
    }

    fn spawn_supervisor(self: &Arc<Self>, state: &mut PoolState, worker_id: WorkerId) {
        let task = self
            .tracker
            .spawn(supervise::supervise(Arc::clone(self), worker_id));
        if let Some(descriptor) = state.workers.get_mut(&worker_id) {
            descriptor.task = Some(task);
        }
    }

    fn all_started(&self) -> Result<bool, PoolError> {
        let state = self.state.lock();
        match state.phase {
            Phase::Idle => return Ok(false),
            Phase::Stopped => return Err(PoolError::Cancelled),
            Phase::Running => {}
        }
        let Some(storage) = &state.storage else {
            return Ok(false);
        };
        for descriptor in state.workers.values().filter(|d| d.should_be_started) {
            let Some(pid) = descriptor.pid else {
                return Ok(false);
            };
            let slot = storage.review_worker_state(descriptor.id)?;
            if !slot.is_ready || slot.pid != pid {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn stop(
        self: &Arc<Self>,
        cancellation: Option<CancellationToken>,
    ) -> Result<(), PoolError> {
        let tasks = {
            let mut state = self.state.lock();
            if state.phase != Phase::Running {
                return Ok(());
            }
            state.phase = Phase::Stopped;
            for descriptor in state.workers.values() {
                if let Some(control) = &descriptor.control {
                    let _ = control.send(ToWorker::Shutdown { soft: true });
                }
            }
            state
                .workers
                .values_mut()
                .filter_map(|d| d.task.take().map(|task| (d.id, task)))
                .collect::<Vec<_>>()
        };
        self.stopping.cancel();
        self.changed.notify_waiters();
        info!(workers = tasks.len(), "stopping pool");

        let kill_all = self.kill_all.clone();
        let grace = self.config.shutdown_timeout();
        let forcer = tokio::spawn(async move {
            let cancelled = async {
                match &cancellation {
                    Some(token) => token.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = cancelled => {}
                _ = tokio::time::sleep(grace) => {}
            }
            warn!("killing workers that did not stop");
            kill_all.cancel();
        });

        let mut errors: Vec<PoolError> = futures::stream::iter(tasks)
            .map(|(worker_id, task)| async move {
                match task.await {
                    Ok(result) => result,
                    Err(e) => Err(PoolError::WorkerTask {
                        worker_id,
                        message: e.to_string(),
                    }),
                }
            })
            .buffer_unordered(self.config.stop_concurrency.max(1))
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;
        forcer.abort();

        {
            let mut state = self.state.lock();
            state.workers.clear();
            mark_application_stopped(&state);
        }
        self.changed.notify_waiters();

        match errors.len() {
            0 => {
                info!("pool stopped");
                Ok(())
            }
            1 => Err(PoolError::StopFailed(Box::new(errors.remove(0)))),
            _ => Err(PoolError::Composite(errors)),
        }
    }

    /// Record the first fatal error and stop the pool in the background.
    fn fail(self: &Arc<Self>, error: PoolError) {
        {
            let mut state = self.state.lock();
            if state.fatal.is_some() {
                debug!(error = %error, "pool already failing");
                return;
            }
            error!(error = %error, "stopping pool after fatal error");
            state.fatal = Some(error);
        }
        let pool = Arc::clone(self);
        self.tracker.spawn(async move {
            if let Err(e) = pool.stop(None).await {
                warn!(error = %e, "pool stop reported failures");
            }
        });
    }

    fn restart(self: &Arc<Self>, soft: bool) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if state.phase != Phase::Running {
            return Ok(());
        }
        let ids: Vec<WorkerId> = state.workers.keys().copied().collect();
        for id in ids {
            self.restart_descriptor(&mut state, id, soft);
        }
        if let Some(storage) = &state.storage {
            let mut app = storage.application_state()?;
            app.restarts_count += 1;
            app.update()?;
        }
        info!(soft, "restarting every worker");
        Ok(())
    }

    fn restart_worker(self: &Arc<Self>, worker_id: WorkerId) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if !state.workers.contains_key(&worker_id) {
            return Err(PoolError::UnknownWorker(worker_id));
        }
        if state.phase == Phase::Running {
            info!(%worker_id, "restarting worker");
            self.restart_descriptor(&mut state, worker_id, true);
        }
        Ok(())
    }

    fn restart_descriptor(
        self: &Arc<Self>,
        state: &mut PoolState,
        worker_id: WorkerId,
        soft: bool,
    ) {
        let Some(descriptor) = state.workers.get_mut(&worker_id) else {
            return;
        };
        if !descriptor.should_be_started {
            return;
        }
        if descriptor.has_live_task() {
            descriptor.should_be_restarted = true;
            descriptor.shutdown(soft);
        } else {
            self.spawn_supervisor(state, worker_id);
        }
    }

    fn scale_workers(self: &Arc<Self>, group_id: GroupId, delta: i32) -> Result<u32, PoolError> {
        let mut state = self.state.lock();
        let group = state
            .scheme
            .get(group_id)
            .ok_or(ConfigError::UnknownGroup(group_id))?;
        let (min, max) = (group.min_workers, group.max_workers);
        if state.phase != Phase::Running || delta == 0 {
            return Ok(0);
        }
        let current = state
            .workers
            .values()
            .filter(|d| d.group_id == group_id && d.should_be_started)
            .count() as u32;

        let applied = if delta > 0 {
            // Workers still draining after a scale-down keep their process and id.
            let occupied = state
                .workers
                .values()
                .filter(|d| d.group_id == group_id)
                .count() as u32;
            let wanted = delta.unsigned_abs().min(max.saturating_sub(occupied));
            let total = state.scheme.total_max_workers();
            let mut started = 0;
            for _ in 0..wanted {
                let Some(id) = (1..=total)
                    .map(WorkerId::new)
                    .find(|id| !state.workers.contains_key(id))
                else {
                    break;
                };
                state.workers.insert(id, WorkerDescriptor::new(id, group_id));
                self.spawn_supervisor(&mut state, id);
                started += 1;
            }
            started
        } else {
            let wanted = delta.unsigned_abs().min(current.saturating_sub(min)) as usize;
            let victims: Vec<WorkerId> = state
                .workers
                .values()
                .rev()
                .filter(|d| d.group_id == group_id && d.should_be_started)
                .take(wanted)
                .map(|d| d.id)
                .collect();
            for id in &victims {
                if let Some(descriptor) = state.workers.get_mut(id) {
                    descriptor.should_be_started = false;
                    descriptor.should_be_restarted = false;
                    descriptor.shutdown(true);
                }
            }
            victims.len() as u32
        };

        info!(%group_id, delta, applied, before = current, "scaled worker group");
        self.changed.notify_waiters();
        Ok(applied)
    }
}

fn lock_runtime_dir(config: &PoolConfig) -> Result<File, PoolError> {
    // Open without truncating: the pid inside belongs to whoever holds the lock.
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(config.lock_path())?;
    file.try_lock_exclusive()
        .map_err(|_| PoolError::Locked(config.runtime_dir.clone()))?;

    let mut file = file;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

fn mark_application_stopped(state: &PoolState) {
    let Some(storage) = &state.storage else {
        return;
    };
    let result = storage.application_state().and_then(|mut app| {
        app.is_ready = false;
        app.finished_at = SystemClock.epoch_ms();
        app.update()
    });
    if let Err(e) = result {
        warn!(error = %e, "failed to update application state");
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
