// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job IPC client.
//!
//! One outbound channel per destination worker, connected on first use.
//! Each channel has a read loop that resolves pending results by job id.
//! A broken channel is discarded and reconnected by the next send.
//!
//! A pending result is completed exactly once: the entry leaves the table
//! either through its response or through the timeout sweep, and whoever
//! removes it completes it.

use crate::address::{BoxStream, DefaultSocketFactory, JobAddress, SocketFactory};
use crate::codec::{self, CLOSE_HANDSHAKE, HANDSHAKE};
use crate::wire::{self, ProtocolError};
use hp_core::{
    GroupId, JobClientConfig, JobId, JobOptions, JobRequest, JobResponse, PickupRequest,
    PickupStrategy, ScalingStrategy, WorkerGroup, WorkerId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("no workers available in groups {groups:?}")]
    NoWorkersAvailable { groups: Vec<GroupId> },

    #[error("send failed after {tries} tries")]
    SendFailed { tries: u32 },

    #[error("job result timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("cancelled")]
    Cancelled,
}

pub type JobResult = Result<Vec<u8>, JobError>;

/// Handle on the response to a job sent with `await_result`.
#[derive(Debug)]
pub struct PendingJob {
    job_id: JobId,
    rx: oneshot::Receiver<JobResult>,
}

impl PendingJob {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub async fn await_result(self) -> JobResult {
        self.rx.await.unwrap_or(Err(JobError::Cancelled))
    }
}

struct Waiter {
    job_id: JobId,
    tx: oneshot::Sender<JobResult>,
}

struct PendingEntry {
    tx: oneshot::Sender<JobResult>,
    channel: WorkerId,
    sent_at: Instant,
}

struct Channel {
    id: u64,
    writer: tokio::sync::Mutex<WriteHalf<BoxStream>>,
}

pub struct JobClientBuilder {
    worker_id: WorkerId,
    group_id: GroupId,
    job_groups: Vec<GroupId>,
    config: JobClientConfig,
    runtime_dir: PathBuf,
    pickup: Arc<dyn PickupStrategy>,
    scaling: HashMap<GroupId, Arc<dyn ScalingStrategy>>,
    factory: Arc<dyn SocketFactory>,
    cancel: Option<CancellationToken>,
}

impl JobClientBuilder {
    pub fn scaling(mut self, group: GroupId, strategy: Arc<dyn ScalingStrategy>) -> Self {
        self.scaling.insert(group, strategy);
        self
    }

    pub fn socket_factory(mut self, factory: Arc<dyn SocketFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(mut self, config: JobClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Parent token; cancelling it closes the client.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the client and start its timeout sweep. Requires a tokio runtime.
    pub fn build(self) -> JobClient {
        let cancel = match self.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let inner = Arc::new(ClientInner {
            worker_id: self.worker_id,
            group_id: self.group_id,
            job_groups: self.job_groups,
            config: self.config,
            runtime_dir: self.runtime_dir,
            pickup: self.pickup,
            scaling: self.scaling,
            factory: self.factory,
            channels: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_job_id: AtomicU64::new(1),
            next_channel_id: AtomicU64::new(1),
            cancel,
        });
        spawn_sweeper(&inner);
        JobClient { inner }
    }
}

pub struct JobClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    worker_id: WorkerId,
    group_id: GroupId,
    job_groups: Vec<GroupId>,
    config: JobClientConfig,
    runtime_dir: PathBuf,
    pickup: Arc<dyn PickupStrategy>,
    scaling: HashMap<GroupId, Arc<dyn ScalingStrategy>>,
    factory: Arc<dyn SocketFactory>,
    channels: Mutex<HashMap<WorkerId, Arc<Channel>>>,
    pending: Mutex<HashMap<JobId, PendingEntry>>,
    next_job_id: AtomicU64,
    next_channel_id: AtomicU64,
    cancel: CancellationToken,
}

impl JobClient {
    /// Client for `worker_id`, a member of `group`.
    pub fn builder(
        worker_id: WorkerId,
        group: &WorkerGroup,
        runtime_dir: impl Into<PathBuf>,
        pickup: Arc<dyn PickupStrategy>,
    ) -> JobClientBuilder {
        JobClientBuilder {
            worker_id,
            group_id: group.id,
            job_groups: group.job_groups.clone(),
            config: group.job_client,
            runtime_dir: runtime_dir.into(),
            pickup,
            scaling: HashMap::new(),
            factory: Arc::new(DefaultSocketFactory),
            cancel: None,
        }
    }

    /// Queue a send and return at once.
    ///
    /// When `options.await_result` is set the returned handle completes with
    /// the response or with the error that ended the send. Otherwise a failed
    /// send is only logged.
    pub fn send_job(&self, payload: Vec<u8>, options: JobOptions) -> Option<PendingJob> {
        let (pending, waiter) = self.inner.prepare(options.await_result);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let awaited = waiter.is_some();
            if let Err(e) = inner.send(payload, options, waiter).await {
                if !awaited {
                    warn!(worker_id = %inner.worker_id, error = %e, "job dropped");
                }
            }
        });
        pending
    }

    /// Perform the send in the calling task.
    pub async fn send_job_immediately(
        &self,
        payload: Vec<u8>,
        options: JobOptions,
    ) -> Result<Option<PendingJob>, JobError> {
        let (pending, waiter) = self.inner.prepare(options.await_result);
        self.inner.send(payload, options, waiter).await?;
        Ok(pending)
    }

    /// Number of results still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Workers with an open channel.
    pub fn connected_workers(&self) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self.inner.channels.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Say goodbye on every channel, close them and stop the sweep.
    /// Results still pending complete with [`JobError::Cancelled`].
    pub async fn close(&self) {
        self.inner.cancel.cancel();

        let channels: Vec<_> = self.inner.channels.lock().drain().map(|(_, c)| c).collect();
        for channel in channels {
            let mut writer = channel.writer.lock().await;
            let _ = wire::write_frame(&mut *writer, CLOSE_HANDSHAKE).await;
            let _ = writer.shutdown().await;
        }

        let pending: Vec<_> = self.inner.pending.lock().drain().map(|(_, e)| e).collect();
        for entry in pending {
            let _ = entry.tx.send(Err(JobError::Cancelled));
        }
    }
}

impl Drop for JobClient {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl ClientInner {
    fn prepare(&self, await_result: bool) -> (Option<PendingJob>, Option<Waiter>) {
        if !await_result {
            return (None, None);
        }
        let job_id = JobId::new(self.next_job_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        (Some(PendingJob { job_id, rx }), Some(Waiter { job_id, tx }))
    }

    async fn send(
        self: &Arc<Self>,
        payload: Vec<u8>,
        options: JobOptions,
        mut waiter: Option<Waiter>,
    ) -> Result<(), JobError> {
        let allowed_groups = if options.allowed_groups.is_empty() {
            self.job_groups.clone()
        } else {
            options.allowed_groups
        };
        let mut ignore_workers = vec![self.worker_id];
        let request = JobRequest {
            job_id: waiter
                .as_ref()
                .map(|w| w.job_id)
                .unwrap_or(JobId::FIRE_AND_FORGET),
            from_worker_id: self.worker_id,
            worker_group_id: self.group_id,
            priority: options.priority,
            payload,
        };
        let max_tries = self.config.max_try_count;
        let mut try_count = 0;

        let result = loop {
            if try_count >= max_tries {
                break Err(JobError::SendFailed { tries: max_tries });
            }
            if self.cancel.is_cancelled() {
                break Err(JobError::Cancelled);
            }

            let picked = self.pickup.pickup(&PickupRequest {
                allowed_groups: &allowed_groups,
                allowed_workers: &options.allowed_workers,
                ignore_workers: &ignore_workers,
                priority: options.priority,
                try_count,
            });

            let Some(worker_id) = picked else {
                let scaling_requested = self.request_scaling(&allowed_groups);
                let delay = if scaling_requested && !self.config.scaling_timeout().is_zero() {
                    self.config.scaling_timeout()
                } else if !self.config.retry_interval().is_zero() {
                    self.config.retry_interval()
                } else {
                    break Err(JobError::NoWorkersAvailable {
                        groups: allowed_groups.clone(),
                    });
                };
                try_count += 1;
                debug!(
                    groups = ?allowed_groups,
                    try_count,
                    scaling_requested,
                    "no worker available for job"
                );
                if try_count < max_tries && !self.sleep(delay).await {
                    break Err(JobError::Cancelled);
                }
                continue;
            };

            match self.try_send(worker_id, &request, &mut waiter).await {
                Ok(()) => break Ok(()),
                Err(e) => {
                    warn!(
                        from = %self.worker_id,
                        to = %worker_id,
                        try_count,
                        error = %e,
                        "job send failed, trying another worker"
                    );
                    ignore_workers.push(worker_id);
                    try_count += 1;
                }
            }
        };

        if let Err(e) = &result {
            if let Some(waiter) = waiter.take() {
                let _ = waiter.tx.send(Err(e.clone()));
            }
        }
        result
    }

    async fn try_send(
        self: &Arc<Self>,
        worker_id: WorkerId,
        request: &JobRequest,
        waiter: &mut Option<Waiter>,
    ) -> Result<(), ProtocolError> {
        let channel = self.channel(worker_id).await?;

        // Registered before writing so a fast response always finds its entry.
        if let Some(w) = waiter.take() {
            self.pending.lock().insert(
                w.job_id,
                PendingEntry {
                    tx: w.tx,
                    channel: worker_id,
                    sent_at: Instant::now(),
                },
            );
        }

        let body = codec::encode_request(request);
        let written = {
            let mut writer = channel.writer.lock().await;
            wire::write_frame(&mut *writer, &body).await
        };

        if let Err(e) = written {
            self.discard_channel(worker_id, channel.id);
            let entry = self.pending.lock().remove(&request.job_id);
            if let Some(entry) = entry {
                *waiter = Some(Waiter {
                    job_id: request.job_id,
                    tx: entry.tx,
                });
            }
            return Err(e);
        }
        Ok(())
    }

    async fn channel(self: &Arc<Self>, worker_id: WorkerId) -> Result<Arc<Channel>, ProtocolError> {
        let existing = self.channels.lock().get(&worker_id).cloned();
        if let Some(channel) = existing {
            return Ok(channel);
        }

        let address = JobAddress::for_worker(&self.runtime_dir, worker_id);
        let mut stream = self
            .factory
            .connect(&address, self.config.connect_timeout())
            .await?;
        stream.write_all(HANDSHAKE).await?;
        stream.flush().await?;

        let (reader, writer) = tokio::io::split(stream);
        let channel = Arc::new(Channel {
            id: self.next_channel_id.fetch_add(1, Ordering::Relaxed),
            writer: tokio::sync::Mutex::new(writer),
        });

        {
            let mut channels = self.channels.lock();
            if let Some(raced) = channels.get(&worker_id) {
                return Ok(Arc::clone(raced));
            }
            channels.insert(worker_id, Arc::clone(&channel));
        }

        debug!(from = %self.worker_id, to = %worker_id, %address, "job channel connected");
        tokio::spawn(read_loop(
            Arc::downgrade(self),
            worker_id,
            channel.id,
            reader,
            self.cancel.clone(),
        ));
        Ok(channel)
    }

    fn discard_channel(&self, worker_id: WorkerId, channel_id: u64) {
        let mut channels = self.channels.lock();
        if channels.get(&worker_id).is_some_and(|c| c.id == channel_id) {
            channels.remove(&worker_id);
        }
    }

    fn resolve(&self, response: JobResponse) {
        let entry = self.pending.lock().remove(&response.job_id);
        match entry {
            Some(entry) => {
                let _ = entry.tx.send(Ok(response.payload));
            }
            None => debug!(job_id = %response.job_id, "response for unknown or expired job"),
        }
    }

    fn expire_pending(&self, now: Instant) {
        let timeout = self.config.result_timeout();
        let expired: Vec<(JobId, PendingEntry)> = {
            let mut pending = self.pending.lock();
            let ids: Vec<JobId> = pending
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.sent_at) >= timeout)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|e| (id, e)))
                .collect()
        };
        for (job_id, entry) in expired {
            debug!(%job_id, to = %entry.channel, "job result timed out");
            let _ = entry.tx.send(Err(JobError::Timeout { after: timeout }));
        }
    }

    /// Consult the scaling strategy of every allowed group.
    fn request_scaling(&self, groups: &[GroupId]) -> bool {
        let mut requested = false;
        for group in groups {
            if let Some(strategy) = self.scaling.get(group) {
                if strategy.request_scaling(self.worker_id) {
                    requested = true;
                }
            }
        }
        requested
    }

    /// Returns false when cancelled.
    async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

fn spawn_sweeper(inner: &Arc<ClientInner>) {
    let weak = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();
    let period = (inner.config.result_timeout() / 2).max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(inner) = weak.upgrade() else { break };
            inner.expire_pending(Instant::now());
        }
    });
}

async fn read_loop(
    client: Weak<ClientInner>,
    worker_id: WorkerId,
    channel_id: u64,
    mut reader: ReadHalf<BoxStream>,
    cancel: CancellationToken,
) {
    loop {
        let body = tokio::select! {
            _ = cancel.cancelled() => return,
            body = wire::read_frame(&mut reader) => body,
        };
        let Some(inner) = client.upgrade() else {
            return;
        };
        match body.and_then(|b| codec::decode_response(&b)) {
            Ok(response) => inner.resolve(response),
            Err(e) => {
                if !matches!(e, ProtocolError::ConnectionClosed) {
                    warn!(to = %worker_id, error = %e, "job channel broken");
                }
                inner.discard_channel(worker_id, channel_id);
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
