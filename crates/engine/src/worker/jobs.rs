// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Worker;
use crate::error::EntryPointError;
use async_trait::async_trait;
use hp_core::{JobRequest, WorkerId};
use hp_ipc::{ConnectionObserver, JobAddress, JobServer};
use hp_storage::{Counters, WorkerStorage};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Answers jobs received by [`Worker::serve_jobs`].
///
/// `Fatal` and `Terminate` errors stop serving and are returned to the
/// entry point; other errors only count against the worker.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, request: &JobRequest) -> Result<Vec<u8>, EntryPointError>;
}

/// Keeps the connection counters of a worker's slot.
struct ConnectionCounters {
    storage: Arc<WorkerStorage>,
    worker_id: WorkerId,
}

impl ConnectionCounters {
    fn count(&self, f: impl FnOnce(&mut Counters)) {
        if let Err(e) = self
            .storage
            .update_worker_state(self.worker_id, |s| f(&mut s.connections))
        {
            warn!(worker_id = %self.worker_id, error = %e, "failed to update connection counters");
        }
    }
}

impl ConnectionObserver for ConnectionCounters {
    fn accepted(&self) {
        self.count(|c| {
            c.accepted += 1;
            c.processing += 1;
        });
    }

    fn closed(&self, failed: bool) {
        self.count(|c| {
            c.processing = c.processing.saturating_sub(1);
            if failed {
                c.errors += 1;
            } else {
                c.processed += 1;
            }
        });
    }

    fn rejected(&self) {
        self.count(|c| c.rejected += 1);
    }
}

impl Worker {
    fn count_jobs(&self, f: impl FnOnce(&mut Counters)) {
        if let Err(e) = self.update_state(|s| f(&mut s.jobs)) {
            warn!(worker_id = %self.id, error = %e, "failed to update job counters");
        }
    }

    /// Accept jobs on this worker's address until shutdown, answering each
    /// with `handler`.
    ///
    /// Jobs run concurrently; the ones already accepted finish before this
    /// returns.
    pub async fn serve_jobs<H: JobHandler>(
        self: &Arc<Self>,
        handler: H,
    ) -> Result<(), EntryPointError> {
        let address = JobAddress::for_worker(&self.runtime_dir, self.id);
        let (server, mut queue) =
            JobServer::bind(&*self.socket_factory, address, self.group.job_server)
                .await
                .map_err(|e| EntryPointError::Failed(format!("job server: {e}")))?;
        let server = server.with_observer(Arc::new(ConnectionCounters {
            storage: Arc::clone(&self.storage),
            worker_id: self.id,
        }));
        debug!(worker_id = %self.id, address = %server.address(), "serving jobs");

        let stop = self.shutdown.child_token();
        let receiving = tokio::spawn(server.receive_loop(stop.clone()));
        let handler = Arc::new(handler);
        let escalated: Arc<Mutex<Option<EntryPointError>>> = Arc::new(Mutex::new(None));
        let tracker = TaskTracker::new();

        loop {
            let job = tokio::select! {
                _ = stop.cancelled() => break,
                job = queue.recv() => job,
            };
            let Some(job) = job else { break };
            self.count_jobs(|c| {
                c.accepted += 1;
                c.processing += 1;
            });

            let worker = Arc::clone(self);
            let handler = Arc::clone(&handler);
            let escalated = Arc::clone(&escalated);
            let stop = stop.clone();
            tracker.spawn(async move {
                let result = handler.handle(&job.request).await;
                worker.count_jobs(|c| {
                    c.processing = c.processing.saturating_sub(1);
                    if result.is_ok() {
                        c.processed += 1;
                    } else {
                        c.errors += 1;
                    }
                });
                match result {
                    Ok(payload) => {
                        if let Err(e) = job.respond(payload) {
                            debug!(worker_id = %worker.id, error = %e, "response channel gone");
                        }
                    }
                    Err(EntryPointError::Failed(message)) => {
                        warn!(
                            worker_id = %worker.id,
                            job_id = %job.request.job_id,
                            %message,
                            "job failed"
                        );
                    }
                    Err(e) => {
                        escalated.lock().get_or_insert(e);
                        stop.cancel();
                    }
                }
            });
        }

        stop.cancel();
        tracker.close();
        tracker.wait().await;
        let _ = receiving.await;

        let escalated = escalated.lock().take();
        match escalated {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
