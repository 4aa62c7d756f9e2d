// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side runtime: what an entry point sees of its own process.

mod jobs;
mod memory;
mod registry;
mod run;

pub use jobs::JobHandler;
pub use registry::{EntryPoint, EntryPointRegistry};
pub use run::{run_worker, run_worker_on};

use crate::strategies::{self, ScaleRequester};
use hp_core::{
    Bootstrap, FromWorker, GroupId, GroupsScheme, ScalingStrategy, WorkerGroup, WorkerId,
};
use hp_ipc::{DefaultSocketFactory, JobClient, SocketFactory};
use hp_storage::{StorageError, WorkerState, WorkerStorage};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sends scale requests up the control channel.
struct ControlScaleRequester {
    control: mpsc::UnboundedSender<FromWorker>,
}

impl ScaleRequester for ControlScaleRequester {
    fn request(&self, group_id: GroupId, delta: i32) -> bool {
        self.control
            .send(FromWorker::ScaleRequest { group_id, delta })
            .is_ok()
    }
}

pub struct Worker {
    id: WorkerId,
    group: WorkerGroup,
    scheme: GroupsScheme,
    runtime_dir: PathBuf,
    context: BTreeMap<String, String>,
    storage: Arc<WorkerStorage>,
    shutdown: CancellationToken,
    abort: CancellationToken,
    scaling: HashMap<GroupId, Arc<dyn ScalingStrategy>>,
    socket_factory: Arc<dyn SocketFactory>,
    job_client: OnceLock<JobClient>,
}

impl Worker {
    pub(crate) fn new(
        bootstrap: Bootstrap,
        group: WorkerGroup,
        storage: Arc<WorkerStorage>,
        control: mpsc::UnboundedSender<FromWorker>,
        abort: CancellationToken,
    ) -> Self {
        let requester: Arc<dyn ScaleRequester> = Arc::new(ControlScaleRequester { control });
        let scaling = bootstrap
            .groups_scheme
            .iter()
            .filter_map(|g| {
                strategies::scaling_for(g.scaling, g.id, Arc::clone(&requester))
                    .map(|strategy| (g.id, strategy))
            })
            .collect();
        Self {
            id: bootstrap.id,
            group,
            scheme: bootstrap.groups_scheme,
            runtime_dir: bootstrap.runtime_dir,
            context: bootstrap.context,
            storage,
            shutdown: abort.child_token(),
            abort,
            scaling,
            socket_factory: Arc::new(DefaultSocketFactory),
            job_client: OnceLock::new(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn group(&self) -> &WorkerGroup {
        &self.group
    }

    pub fn groups_scheme(&self) -> &GroupsScheme {
        &self.scheme
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn storage(&self) -> &Arc<WorkerStorage> {
        &self.storage
    }

    /// Fresh copy of this worker's own slot.
    pub fn state(&self) -> Result<WorkerState, StorageError> {
        self.storage.review_worker_state(self.id)
    }

    /// Read-modify-write this worker's own slot.
    pub fn update_state<F>(&self, f: F) -> Result<WorkerState, StorageError>
    where
        F: FnOnce(&mut WorkerState),
    {
        self.storage.update_worker_state(self.id, f)
    }

    /// Fires on a soft shutdown request, and on abort.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Scaling strategy used when producing jobs for `group_id`.
    pub fn scaling(&self, group_id: GroupId) -> Option<&Arc<dyn ScalingStrategy>> {
        self.scaling.get(&group_id)
    }

    /// The job client, created on first use.
    pub fn job_client(&self) -> &JobClient {
        self.job_client.get_or_init(|| {
            let pickup = strategies::pickup_for(self.group.pickup, Arc::clone(&self.storage));
            let mut builder = JobClient::builder(self.id, &self.group, &self.runtime_dir, pickup)
                .socket_factory(Arc::clone(&self.socket_factory))
                .cancellation(self.abort.child_token());
            for group_id in &self.group.job_groups {
                if let Some(strategy) = self.scaling.get(group_id) {
                    builder = builder.scaling(*group_id, Arc::clone(strategy));
                }
            }
            builder.build()
        })
    }

    pub(crate) fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn on_scale_result(&self, group_id: GroupId, applied: u32) {
        if let Some(strategy) = self.scaling.get(&group_id) {
            strategy.on_scaled(applied);
        }
    }

    pub(crate) async fn close_job_client(&self) {
        if let Some(client) = self.job_client.get() {
            client.close().await;
        }
    }
}
