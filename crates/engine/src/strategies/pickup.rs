// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hp_core::{PickupRequest, PickupStrategy, WorkerId};
use hp_storage::{WorkerState, WorkerStorage};
use rand::seq::IndexedRandom;
use std::sync::Arc;
use tracing::debug;

/// Ready workers the request admits, in id order.
fn candidates(
    storage: &WorkerStorage,
    request: &PickupRequest<'_>,
) -> Vec<(WorkerId, WorkerState)> {
    storage
        .foreach_workers()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "skipping unreadable worker slot");
                None
            }
        })
        .filter(|(id, state)| state.is_ready && request.admits(*id, state.group_id))
        .collect()
}

/// Picks the ready worker with the fewest jobs in flight; ties go to the
/// lowest id.
pub struct PickupLeastJobs {
    storage: Arc<WorkerStorage>,
}

impl PickupLeastJobs {
    pub fn new(storage: Arc<WorkerStorage>) -> Self {
        Self { storage }
    }
}

impl PickupStrategy for PickupLeastJobs {
    fn pickup(&self, request: &PickupRequest<'_>) -> Option<WorkerId> {
        candidates(&self.storage, request)
            .into_iter()
            .min_by_key(|(_, state)| state.jobs.processing)
            .map(|(id, _)| id)
    }
}

/// Picks uniformly among ready workers.
pub struct PickupRandom {
    storage: Arc<WorkerStorage>,
}

impl PickupRandom {
    pub fn new(storage: Arc<WorkerStorage>) -> Self {
        Self { storage }
    }
}

impl PickupStrategy for PickupRandom {
    fn pickup(&self, request: &PickupRequest<'_>) -> Option<WorkerId> {
        candidates(&self.storage, request)
            .choose(&mut rand::rng())
            .map(|(id, _)| *id)
    }
}

#[cfg(test)]
#[path = "pickup_tests.rs"]
mod tests;
