// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategy seams consulted by the job client and the supervisor.

use crate::id::{GroupId, WorkerId};
use crate::outcome::ExitCause;

/// Inputs for one destination choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct PickupRequest<'a> {
    pub allowed_groups: &'a [GroupId],
    pub allowed_workers: &'a [WorkerId],
    pub ignore_workers: &'a [WorkerId],
    pub priority: i32,
    pub try_count: u32,
}

impl PickupRequest<'_> {
    /// Whether `worker` of `group` is an admissible destination.
    ///
    /// Empty `allowed_groups` admits no group: a sender without job groups
    /// has nowhere to send.
    pub fn admits(&self, worker: WorkerId, group: GroupId) -> bool {
        self.allowed_groups.contains(&group)
            && (self.allowed_workers.is_empty() || self.allowed_workers.contains(&worker))
            && !self.ignore_workers.contains(&worker)
    }
}

/// Chooses the worker a job is sent to.
pub trait PickupStrategy: Send + Sync {
    fn pickup(&self, request: &PickupRequest<'_>) -> Option<WorkerId>;
}

/// Lets a job producer ask for more workers in a group.
pub trait ScalingStrategy: Send + Sync {
    /// Returns whether growth was actually requested.
    fn request_scaling(&self, requesting_worker: WorkerId) -> bool;

    /// Called when the supervisor acknowledges a request.
    fn on_scaled(&self, _applied: u32) {}
}

/// Decides whether a finished worker is respawned.
pub trait RestartStrategy: Send + Sync {
    fn should_restart(&self, worker_id: WorkerId, cause: &ExitCause) -> bool;
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
