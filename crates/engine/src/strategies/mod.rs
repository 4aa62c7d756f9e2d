// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete pickup, restart, and scaling strategies.
//!
//! Groups carry only the serialisable kind of each strategy; both the
//! supervisor and the workers build the live objects from it.

mod pickup;
mod restart;
mod scaling;

pub use pickup::{PickupLeastJobs, PickupRandom};
pub use restart::{RestartAlways, RestartLimited, RestartNever};
pub use scaling::{ScaleRequester, ScalingSimple};

use hp_core::{
    GroupId, PickupKind, PickupStrategy, RestartKind, RestartStrategy, ScalingKind,
    ScalingStrategy, SystemClock,
};
use hp_storage::WorkerStorage;
use std::sync::Arc;
use std::time::Duration;

pub fn pickup_for(kind: PickupKind, storage: Arc<WorkerStorage>) -> Arc<dyn PickupStrategy> {
    match kind {
        PickupKind::LeastJobs => Arc::new(PickupLeastJobs::new(storage)),
        PickupKind::Random => Arc::new(PickupRandom::new(storage)),
    }
}

pub fn restart_for(kind: RestartKind) -> Arc<dyn RestartStrategy> {
    match kind {
        RestartKind::Always => Arc::new(RestartAlways),
        RestartKind::Never => Arc::new(RestartNever),
        RestartKind::Limited { max_restarts } => Arc::new(RestartLimited::new(max_restarts)),
    }
}

/// `None` when scaling is disabled for the group.
pub fn scaling_for(
    kind: ScalingKind,
    group_id: GroupId,
    requester: Arc<dyn ScaleRequester>,
) -> Option<Arc<dyn ScalingStrategy>> {
    match kind {
        ScalingKind::Disabled => None,
        ScalingKind::Simple { cooldown_ms } => Some(Arc::new(ScalingSimple::new(
            group_id,
            Duration::from_millis(cooldown_ms),
            requester,
            SystemClock,
        ))),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
