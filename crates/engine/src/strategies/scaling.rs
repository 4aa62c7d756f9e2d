// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hp_core::{Clock, GroupId, ScalingStrategy, SystemClock, WorkerId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Carries a scale request to whoever owns the pool.
pub trait ScaleRequester: Send + Sync {
    /// Returns false when the request could not be delivered.
    fn request(&self, group_id: GroupId, delta: i32) -> bool;
}

#[derive(Default)]
struct InFlight {
    since: Option<Instant>,
}

/// Asks for one more worker at a time.
///
/// After a request is sent, further requests for the group are suppressed
/// until the supervisor acknowledges a grown group or the cooldown expires.
/// An acknowledgement with nothing applied (the group is at its maximum)
/// leaves the suppression in place for the rest of the cooldown.
pub struct ScalingSimple<C: Clock = SystemClock> {
    group_id: GroupId,
    cooldown: Duration,
    requester: Arc<dyn ScaleRequester>,
    clock: C,
    in_flight: Mutex<InFlight>,
}

impl<C: Clock> ScalingSimple<C> {
    pub fn new(
        group_id: GroupId,
        cooldown: Duration,
        requester: Arc<dyn ScaleRequester>,
        clock: C,
    ) -> Self {
        Self {
            group_id,
            cooldown,
            requester,
            clock,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        let now = self.clock.now();
        self.in_flight
            .lock()
            .since
            .is_some_and(|since| now.duration_since(since) < self.cooldown)
    }
}

impl<C: Clock> ScalingStrategy for ScalingSimple<C> {
    fn request_scaling(&self, requesting_worker: WorkerId) -> bool {
        let now = self.clock.now();
        let mut in_flight = self.in_flight.lock();
        if let Some(since) = in_flight.since {
            if now.duration_since(since) < self.cooldown {
                return false;
            }
        }
        if !self.requester.request(self.group_id, 1) {
            return false;
        }
        debug!(group_id = %self.group_id, worker_id = %requesting_worker, "scale request sent");
        in_flight.since = Some(now);
        true
    }

    fn on_scaled(&self, applied: u32) {
        if applied > 0 {
            self.in_flight.lock().since = None;
        }
    }
}

#[cfg(test)]
#[path = "scaling_tests.rs"]
mod tests;
