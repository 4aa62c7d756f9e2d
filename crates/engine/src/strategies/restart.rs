// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hp_core::{ExitCause, RestartStrategy, WorkerId};
use parking_lot::Mutex;
use std::collections::HashMap;

// The supervisor never consults a restart strategy for fatal, terminate, or
// cancelled exits; those are decided before we get here.

pub struct RestartAlways;

impl RestartStrategy for RestartAlways {
    fn should_restart(&self, _worker_id: WorkerId, _cause: &ExitCause) -> bool {
        true
    }
}

pub struct RestartNever;

impl RestartStrategy for RestartNever {
    fn should_restart(&self, _worker_id: WorkerId, _cause: &ExitCause) -> bool {
        false
    }
}

/// Allows each worker `max_restarts` respawns over the pool's lifetime.
pub struct RestartLimited {
    max_restarts: u32,
    restarts: Mutex<HashMap<WorkerId, u32>>,
}

impl RestartLimited {
    pub fn new(max_restarts: u32) -> Self {
        Self {
            max_restarts,
            restarts: Mutex::new(HashMap::new()),
        }
    }

    pub fn restarts_of(&self, worker_id: WorkerId) -> u32 {
        self.restarts.lock().get(&worker_id).copied().unwrap_or(0)
    }
}

impl RestartStrategy for RestartLimited {
    fn should_restart(&self, worker_id: WorkerId, _cause: &ExitCause) -> bool {
        let mut restarts = self.restarts.lock();
        let count = restarts.entry(worker_id).or_insert(0);
        if *count >= self.max_restarts {
            return false;
        }
        *count += 1;
        true
    }
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod tests;
