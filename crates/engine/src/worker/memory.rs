// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resident memory sampling for the worker's own slot.

use hp_storage::WorkerState;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

pub(crate) struct MemorySampler {
    pid: Pid,
    system: System,
}

impl MemorySampler {
    pub(crate) fn new() -> Self {
        Self {
            pid: Pid::from_u32(std::process::id()),
            system: System::new(),
        }
    }

    /// Resident memory of this process in bytes, 0 when it cannot be read.
    pub(crate) fn sample(&mut self) -> u64 {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        self.system
            .process(self.pid)
            .map(|process| process.memory())
            .unwrap_or(0)
    }
}

/// Store a sample; the peak only grows for the life of the process.
pub(crate) fn record(state: &mut WorkerState, current: u64) {
    state.memory_usage = current;
    state.memory_peak_usage = state.memory_peak_usage.max(current);
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
