// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records exchanged between workers.
//!
//! Payloads are opaque bytes; the pool never interprets them.

use crate::id::{GroupId, JobId, WorkerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Zero for fire-and-forget jobs.
    pub job_id: JobId,
    pub from_worker_id: WorkerId,
    pub worker_group_id: GroupId,
    pub priority: i32,
    pub payload: Vec<u8>,
}

impl JobRequest {
    pub fn expects_response(&self) -> bool {
        self.job_id.expects_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResponse {
    pub job_id: JobId,
    pub payload: Vec<u8>,
}

/// Routing options for a job send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Destination groups; the sender's own job groups when empty.
    pub allowed_groups: Vec<GroupId>,
    /// Restrict destinations to these workers when non-empty.
    pub allowed_workers: Vec<WorkerId>,
    pub priority: i32,
    /// Register a pending result and wait for a response.
    pub await_result: bool,
}

impl JobOptions {
    pub fn awaiting() -> Self {
        Self {
            await_result: true,
            ..Self::default()
        }
    }

    pub fn to_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.allowed_groups = groups.into_iter().collect();
        self
    }

    pub fn to_workers(mut self, workers: impl IntoIterator<Item = WorkerId>) -> Self {
        self.allowed_workers = workers.into_iter().collect();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
