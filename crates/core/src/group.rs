// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker group description.
//!
//! A group is a template for a class of workers. It is serialisable because
//! the supervisor ships the whole scheme to every worker at bootstrap; the
//! strategies referenced here are therefore described by kind and rebuilt
//! on each side of the process boundary.

use crate::id::GroupId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role of a worker group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerType {
    Service,
    Job,
    Reactor,
}

impl WorkerType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerType::Service => "service",
            WorkerType::Job => "job",
            WorkerType::Reactor => "reactor",
        }
    }
}

impl std::fmt::Display for WorkerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a job destination is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PickupKind {
    /// Ready worker with the fewest jobs in flight.
    #[default]
    LeastJobs,
    Random,
}

/// Whether a worker that exited gets respawned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum RestartKind {
    #[default]
    Always,
    Never,
    /// Respawn each worker at most `max_restarts` times.
    Limited { max_restarts: u32 },
}

/// Whether a job producer may ask the supervisor to grow this group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum ScalingKind {
    Disabled,
    /// Ask for one more worker at a time, at most once per cooldown.
    Simple { cooldown_ms: u64 },
}

impl Default for ScalingKind {
    fn default() -> Self {
        ScalingKind::Simple {
            cooldown_ms: DEFAULT_SCALING_COOLDOWN.as_millis() as u64,
        }
    }
}

/// Default minimum interval between two scale requests for one group.
pub const DEFAULT_SCALING_COOLDOWN: Duration = Duration::from_secs(5);

/// Settings for the job client a worker of this group uses to send jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobClientConfig {
    pub max_try_count: u32,
    /// Delay before retrying when no worker is available. Zero fails at once.
    pub retry_interval_ms: u64,
    /// Delay before retrying after a scale-up was requested.
    pub scaling_timeout_ms: u64,
    /// How long a pending result may wait for its response.
    pub result_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for JobClientConfig {
    fn default() -> Self {
        Self {
            max_try_count: 3,
            retry_interval_ms: 1_000,
            scaling_timeout_ms: 2_000,
            result_timeout_ms: 600_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl JobClientConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn scaling_timeout(&self) -> Duration {
        Duration::from_millis(self.scaling_timeout_ms)
    }

    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.result_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Settings for the job server a worker of this group may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobServerConfig {
    /// Accepted jobs waiting for the application; producers block when full.
    pub queue_capacity: usize,
    pub handshake_timeout_ms: u64,
}

impl Default for JobServerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            handshake_timeout_ms: 5_000,
        }
    }
}

impl JobServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Configuration for a class of workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerGroup {
    /// Assigned at registration; zero until then.
    #[serde(default)]
    pub id: GroupId,
    /// Name resolved through the entry-point registry of the worker binary.
    pub entry_point: String,
    pub worker_type: WorkerType,
    #[serde(default)]
    pub min_workers: u32,
    /// Zero means "same as `min_workers`".
    #[serde(default)]
    pub max_workers: u32,
    #[serde(default)]
    pub name: String,
    /// Groups this group may send jobs to.
    #[serde(default)]
    pub job_groups: Vec<GroupId>,
    #[serde(default)]
    pub pickup: PickupKind,
    #[serde(default)]
    pub restart: RestartKind,
    #[serde(default)]
    pub scaling: ScalingKind,
    #[serde(default)]
    pub job_client: JobClientConfig,
    #[serde(default)]
    pub job_server: JobServerConfig,
}

impl WorkerGroup {
    pub fn new(entry_point: impl Into<String>, worker_type: WorkerType) -> Self {
        Self {
            id: GroupId::default(),
            entry_point: entry_point.into(),
            worker_type,
            min_workers: 0,
            max_workers: 0,
            name: String::new(),
            job_groups: Vec::new(),
            pickup: PickupKind::default(),
            restart: RestartKind::default(),
            scaling: ScalingKind::default(),
            job_client: JobClientConfig::default(),
            job_server: JobServerConfig::default(),
        }
    }

    pub fn min_workers(mut self, n: u32) -> Self {
        self.min_workers = n;
        self
    }

    pub fn max_workers(mut self, n: u32) -> Self {
        self.max_workers = n;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn job_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.job_groups = groups.into_iter().collect();
        self
    }

    pub fn pickup(mut self, kind: PickupKind) -> Self {
        self.pickup = kind;
        self
    }

    pub fn restart(mut self, kind: RestartKind) -> Self {
        self.restart = kind;
        self
    }

    pub fn scaling(mut self, kind: ScalingKind) -> Self {
        self.scaling = kind;
        self
    }

    pub fn job_client(mut self, config: JobClientConfig) -> Self {
        self.job_client = config;
        self
    }

    pub fn job_server(mut self, config: JobServerConfig) -> Self {
        self.job_server = config;
        self
    }

    /// Name derived from the entry point: its last path segment, capitalised.
    pub fn default_name(&self) -> String {
        let tail = self
            .entry_point
            .rsplit(|c| c == ':' || c == '/' || c == '\\')
            .next()
            .unwrap_or_default();

        let mut chars = tail.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => format!("Group{}", self.id),
        }
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
