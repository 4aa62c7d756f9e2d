// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages on the supervisor/worker control channel (the child's stdio).

use crate::id::{GroupId, WorkerId};
use crate::outcome::ExitOutcome;
use crate::scheme::GroupsScheme;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything a fresh worker needs to know about itself and the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub id: WorkerId,
    pub group: GroupId,
    pub groups_scheme: GroupsScheme,
    pub storage_path: PathBuf,
    pub runtime_dir: PathBuf,
    pub context: BTreeMap<String, String>,
}

/// Supervisor to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToWorker {
    Bootstrap(Box<Bootstrap>),
    /// Soft asks the entry point to wind down; hard aborts it.
    Shutdown { soft: bool },
    Ping,
    /// Answer to a [`FromWorker::ScaleRequest`].
    ScaleResult { group_id: GroupId, applied: u32 },
}

/// Worker to supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FromWorker {
    Started { pid: u32 },
    Pong,
    ScaleRequest { group_id: GroupId, delta: i32 },
    Exiting { outcome: ExitOutcome },
}

/// Set in the environment of every spawned worker process.
pub const WORKER_ENV: &str = "HIVEPOOL_WORKER";

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
