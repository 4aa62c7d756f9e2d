// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hp-core: shared vocabulary of the hivepool supervisor and its workers

pub mod clock;
pub mod control;
pub mod group;
pub mod id;
pub mod job;
pub mod outcome;
pub mod scheme;
pub mod strategy;

pub use clock::{Clock, FakeClock, SystemClock};
pub use control::{Bootstrap, FromWorker, ToWorker, WORKER_ENV};
pub use group::{
    JobClientConfig, JobServerConfig, PickupKind, RestartKind, ScalingKind, WorkerGroup,
    WorkerType, DEFAULT_SCALING_COOLDOWN,
};
pub use id::{GroupId, JobId, WorkerId};
pub use job::{JobOptions, JobRequest, JobResponse};
pub use outcome::{ExitCause, ExitOutcome};
pub use scheme::{ConfigError, GroupsScheme};
pub use strategy::{PickupRequest, PickupStrategy, RestartStrategy, ScalingStrategy};
