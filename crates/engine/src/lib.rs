// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hivepool engine: the worker pool supervisor and the worker runtime

pub mod config;
mod control;
pub mod env;
mod error;
mod pool;
pub mod runner;
pub mod strategies;
pub mod worker;

pub use config::{ConfigFileError, PoolConfig, PoolFile};
pub use error::{EntryPointError, PoolError, RunnerError, WorkerError};
pub use pool::{WorkerInfo, WorkerPool};
pub use runner::{DefaultRunner, ProcessRunner, WorkerProcess};
pub use worker::{
    run_worker, run_worker_on, EntryPoint, EntryPointRegistry, JobHandler, Worker,
};
