// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Worker state storage for hivepool

mod record;
mod region;
mod storage;

pub use record::{Counters, WorkerState, RECORD_SIZE};
pub use storage::{StateHandle, StorageError, WorkerStates, WorkerStorage};
