// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hp-ipc: framing, job records, and the worker-to-worker job channel

pub mod address;
pub mod client;
pub mod codec;
pub mod server;
pub mod wire;

pub use address::{BoxStream, DefaultSocketFactory, JobAddress, JobListener, SocketFactory};
pub use client::{JobClient, JobClientBuilder, JobError, JobResult, PendingJob};
pub use server::{ConnectionObserver, IncomingJob, JobQueue, JobServer};
pub use wire::ProtocolError;
