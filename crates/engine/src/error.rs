// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the supervisor and the worker runtime

use hp_core::{ConfigError, GroupId, WorkerId};
use hp_ipc::{JobError, ProtocolError};
use hp_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the worker pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runtime directory {0} is used by another pool")]
    Locked(PathBuf),
    #[error("the pool is already running or has already run")]
    AlreadyRunning,
    #[error("the pool has not been started")]
    NotStarted,
    #[error("unknown worker {0}")]
    UnknownWorker(WorkerId),
    #[error("starting worker {worker_id} failed: {source}")]
    Spawn {
        worker_id: WorkerId,
        #[source]
        source: RunnerError,
    },
    #[error("worker {worker_id} failed fatally: {cause}")]
    FatalWorker { worker_id: WorkerId, cause: String },
    #[error("worker {worker_id}: {message}")]
    WorkerTask { worker_id: WorkerId, message: String },
    #[error("stopping the pool failed: {0}")]
    StopFailed(Box<PoolError>),
    #[error(
        "stopping the pool failed: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    Composite(Vec<PoolError>),
    #[error("cancelled")]
    Cancelled,
}

/// Errors from starting a worker process
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("spawn failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker process has no {0} pipe")]
    MissingPipe(&'static str),
}

/// Errors that end the worker runtime before or around the entry point
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("unknown entry point '{0}'")]
    UnknownEntryPoint(String),
    #[error("group {0} is not in the scheme")]
    UnknownGroup(GroupId),
    #[error("control channel: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// How an entry point ends abnormally
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryPointError {
    /// Stop this worker for good, without an error.
    #[error("terminate requested")]
    Terminate,
    /// Stop the whole pool.
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("{0}")]
    Failed(String),
}

impl From<JobError> for EntryPointError {
    fn from(e: JobError) -> Self {
        EntryPointError::Failed(e.to_string())
    }
}

impl From<std::io::Error> for EntryPointError {
    fn from(e: std::io::Error) -> Self {
        EntryPointError::Failed(e.to_string())
    }
}

impl From<StorageError> for EntryPointError {
    fn from(e: StorageError) -> Self {
        EntryPointError::Failed(e.to_string())
    }
}

impl From<WorkerError> for EntryPointError {
    fn from(e: WorkerError) -> Self {
        EntryPointError::Failed(e.to_string())
    }
}
