// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry points built into the `hivepool` binary.
//!
//! Files are written to the directory named by the `output_dir` context key,
//! one file per worker: `<kind>-<worker id>`.

use async_trait::async_trait;
use hp_core::{JobOptions, JobRequest};
use hp_engine::{EntryPoint, EntryPointError, EntryPointRegistry, JobHandler, Worker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(test)]
#[path = "entry_points_tests.rs"]
mod tests;

pub const OUTPUT_DIR: &str = "output_dir";

const COUNTER_TICK: Duration = Duration::from_millis(100);
const SEND_RETRY: Duration = Duration::from_millis(200);

pub fn registry() -> EntryPointRegistry {
    EntryPointRegistry::new()
        .with("hello", || Hello)
        .with("counter", || Counter)
        .with("echo", || Echo)
        .with("job-client", || JobClientDemo)
        .with("wait", || Wait)
        .with("fatal", || Fatal)
        .with("terminate", || Terminate)
}

fn output_path(worker: &Worker, kind: &str) -> Result<PathBuf, EntryPointError> {
    let dir = worker
        .context()
        .get(OUTPUT_DIR)
        .ok_or_else(|| EntryPointError::Fatal(format!("context has no {}", OUTPUT_DIR)))?;
    Ok(PathBuf::from(dir).join(format!("{}-{}", kind, worker.id())))
}

/// Writes a greeting and exits.
struct Hello;

#[async_trait]
impl EntryPoint for Hello {
    async fn run(&mut self, worker: Arc<Worker>) -> Result<(), EntryPointError> {
        let path = output_path(&worker, "hello")?;
        let text = format!(
            "Hello from worker {} of {}\n",
            worker.id(),
            worker.group().name
        );
        tokio::fs::write(&path, text).await?;
        info!(path = %path.display(), "greeting written");
        Ok(())
    }
}

/// Counts ticks until shutdown, then writes the count.
struct Counter;

#[async_trait]
impl EntryPoint for Counter {
    async fn run(&mut self, worker: Arc<Worker>) -> Result<(), EntryPointError> {
        let path = output_path(&worker, "counter")?;
        let mut ticks = tokio::time::interval(COUNTER_TICK);
        let mut count: u64 = 0;
        loop {
            tokio::select! {
                _ = worker.shutdown_token().cancelled() => break,
                _ = ticks.tick() => count += 1,
            }
        }
        tokio::fs::write(&path, format!("{}\n", count)).await?;
        Ok(())
    }
}

/// Answers every job with `"OK: "` followed by its payload.
struct Echo;

struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    async fn handle(&self, request: &JobRequest) -> Result<Vec<u8>, EntryPointError> {
        Ok([b"OK: ".as_slice(), &request.payload].concat())
    }
}

#[async_trait]
impl EntryPoint for Echo {
    async fn run(&mut self, worker: Arc<Worker>) -> Result<(), EntryPointError> {
        worker.serve_jobs(EchoHandler).await
    }
}

/// Sends `"Test"` to the group's job groups and writes the response.
///
/// A failed send is retried until shutdown, so the client may start before
/// its targets listen.
struct JobClientDemo;

#[async_trait]
impl EntryPoint for JobClientDemo {
    async fn run(&mut self, worker: Arc<Worker>) -> Result<(), EntryPointError> {
        let path = output_path(&worker, "result")?;
        let options = JobOptions::awaiting().to_groups(worker.group().job_groups.iter().copied());

        while !worker.is_shutdown_requested() {
            let sent = worker
                .job_client()
                .send_job_immediately(b"Test".to_vec(), options.clone())
                .await;
            let result = match sent {
                Ok(Some(pending)) => pending.await_result().await,
                Ok(None) => return Err(EntryPointError::Failed("no result handle".into())),
                Err(e) => Err(e),
            };
            match result {
                Ok(response) => {
                    tokio::fs::write(&path, response).await?;
                    info!(path = %path.display(), "job result written");
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "job failed, retrying"),
            }
            tokio::select! {
                _ = worker.shutdown_token().cancelled() => return Ok(()),
                _ = tokio::time::sleep(SEND_RETRY) => {}
            }
        }
        Ok(())
    }
}

/// Idles until shutdown.
struct Wait;

#[async_trait]
impl EntryPoint for Wait {
    async fn run(&mut self, worker: Arc<Worker>) -> Result<(), EntryPointError> {
        worker.shutdown_token().cancelled().await;
        Ok(())
    }
}

struct Fatal;

#[async_trait]
impl EntryPoint for Fatal {
    async fn run(&mut self, _worker: Arc<Worker>) -> Result<(), EntryPointError> {
        Err(EntryPointError::Fatal("fatal entry point".into()))
    }
}

struct Terminate;

#[async_trait]
impl EntryPoint for Terminate {
    async fn run(&mut self, _worker: Arc<Worker>) -> Result<(), EntryPointError> {
        Err(EntryPointError::Terminate)
    }
}
