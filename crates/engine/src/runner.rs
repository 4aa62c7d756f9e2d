// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Starting worker processes

use crate::config::PoolConfig;
use crate::env::{BOOTSTRAP_TIMEOUT_VAR, LOG_FILE_VAR};
use crate::error::RunnerError;
use async_trait::async_trait;
use hp_core::{WorkerGroup, WorkerId, WORKER_ENV};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Environment variable carrying the worker id, for log correlation.
pub const WORKER_ID_ENV: &str = "HIVEPOOL_WORKER_ID";

/// A started worker with its control channel pipes.
#[derive(Debug)]
pub struct WorkerProcess {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub pid: u32,
}

/// How the supervisor starts a worker.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn spawn(
        &self,
        worker_id: WorkerId,
        group: &WorkerGroup,
    ) -> Result<WorkerProcess, RunnerError>;
}

/// Runs `program args...` with the control channel on stdin/stdout.
///
/// Stderr is inherited so worker logs land next to the supervisor's.
#[derive(Debug, Clone)]
pub struct DefaultRunner {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl DefaultRunner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            envs: Vec::new(),
        }
    }

    /// The configured worker program, or this executable.
    pub fn from_config(config: &PoolConfig) -> Self {
        let program = config
            .worker_program
            .clone()
            .or_else(|| std::env::current_exe().ok())
            .unwrap_or_else(|| PathBuf::from("hivepool"));
        let mut runner = Self::new(program, config.worker_args.clone()).env(
            BOOTSTRAP_TIMEOUT_VAR,
            config.bootstrap_timeout_ms.to_string(),
        );
        if let Some(path) = &config.log_file {
            runner = runner.env(LOG_FILE_VAR, path.display().to_string());
        }
        runner
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl ProcessRunner for DefaultRunner {
    async fn spawn(
        &self,
        worker_id: WorkerId,
        group: &WorkerGroup,
    ) -> Result<WorkerProcess, RunnerError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(WORKER_ENV, "1")
            .env(WORKER_ID_ENV, worker_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or(RunnerError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(RunnerError::MissingPipe("stdout"))?;
        let pid = child.id().unwrap_or_default();
        tracing::debug!(
            %worker_id,
            group = %group.name,
            pid,
            program = %self.program.display(),
            "spawned worker process"
        );
        Ok(WorkerProcess {
            child,
            stdin,
            stdout,
            pid,
        })
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
