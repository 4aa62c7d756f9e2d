// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool configuration, loaded from a TOML file with `[pool]` and `[[groups]]`.

use crate::env;
use hp_core::WorkerGroup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Sockets, storage, and the pool lock live here.
    pub runtime_dir: PathBuf,
    /// Worker executable; the current executable when unset.
    pub worker_program: Option<PathBuf>,
    pub worker_args: Vec<String>,
    pub bootstrap_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub stop_concurrency: usize,
    pub start_poll_ms: u64,
    pub restart_delay_ms: u64,
    pub log_file: Option<PathBuf>,
    /// Handed to every worker in its bootstrap message.
    pub context: BTreeMap<String, String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            runtime_dir: std::env::temp_dir().join("hivepool"),
            worker_program: None,
            worker_args: Vec::new(),
            bootstrap_timeout_ms: 5_000,
            shutdown_timeout_ms: 5_000,
            stop_concurrency: 16,
            start_poll_ms: 50,
            restart_delay_ms: 200,
            log_file: None,
            context: BTreeMap::new(),
        }
    }
}

impl PoolConfig {
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            ..Self::default()
        }
    }

    /// Apply `HIVEPOOL_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env::runtime_dir() {
            self.runtime_dir = dir;
        }
        if let Some(timeout) = env::shutdown_timeout() {
            self.shutdown_timeout_ms = timeout.as_millis() as u64;
        }
        if let Some(path) = env::log_file() {
            self.log_file = Some(path);
        }
        self
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn start_poll(&self) -> Duration {
        Duration::from_millis(self.start_poll_ms.max(1))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.runtime_dir.join("workers.state")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.runtime_dir.join("pool.lock")
    }
}

/// A pool definition file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolFile {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub groups: Vec<WorkerGroup>,
}

impl PoolFile {
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
