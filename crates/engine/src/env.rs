// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::path::PathBuf;
use std::time::Duration;

/// Set by the supervisor so a worker knows how long to wait for bootstrap.
pub const BOOTSTRAP_TIMEOUT_VAR: &str = "HIVEPOOL_BOOTSTRAP_TIMEOUT_MS";

/// Set by the supervisor so workers log to the pool's log file.
pub const LOG_FILE_VAR: &str = "HIVEPOOL_LOG_FILE";

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn non_empty_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Runtime directory override
pub fn runtime_dir() -> Option<PathBuf> {
    non_empty_path("HIVEPOOL_RUNTIME_DIR")
}

/// Graceful shutdown timeout override
pub fn shutdown_timeout() -> Option<Duration> {
    parse_duration_ms("HIVEPOOL_SHUTDOWN_TIMEOUT_MS")
}

/// Log file override
pub fn log_file() -> Option<PathBuf> {
    non_empty_path(LOG_FILE_VAR)
}

/// How long a worker waits for its bootstrap message (default: 5000ms).
pub fn bootstrap_timeout() -> Duration {
    parse_duration_ms(BOOTSTRAP_TIMEOUT_VAR).unwrap_or(Duration::from_secs(5))
}

/// Interval of the worker's state refresh (default: 1000ms).
pub fn state_refresh_interval() -> Duration {
    parse_duration_ms("HIVEPOOL_STATE_REFRESH_MS").unwrap_or(Duration::from_secs(1))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
