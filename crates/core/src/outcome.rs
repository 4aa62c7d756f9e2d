// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! How a worker ended, as reported by the worker and as seen by the supervisor.

use serde::{Deserialize, Serialize};

/// Outcome a worker reports over its control channel before exiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cause", rename_all = "snake_case")]
pub enum ExitOutcome {
    Clean,
    /// Stop without restart and without error.
    Terminate,
    /// Never restarted; stops the whole pool.
    Fatal(String),
    Unclassified(String),
}

/// Supervisor-side classification of a finished worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitCause {
    Clean,
    Terminate,
    /// The control channel broke or the process died without reporting.
    Transport(String),
    Unclassified(String),
    Fatal(String),
    /// The supervisor asked the worker to go away.
    Cancelled,
}

impl ExitCause {
    /// Whether this cause counts as a failure worth logging at warn level.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExitCause::Transport(_) | ExitCause::Unclassified(_) | ExitCause::Fatal(_)
        )
    }
}

impl From<ExitOutcome> for ExitCause {
    fn from(outcome: ExitOutcome) -> Self {
        match outcome {
            ExitOutcome::Clean => ExitCause::Clean,
            ExitOutcome::Terminate => ExitCause::Terminate,
            ExitOutcome::Fatal(cause) => ExitCause::Fatal(cause),
            ExitOutcome::Unclassified(cause) => ExitCause::Unclassified(cause),
        }
    }
}

impl std::fmt::Display for ExitCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCause::Clean => f.write_str("clean exit"),
            ExitCause::Terminate => f.write_str("terminated"),
            ExitCause::Transport(cause) => write!(f, "transport failure: {cause}"),
            ExitCause::Unclassified(cause) => write!(f, "failed: {cause}"),
            ExitCause::Fatal(cause) => write!(f, "fatal: {cause}"),
            ExitCause::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
