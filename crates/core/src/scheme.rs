// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The set of registered worker groups and its validation rules.

use crate::group::WorkerGroup;
use crate::id::GroupId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid group description or scheme. The pool never starts with one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("group '{group}': max_workers must be greater than zero")]
    ZeroMaxWorkers { group: String },

    #[error("group '{group}': min_workers ({min}) exceeds max_workers ({max})")]
    MinExceedsMax { group: String, min: u32, max: u32 },

    #[error("group '{group}': unknown entry point '{entry_point}'")]
    UnknownEntryPoint { group: String, entry_point: String },

    #[error("group '{group}': job group {job_group} listed more than once")]
    DuplicateJobGroup { group: String, job_group: GroupId },

    #[error("group '{group}': cannot send jobs to itself")]
    SelfReferencingJobGroup { group: String },

    #[error("group '{group}': unknown job group {job_group}")]
    UnknownJobGroup { group: String, job_group: GroupId },

    #[error("no worker groups described")]
    EmptyScheme,

    #[error("group ids must be strictly increasing, found {next} after {previous}")]
    NonIncreasingGroupIds { previous: GroupId, next: GroupId },

    #[error("no workers to start")]
    NoWorkersToStart,

    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    #[error("invalid pool configuration: {0}")]
    Invalid(String),
}

/// Registered groups in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupsScheme {
    groups: Vec<WorkerGroup>,
}

impl GroupsScheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a group, assign it the next id and register it.
    ///
    /// Job-group references to groups not yet described are accepted here and
    /// checked by [`GroupsScheme::validate`] once the scheme is complete.
    pub fn describe(&mut self, mut group: WorkerGroup) -> Result<&WorkerGroup, ConfigError> {
        group.id = self.next_id();
        if group.name.is_empty() {
            group.name = group.default_name();
        }

        if group.max_workers == 0 {
            group.max_workers = group.min_workers;
        }
        if group.max_workers == 0 {
            return Err(ConfigError::ZeroMaxWorkers { group: group.name });
        }
        if group.min_workers > group.max_workers {
            return Err(ConfigError::MinExceedsMax {
                group: group.name,
                min: group.min_workers,
                max: group.max_workers,
            });
        }

        for (i, job_group) in group.job_groups.iter().enumerate() {
            if *job_group == group.id {
                return Err(ConfigError::SelfReferencingJobGroup { group: group.name });
            }
            if group.job_groups[..i].contains(job_group) {
                return Err(ConfigError::DuplicateJobGroup {
                    group: group.name.clone(),
                    job_group: *job_group,
                });
            }
        }

        self.groups.push(group);
        let index = self.groups.len() - 1;
        Ok(&self.groups[index])
    }

    /// Check the complete scheme before the pool starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::EmptyScheme);
        }

        for pair in self.groups.windows(2) {
            if pair[1].id <= pair[0].id {
                return Err(ConfigError::NonIncreasingGroupIds {
                    previous: pair[0].id,
                    next: pair[1].id,
                });
            }
        }

        for group in &self.groups {
            for job_group in &group.job_groups {
                if *job_group == group.id {
                    return Err(ConfigError::SelfReferencingJobGroup {
                        group: group.name.clone(),
                    });
                }
                if self.get(*job_group).is_none() {
                    return Err(ConfigError::UnknownJobGroup {
                        group: group.name.clone(),
                        job_group: *job_group,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn get(&self, id: GroupId) -> Option<&WorkerGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of state slots the scheme needs, excluding the application slot.
    pub fn total_max_workers(&self) -> u32 {
        self.groups.iter().map(|g| g.max_workers).sum()
    }

    fn next_id(&self) -> GroupId {
        let last = self.groups.last().map(|g| g.id.get()).unwrap_or(0);
        GroupId::new(last + 1)
    }
}

impl FromIterator<WorkerGroup> for GroupsScheme {
    /// Collects already-identified groups without validation.
    fn from_iter<I: IntoIterator<Item = WorkerGroup>>(iter: I) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[path = "scheme_tests.rs"]
mod tests;
