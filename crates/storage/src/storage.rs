// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker state storage: an array of fixed-size slots in a shared file.
//!
//! Slot 0 belongs to the application (the supervisor); slot `n` belongs to
//! worker `n`. Every slot has exactly one writing process, so there is no
//! locking: readers see whatever was last written.

use crate::record::{WorkerState, RECORD_SIZE};
use crate::region::{read_at, write_at};
use hp_core::{Clock, SystemClock, WorkerId};
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("worker {id} is out of range (1..={total})")]
    OutOfRange { id: WorkerId, total: u32 },
    #[error("storage is read-only")]
    ReadOnly,
    #[error("storage file {path} has invalid length {len}")]
    InvalidLength { path: PathBuf, len: u64 },
}

pub struct WorkerStorage {
    file: File,
    path: PathBuf,
    total_workers: u32,
    read_only: bool,
    /// Remove the backing file on drop.
    owned: bool,
}

impl WorkerStorage {
    /// Create (or truncate) the region for `total_workers` workers.
    ///
    /// The returned storage owns the file and removes it when dropped.
    pub fn create(path: &Path, total_workers: u32) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(Self::region_len(total_workers))?;

        debug!(path = %path.display(), total_workers, "created worker state storage");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            total_workers,
            read_only: false,
            owned: true,
        })
    }

    /// Attach to an existing region for writing one's own slot.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::attach(file, path, false)
    }

    /// Attach to an existing region for reading only.
    pub fn open_read_only(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::attach(file, path, true)
    }

    fn attach(file: File, path: &Path, read_only: bool) -> Result<Self, StorageError> {
        let len = file.metadata()?.len();
        let record = RECORD_SIZE as u64;
        if len < record || len % record != 0 {
            return Err(StorageError::InvalidLength {
                path: path.to_path_buf(),
                len,
            });
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            total_workers: (len / record - 1) as u32,
            read_only,
            owned: false,
        })
    }

    pub fn region_len(total_workers: u32) -> u64 {
        (u64::from(total_workers) + 1) * RECORD_SIZE as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_workers(&self) -> u32 {
        self.total_workers
    }

    /// Handle on a worker slot; fails outside `1..=total_workers`.
    pub fn get_worker_state(&self, id: WorkerId) -> Result<StateHandle<'_>, StorageError> {
        self.check_range(id)?;
        self.handle(id.slot())
    }

    /// Detached copy of a worker slot.
    pub fn review_worker_state(&self, id: WorkerId) -> Result<WorkerState, StorageError> {
        self.check_range(id)?;
        self.read_slot(id.slot())
    }

    /// Handle on slot 0.
    pub fn application_state(&self) -> Result<StateHandle<'_>, StorageError> {
        self.handle(0)
    }

    /// Read a worker slot, apply `f` and write it back.
    pub fn update_worker_state<F>(&self, id: WorkerId, f: F) -> Result<WorkerState, StorageError>
    where
        F: FnOnce(&mut WorkerState),
    {
        let mut handle = self.get_worker_state(id)?;
        f(&mut handle);
        handle.update()?;
        Ok(handle.state)
    }

    /// Iterate every worker slot, in id order.
    ///
    /// Each call starts a fresh pass; slots are read as the iterator advances.
    pub fn foreach_workers(&self) -> WorkerStates<'_> {
        WorkerStates {
            storage: self,
            next: 1,
        }
    }

    fn check_range(&self, id: WorkerId) -> Result<(), StorageError> {
        if id.get() == 0 || id.get() > self.total_workers {
            return Err(StorageError::OutOfRange {
                id,
                total: self.total_workers,
            });
        }
        Ok(())
    }

    fn handle(&self, slot: usize) -> Result<StateHandle<'_>, StorageError> {
        Ok(StateHandle {
            storage: self,
            slot,
            state: self.read_slot(slot)?,
        })
    }

    fn read_slot(&self, slot: usize) -> Result<WorkerState, StorageError> {
        let mut buf = [0; RECORD_SIZE];
        read_at(&self.file, &mut buf, (slot * RECORD_SIZE) as u64)?;
        Ok(WorkerState::decode(&buf))
    }

    fn write_slot(&self, slot: usize, state: &WorkerState) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        write_at(&self.file, &state.encode(), (slot * RECORD_SIZE) as u64)?;
        Ok(())
    }
}

impl Drop for WorkerStorage {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "failed to remove worker state storage"
                    );
                }
            }
        }
    }
}

/// A slot loaded into memory. Mutate the fields, then call [`StateHandle::update`].
pub struct StateHandle<'a> {
    storage: &'a WorkerStorage,
    slot: usize,
    state: WorkerState,
}

impl StateHandle<'_> {
    /// Reload the slot from the region, discarding local changes.
    pub fn read(&mut self) -> Result<(), StorageError> {
        self.state = self.storage.read_slot(self.slot)?;
        Ok(())
    }

    /// Stamp `updated_at` and write the slot back.
    pub fn update(&mut self) -> Result<(), StorageError> {
        self.update_with(&SystemClock)
    }

    pub fn update_with(&mut self, clock: &impl Clock) -> Result<(), StorageError> {
        if self.storage.read_only {
            return Err(StorageError::ReadOnly);
        }
        self.state.updated_at = self.state.updated_at.max(clock.epoch_ms());
        self.storage.write_slot(self.slot, &self.state)
    }

    pub fn snapshot(&self) -> WorkerState {
        self.state
    }
}

impl Deref for StateHandle<'_> {
    type Target = WorkerState;

    fn deref(&self) -> &WorkerState {
        &self.state
    }
}

impl DerefMut for StateHandle<'_> {
    fn deref_mut(&mut self) -> &mut WorkerState {
        &mut self.state
    }
}

/// Lazy pass over the worker slots.
pub struct WorkerStates<'a> {
    storage: &'a WorkerStorage,
    next: u32,
}

impl Iterator for WorkerStates<'_> {
    type Item = Result<(WorkerId, WorkerState), StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.storage.total_workers {
            return None;
        }
        let id = WorkerId::new(self.next);
        self.next += 1;
        Some(self.storage.read_slot(id.slot()).map(|state| (id, state)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.storage.total_workers + 1 - self.next) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
