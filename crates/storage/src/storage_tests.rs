// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::record::Counters;
use hp_core::{FakeClock, GroupId};
use tempfile::TempDir;

fn create(total: u32) -> (TempDir, WorkerStorage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkerStorage::create(&dir.path().join("workers.state"), total).unwrap();
    (dir, storage)
}

#[test]
fn create_sizes_region_with_application_slot() {
    let (_dir, storage) = create(4);
    let len = std::fs::metadata(storage.path()).unwrap().len();
    assert_eq!(len, 5 * RECORD_SIZE as u64);
    assert_eq!(storage.total_workers(), 4);
}

#[yare::parameterized(
    zero       = { 0 },
    past_end   = { 4 },
    far_away   = { 1000 },
)]
fn get_worker_state_rejects_out_of_range(id: u32) {
    let (_dir, storage) = create(3);
    let err = storage.get_worker_state(WorkerId::new(id)).err().unwrap();
    assert!(matches!(err, StorageError::OutOfRange { total: 3, .. }));
}

#[test]
fn full_record_round_trips_through_independent_read_only_open() {
    let (_dir, storage) = create(2);
    let id = WorkerId::new(2);

    let mut handle = storage.get_worker_state(id).unwrap();
    handle.is_ready = true;
    handle.pid = 777;
    handle.group_id = GroupId::new(1);
    handle.restarts_count = 2;
    handle.weight = 10;
    handle.first_started_at = 1;
    handle.started_at = 2;
    handle.finished_at = 3;
    handle.memory_usage = 4096;
    handle.memory_peak_usage = 8192;
    handle.connections = Counters {
        accepted: 1,
        processing: 2,
        processed: 3,
        errors: 4,
        rejected: 5,
    };
    handle.jobs = Counters {
        accepted: 9,
        processing: 8,
        processed: 7,
        errors: 6,
        rejected: 5,
    };
    handle.update().unwrap();
    let written = handle.snapshot();

    let reader = WorkerStorage::open_read_only(storage.path()).unwrap();
    assert_eq!(reader.total_workers(), 2);
    assert_eq!(reader.review_worker_state(id).unwrap(), written);
    assert!(written.updated_at > 0);
}

#[test]
fn read_only_update_fails() {
    let (_dir, storage) = create(1);
    let reader = WorkerStorage::open_read_only(storage.path()).unwrap();

    let mut handle = reader.get_worker_state(WorkerId::new(1)).unwrap();
    handle.pid = 1;
    assert!(matches!(handle.update(), Err(StorageError::ReadOnly)));
    assert!(matches!(
        reader.application_state().unwrap().update(),
        Err(StorageError::ReadOnly)
    ));
}

#[test]
fn updated_at_never_moves_backwards() {
    let (_dir, storage) = create(1);
    let clock = FakeClock::new();

    let mut handle = storage.get_worker_state(WorkerId::new(1)).unwrap();
    handle.update_with(&clock).unwrap();
    let first = handle.updated_at;

    clock.set_epoch_ms(first - 10_000);
    handle.update_with(&clock).unwrap();
    assert_eq!(handle.updated_at, first);

    clock.set_epoch_ms(first + 5);
    handle.update_with(&clock).unwrap();
    assert_eq!(handle.updated_at, first + 5);
}

#[test]
fn review_is_detached() {
    let (_dir, storage) = create(1);
    let id = WorkerId::new(1);
    let before = storage.review_worker_state(id).unwrap();

    storage.update_worker_state(id, |s| s.pid = 12).unwrap();

    assert_eq!(before.pid, 0);
    assert_eq!(storage.review_worker_state(id).unwrap().pid, 12);
}

#[test]
fn handle_read_discards_local_changes() {
    let (_dir, storage) = create(1);
    let mut handle = storage.get_worker_state(WorkerId::new(1)).unwrap();
    handle.pid = 99;
    handle.read().unwrap();
    assert_eq!(handle.pid, 0);
}

#[test]
fn application_slot_is_separate_from_workers() {
    let (_dir, storage) = create(2);
    let mut app = storage.application_state().unwrap();
    app.pid = 1;
    app.restarts_count = 3;
    app.update().unwrap();

    for entry in storage.foreach_workers() {
        let (_, state) = entry.unwrap();
        assert_eq!(state.pid, 0);
    }
    assert_eq!(storage.application_state().unwrap().restarts_count, 3);
}

#[test]
fn foreach_workers_is_finite_and_restartable() {
    let (_dir, storage) = create(3);
    storage.update_worker_state(WorkerId::new(2), |s| s.is_ready = true).unwrap();

    let first: Vec<_> = storage.foreach_workers().map(|e| e.unwrap()).collect();
    let second: Vec<_> = storage.foreach_workers().map(|e| e.unwrap()).collect();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    let ids: Vec<u32> = first.iter().map(|(id, _)| id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(first[1].1.is_ready);
    assert_eq!(storage.foreach_workers().size_hint(), (3, Some(3)));
}

#[test]
fn writer_changes_are_visible_to_other_handles() {
    let (_dir, storage) = create(1);
    let writer = WorkerStorage::open(storage.path()).unwrap();
    writer
        .update_worker_state(WorkerId::new(1), |s| s.jobs.processed = 5)
        .unwrap();
    assert_eq!(
        storage.review_worker_state(WorkerId::new(1)).unwrap().jobs.processed,
        5
    );
}

#[test]
fn open_rejects_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.state");
    std::fs::write(&path, [0u8; RECORD_SIZE + 3]).unwrap();

    assert!(matches!(
        WorkerStorage::open_read_only(&path),
        Err(StorageError::InvalidLength { .. })
    ));
}

#[test]
fn dropping_the_creator_removes_the_file() {
    let (_dir, storage) = create(1);
    let path = storage.path().to_path_buf();
    let attached = WorkerStorage::open_read_only(&path).unwrap();

    drop(attached);
    assert!(path.exists());
    drop(storage);
    assert!(!path.exists());
}
