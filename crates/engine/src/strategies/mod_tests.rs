// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hp_core::{ExitCause, WorkerId};

struct Sink;

impl ScaleRequester for Sink {
    fn request(&self, _group_id: GroupId, _delta: i32) -> bool {
        true
    }
}

#[test]
fn restart_kinds_map_to_strategies() {
    let cause = ExitCause::Clean;
    assert!(restart_for(RestartKind::Always).should_restart(WorkerId::new(1), &cause));
    assert!(!restart_for(RestartKind::Never).should_restart(WorkerId::new(1), &cause));

    let limited = restart_for(RestartKind::Limited { max_restarts: 1 });
    assert!(limited.should_restart(WorkerId::new(1), &cause));
    assert!(!limited.should_restart(WorkerId::new(1), &cause));
}

#[test]
fn disabled_scaling_builds_nothing() {
    assert!(scaling_for(ScalingKind::Disabled, GroupId::new(1), Arc::new(Sink)).is_none());

    let simple = scaling_for(ScalingKind::default(), GroupId::new(1), Arc::new(Sink)).unwrap();
    assert!(simple.request_scaling(WorkerId::new(1)));
    assert!(!simple.request_scaling(WorkerId::new(1)));
}

#[test]
fn pickup_kinds_read_the_storage() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(WorkerStorage::create(&dir.path().join("s"), 1).unwrap());
    storage
        .update_worker_state(WorkerId::new(1), |s| {
            s.is_ready = true;
            s.group_id = GroupId::new(1);
        })
        .unwrap();
    let request = hp_core::PickupRequest {
        allowed_groups: &[GroupId::new(1)],
        ..Default::default()
    };
    for kind in [PickupKind::LeastJobs, PickupKind::Random] {
        let pickup = pickup_for(kind, Arc::clone(&storage));
        assert_eq!(pickup.pickup(&request), Some(WorkerId::new(1)));
    }
}
