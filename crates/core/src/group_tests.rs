// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain        = { "hello",           "Hello" },
    rust_path    = { "demo::echo",      "Echo" },
    slash_path   = { "workers/reactor", "Reactor" },
    already_caps = { "Counter",         "Counter" },
)]
fn default_name_from_entry_point(entry_point: &str, expected: &str) {
    let group = WorkerGroup::new(entry_point, WorkerType::Service);
    assert_eq!(group.default_name(), expected);
}

#[test]
fn default_name_falls_back_to_group_id() {
    let mut group = WorkerGroup::new("demo::", WorkerType::Job);
    group.id = GroupId::new(4);
    assert_eq!(group.default_name(), "Group4");
}

#[test]
fn builder_sets_fields() {
    let group = WorkerGroup::new("echo", WorkerType::Job)
        .min_workers(1)
        .max_workers(4)
        .name("Echo")
        .job_groups([GroupId::new(2)])
        .pickup(PickupKind::Random)
        .restart(RestartKind::Limited { max_restarts: 2 })
        .scaling(ScalingKind::Disabled);

    assert_eq!(group.min_workers, 1);
    assert_eq!(group.max_workers, 4);
    assert_eq!(group.name, "Echo");
    assert_eq!(group.job_groups, vec![GroupId::new(2)]);
    assert_eq!(group.pickup, PickupKind::Random);
    assert_eq!(group.restart, RestartKind::Limited { max_restarts: 2 });
    assert_eq!(group.scaling, ScalingKind::Disabled);
    assert!(!group.id.is_assigned());
}

#[test]
fn group_deserializes_from_toml_style_json_with_defaults() {
    let group: WorkerGroup = serde_json::from_value(serde_json::json!({
        "entry_point": "hello",
        "worker_type": "service",
        "min_workers": 2,
        "restart": { "kind": "never" },
    }))
    .unwrap();

    assert_eq!(group.worker_type, WorkerType::Service);
    assert_eq!(group.min_workers, 2);
    assert_eq!(group.max_workers, 0);
    assert_eq!(group.restart, RestartKind::Never);
    assert_eq!(group.pickup, PickupKind::LeastJobs);
    assert_eq!(group.job_client, JobClientConfig::default());
}

#[test]
fn job_client_defaults() {
    let config = JobClientConfig::default();
    assert_eq!(config.max_try_count, 3);
    assert_eq!(config.result_timeout(), Duration::from_secs(600));
    assert_eq!(config.retry_interval(), Duration::from_secs(1));
}
