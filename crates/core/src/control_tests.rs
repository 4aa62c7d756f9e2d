// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::group::{WorkerGroup, WorkerType};

#[test]
fn bootstrap_is_flat_tagged_json() {
    let mut scheme = GroupsScheme::new();
    scheme
        .describe(WorkerGroup::new("hello", WorkerType::Service).min_workers(1))
        .unwrap();

    let message = ToWorker::Bootstrap(Box::new(Bootstrap {
        id: WorkerId::new(1),
        group: GroupId::new(1),
        groups_scheme: scheme,
        storage_path: "/tmp/hp/workers.state".into(),
        runtime_dir: "/tmp/hp".into(),
        context: BTreeMap::from([("env".to_string(), "test".to_string())]),
    }));

    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["type"], "bootstrap");
    assert_eq!(json["id"], 1);
    assert_eq!(json["groups_scheme"][0]["entry_point"], "hello");

    let back: ToWorker = serde_json::from_value(json).unwrap();
    assert_eq!(back, message);
}

#[test]
fn bootstrap_missing_key_is_rejected() {
    let json = serde_json::json!({
        "type": "bootstrap",
        "id": 1,
        "group": 1,
        "groups_scheme": [],
        "runtime_dir": "/tmp/hp",
        "context": {},
    });
    assert!(serde_json::from_value::<ToWorker>(json).is_err());
}

#[test]
fn bootstrap_mistyped_key_is_rejected() {
    let json = serde_json::json!({
        "type": "bootstrap",
        "id": "one",
        "group": 1,
        "groups_scheme": [],
        "storage_path": "/tmp/hp/workers.state",
        "runtime_dir": "/tmp/hp",
        "context": {},
    });
    assert!(serde_json::from_value::<ToWorker>(json).is_err());
}

#[yare::parameterized(
    started  = { FromWorker::Started { pid: 42 } },
    pong     = { FromWorker::Pong },
    scale    = { FromWorker::ScaleRequest { group_id: GroupId::new(2), delta: 1 } },
    exiting  = { FromWorker::Exiting { outcome: ExitOutcome::Fatal("boom".into()) } },
)]
fn worker_messages_parse_back(message: FromWorker) {
    let text = serde_json::to_string(&message).unwrap();
    assert_eq!(serde_json::from_str::<FromWorker>(&text).unwrap(), message);
}
