// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::BTreeMap;

#[test]
fn display_prints_inner_value() {
    assert_eq!(WorkerId::new(7).to_string(), "7");
    assert_eq!(GroupId::from(3).to_string(), "3");
}

#[test]
fn zero_is_unassigned() {
    assert!(!GroupId::default().is_assigned());
    assert!(GroupId::new(1).is_assigned());
}

#[test]
fn fire_and_forget_job_expects_no_response() {
    assert!(!JobId::FIRE_AND_FORGET.expects_response());
    assert!(JobId::new(42).expects_response());
}

#[test]
fn ids_serialize_as_plain_numbers() {
    let json = serde_json::to_string(&WorkerId::new(5)).unwrap();
    assert_eq!(json, "5");

    let map: BTreeMap<GroupId, String> = BTreeMap::from([(GroupId::new(2), "b".to_string())]);
    let json = serde_json::to_string(&map).unwrap();
    assert_eq!(json, r#"{"2":"b"}"#);
    let back: BTreeMap<GroupId, String> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, map);
}

#[test]
fn ids_order_numerically() {
    let mut ids = vec![WorkerId::new(10), WorkerId::new(2), WorkerId::new(5)];
    ids.sort();
    assert_eq!(ids, vec![WorkerId::new(2), WorkerId::new(5), WorkerId::new(10)]);
}
