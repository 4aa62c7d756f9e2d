// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn request(payload: &[u8]) -> JobRequest {
    JobRequest {
        job_id: JobId::new(0x0102_0304_0506_0708),
        from_worker_id: WorkerId::new(3),
        worker_group_id: GroupId::new(2),
        priority: -5,
        payload: payload.to_vec(),
    }
}

#[test]
fn request_layout_is_little_endian() {
    let body = encode_request(&request(b"Test"));
    assert_eq!(&body[0..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
    assert_eq!(&body[8..12], &[3, 0, 0, 0]);
    assert_eq!(&body[12..16], &[2, 0, 0, 0]);
    assert_eq!(&body[16..20], &(-5i32).to_le_bytes());
    assert_eq!(&body[20..], b"Test");
}

#[yare::parameterized(
    empty_payload = { b"" },
    text_payload  = { b"Test" },
    binary        = { &[0, 255, 0, 1] },
)]
fn request_decodes_back(payload: &[u8]) {
    let original = request(payload);
    assert_eq!(decode_request(&encode_request(&original)).unwrap(), original);
}

#[test]
fn response_layout() {
    let response = JobResponse {
        job_id: JobId::new(7),
        payload: b"OK: Test".to_vec(),
    };
    let body = encode_response(&response);
    assert_eq!(&body[0..8], &7u64.to_le_bytes());
    assert_eq!(decode_response(&body).unwrap(), response);
}

#[test]
fn short_bodies_are_malformed() {
    assert!(matches!(
        decode_request(&[0; REQUEST_HEADER_LEN - 1]),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(
        decode_response(&[0; 3]),
        Err(ProtocolError::Malformed(_))
    ));
}

#[test]
fn close_handshake_cannot_be_a_request() {
    assert!(CLOSE_HANDSHAKE.len() < REQUEST_HEADER_LEN);
    assert_ne!(CLOSE_HANDSHAKE, HANDSHAKE);
}
