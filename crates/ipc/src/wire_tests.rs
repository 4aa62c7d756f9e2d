// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hp_core::FromWorker;

#[tokio::test]
async fn frame_has_big_endian_length_prefix() {
    let mut buf = Vec::new();
    write_frame(&mut buf, b"abc").await.unwrap();
    assert_eq!(buf, vec![0, 0, 0, 3, b'a', b'b', b'c']);

    let mut reader = buf.as_slice();
    assert_eq!(read_frame(&mut reader).await.unwrap(), b"abc");
}

#[tokio::test]
async fn empty_stream_is_connection_closed() {
    let mut reader: &[u8] = &[];
    assert!(matches!(
        read_frame(&mut reader).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn truncated_body_is_connection_closed() {
    let mut reader: &[u8] = &[0, 0, 0, 10, 1, 2];
    assert!(matches!(
        read_frame(&mut reader).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn oversized_prefix_is_rejected() {
    let mut reader: &[u8] = &[0xff, 0xff, 0xff, 0xff];
    assert!(matches!(
        read_frame(&mut reader).await,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}

#[tokio::test]
async fn json_frames_follow_each_other() {
    let mut buf = Vec::new();
    write_json(&mut buf, &FromWorker::Started { pid: 9 }).await.unwrap();
    write_json(&mut buf, &FromWorker::Pong).await.unwrap();

    let mut reader = buf.as_slice();
    let first: FromWorker = read_json(&mut reader).await.unwrap();
    let second: FromWorker = read_json(&mut reader).await.unwrap();
    assert_eq!(first, FromWorker::Started { pid: 9 });
    assert_eq!(second, FromWorker::Pong);
}

#[tokio::test]
async fn read_times_out_on_silent_peer() {
    let (_keep, mut reader) = tokio::io::duplex(64);
    let result = read_frame_timeout(&mut reader, Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
