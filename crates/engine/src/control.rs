// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control channel pumps.
//!
//! Both ends of the supervisor/worker channel read and write through
//! dedicated tasks, so a select over incoming messages never drops a
//! half-read frame.

use hp_ipc::{wire, ProtocolError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Decode frames from `reader` until it closes.
///
/// A clean EOF closes the receiver; any other failure is forwarded once
/// before closing it.
pub fn spawn_reader<M, R>(mut reader: R) -> mpsc::UnboundedReceiver<Result<M, ProtocolError>>
where
    M: DeserializeOwned + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match wire::read_json::<M, _>(&mut reader).await {
                Ok(msg) => {
                    if tx.send(Ok(msg)).is_err() {
                        break;
                    }
                }
                Err(ProtocolError::ConnectionClosed) => break,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

/// Encode messages onto `writer`, in order.
///
/// Stops when every sender is dropped, or when `close` fires after the
/// messages already queued are written.
pub fn spawn_writer<M, W>(
    mut writer: W,
    close: CancellationToken,
) -> (mpsc::UnboundedSender<M>, JoinHandle<Result<(), ProtocolError>>)
where
    M: Serialize + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<M>();
    let task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                msg = rx.recv() => msg,
                _ = close.cancelled() => rx.try_recv().ok(),
            };
            let Some(msg) = msg else {
                return Ok(());
            };
            // Encoded up front: the frame write must not borrow `msg`.
            let body = match serde_json::to_vec(&msg) {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "control message encoding failed");
                    return Err(e.into());
                }
            };
            if let Err(e) = wire::write_frame(&mut writer, &body).await {
                debug!(error = %e, "control channel write failed");
                return Err(e);
            }
        }
    });
    (tx, task)
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
