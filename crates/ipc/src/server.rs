// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job IPC server.
//!
//! Accepts connections on the worker's address, checks the handshake, then
//! decodes requests onto a bounded local queue. The connection reader
//! suspends while the queue is full, which pushes back on the producer.

use crate::address::{BoxStream, JobAddress, JobListener, SocketFactory};
use crate::codec::{self, CLOSE_HANDSHAKE, HANDSHAKE};
use crate::wire::{self, ProtocolError};
use hp_core::{JobRequest, JobResponse, JobServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Connection-level notifications, used to keep state counters current.
pub trait ConnectionObserver: Send + Sync {
    fn accepted(&self) {}
    fn closed(&self, _failed: bool) {}
    /// The peer did not complete the handshake.
    fn rejected(&self) {}
}

struct NoopObserver;

impl ConnectionObserver for NoopObserver {}

/// A request taken off the queue, with the channel to answer on.
#[derive(Debug)]
pub struct IncomingJob {
    pub request: JobRequest,
    responder: mpsc::UnboundedSender<JobResponse>,
}

impl IncomingJob {
    /// Send the response back on the originating channel.
    ///
    /// Fire-and-forget jobs are answered by doing nothing.
    pub fn respond(self, payload: Vec<u8>) -> Result<(), ProtocolError> {
        if !self.request.expects_response() {
            return Ok(());
        }
        self.responder
            .send(JobResponse {
                job_id: self.request.job_id,
                payload,
            })
            .map_err(|_| ProtocolError::ConnectionClosed)
    }
}

/// Receiving side of the local job queue.
pub struct JobQueue {
    rx: mpsc::Receiver<IncomingJob>,
}

impl JobQueue {
    pub async fn recv(&mut self) -> Option<IncomingJob> {
        self.rx.recv().await
    }
}

pub struct JobServer {
    listener: JobListener,
    address: JobAddress,
    config: JobServerConfig,
    queue: mpsc::Sender<IncomingJob>,
    observer: Arc<dyn ConnectionObserver>,
}

impl JobServer {
    pub async fn bind(
        factory: &dyn SocketFactory,
        address: JobAddress,
        config: JobServerConfig,
    ) -> Result<(Self, JobQueue), ProtocolError> {
        let listener = factory.bind(&address).await?;
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        debug!(%address, "job server listening");
        Ok((
            Self {
                listener,
                address,
                config,
                queue: tx,
                observer: Arc::new(NoopObserver),
            },
            JobQueue { rx },
        ))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn address(&self) -> &JobAddress {
        &self.address
    }

    /// Accept connections until `cancel` fires, then wait for open
    /// connections to unwind.
    pub async fn receive_loop(self, cancel: CancellationToken) {
        let tracker = TaskTracker::new();
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok(stream) => {
                    let queue = self.queue.clone();
                    let observer = Arc::clone(&self.observer);
                    let cancel = cancel.child_token();
                    let handshake_timeout = self.config.handshake_timeout();
                    tracker.spawn(async move {
                        serve_connection(stream, queue, observer, cancel, handshake_timeout).await
                    });
                }
                Err(e) => {
                    warn!(address = %self.address, error = %e, "job accept error");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
        tracker.close();
        tracker.wait().await;
        debug!(address = %self.address, "job server stopped");
    }
}

async fn serve_connection(
    stream: BoxStream,
    queue: mpsc::Sender<IncomingJob>,
    observer: Arc<dyn ConnectionObserver>,
    cancel: CancellationToken,
    handshake_timeout: Duration,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    if let Err(e) = read_handshake(&mut reader, handshake_timeout).await {
        debug!(error = %e, "rejecting job connection");
        observer.rejected();
        return;
    }
    observer.accepted();

    let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<JobResponse>();
    let writer_cancel = cancel.clone();
    let writer_task = tokio::spawn(async move {
        loop {
            let response = tokio::select! {
                _ = writer_cancel.cancelled() => break,
                response = resp_rx.recv() => match response {
                    Some(response) => response,
                    None => break,
                },
            };
            if let Err(e) = wire::write_frame(&mut writer, &codec::encode_response(&response)).await
            {
                debug!(job_id = %response.job_id, error = %e, "failed to write job response");
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let result = read_requests(&mut reader, &queue, &resp_tx, &cancel).await;
    drop(resp_tx);
    let failed = match &result {
        Ok(()) | Err(ProtocolError::ConnectionClosed) => false,
        Err(e) => {
            warn!(error = %e, "job connection failed");
            true
        }
    };
    // Responses already queued for this channel are still delivered.
    let _ = writer_task.await;
    observer.closed(failed);
}

async fn read_handshake<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let mut buf = [0u8; HANDSHAKE.len()];
    tokio::time::timeout(timeout, reader.read_exact(&mut buf))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    if buf != HANDSHAKE {
        return Err(ProtocolError::Handshake);
    }
    Ok(())
}

async fn read_requests<R: AsyncRead + Unpin>(
    reader: &mut R,
    queue: &mpsc::Sender<IncomingJob>,
    responder: &mpsc::UnboundedSender<JobResponse>,
    cancel: &CancellationToken,
) -> Result<(), ProtocolError> {
    loop {
        let body = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            body = wire::read_frame(reader) => body?,
        };
        if body == CLOSE_HANDSHAKE {
            debug!("job channel closed by peer");
            return Ok(());
        }
        let request = codec::decode_request(&body)?;
        let job = IncomingJob {
            request,
            responder: responder.clone(),
        };
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sent = queue.send(job) => {
                if sent.is_err() {
                    // Nobody consumes jobs any more.
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
