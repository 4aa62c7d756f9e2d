// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary job records carried inside frames.
//!
//! Request: `job_id u64 | from_worker_id u32 | worker_group_id u32 | priority i32 | payload`
//! Response: `job_id u64 | payload`
//!
//! All integers are little-endian.

use crate::wire::ProtocolError;
use hp_core::{GroupId, JobId, JobRequest, JobResponse, WorkerId};

/// Written raw by the client right after connecting.
pub const HANDSHAKE: &[u8] = b"HIVEPOOL JOB IPC";

/// Sent as a frame before an orderly close. Shorter than any request.
pub const CLOSE_HANDSHAKE: &[u8] = b"HIVEPOOL CLOSE";

pub const REQUEST_HEADER_LEN: usize = 20;
pub const RESPONSE_HEADER_LEN: usize = 8;

pub fn encode_request(request: &JobRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + request.payload.len());
    out.extend_from_slice(&request.job_id.get().to_le_bytes());
    out.extend_from_slice(&request.from_worker_id.get().to_le_bytes());
    out.extend_from_slice(&request.worker_group_id.get().to_le_bytes());
    out.extend_from_slice(&request.priority.to_le_bytes());
    out.extend_from_slice(&request.payload);
    out
}

pub fn decode_request(body: &[u8]) -> Result<JobRequest, ProtocolError> {
    if body.len() < REQUEST_HEADER_LEN {
        return Err(ProtocolError::Malformed(format!(
            "request of {} bytes is shorter than its header",
            body.len()
        )));
    }
    let (header, payload) = body.split_at(REQUEST_HEADER_LEN);
    Ok(JobRequest {
        job_id: JobId::new(u64::from_le_bytes(field(header, 0)?)),
        from_worker_id: WorkerId::new(u32::from_le_bytes(field(header, 8)?)),
        worker_group_id: GroupId::new(u32::from_le_bytes(field(header, 12)?)),
        priority: i32::from_le_bytes(field(header, 16)?),
        payload: payload.to_vec(),
    })
}

pub fn encode_response(response: &JobResponse) -> Vec<u8> {
    let mut out = Vec::with_capacity(RESPONSE_HEADER_LEN + response.payload.len());
    out.extend_from_slice(&response.job_id.get().to_le_bytes());
    out.extend_from_slice(&response.payload);
    out
}

pub fn decode_response(body: &[u8]) -> Result<JobResponse, ProtocolError> {
    if body.len() < RESPONSE_HEADER_LEN {
        return Err(ProtocolError::Malformed(format!(
            "response of {} bytes is shorter than its header",
            body.len()
        )));
    }
    let (header, payload) = body.split_at(RESPONSE_HEADER_LEN);
    Ok(JobResponse {
        job_id: JobId::new(u64::from_le_bytes(field(header, 0)?)),
        payload: payload.to_vec(),
    })
}

fn field<const N: usize>(header: &[u8], at: usize) -> Result<[u8; N], ProtocolError> {
    header
        .get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ProtocolError::Malformed(format!("missing field at offset {at}")))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
