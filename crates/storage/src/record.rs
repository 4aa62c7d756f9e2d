// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed little-endian layout of one worker state slot.
//!
//! ```text
//! offset  size  field
//!      0     4  is_ready
//!      4     4  pid
//!      8     4  group_id
//!     12     4  restarts_count
//!     16     4  weight
//!     20     4  reserved
//!     24     8  first_started_at   (epoch ms)
//!     32     8  started_at
//!     40     8  finished_at
//!     48     8  updated_at
//!     56     8  memory_usage       (bytes)
//!     64     8  memory_peak_usage
//!     72    40  connections        (accepted, processing, processed, errors, rejected)
//!    112    40  jobs               (same order)
//! ```

use hp_core::GroupId;

pub const RECORD_SIZE: usize = 152;

/// Accepted/processing/processed/errors/rejected tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub accepted: u64,
    pub processing: u64,
    pub processed: u64,
    pub errors: u64,
    pub rejected: u64,
}

/// Detached copy of one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerState {
    pub is_ready: bool,
    pub pid: u32,
    pub group_id: GroupId,
    pub restarts_count: u32,
    pub weight: u32,
    pub first_started_at: u64,
    pub started_at: u64,
    pub finished_at: u64,
    pub updated_at: u64,
    pub memory_usage: u64,
    pub memory_peak_usage: u64,
    pub connections: Counters,
    pub jobs: Counters,
}

impl WorkerState {
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = Writer {
            buf: [0; RECORD_SIZE],
            pos: 0,
        };
        out.u32(u32::from(self.is_ready));
        out.u32(self.pid);
        out.u32(self.group_id.get());
        out.u32(self.restarts_count);
        out.u32(self.weight);
        out.u32(0);
        out.u64(self.first_started_at);
        out.u64(self.started_at);
        out.u64(self.finished_at);
        out.u64(self.updated_at);
        out.u64(self.memory_usage);
        out.u64(self.memory_peak_usage);
        out.counters(&self.connections);
        out.counters(&self.jobs);
        out.buf
    }

    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut r = Reader { buf, pos: 0 };
        let is_ready = r.u32() != 0;
        let pid = r.u32();
        let group_id = GroupId::new(r.u32());
        let restarts_count = r.u32();
        let weight = r.u32();
        let _reserved = r.u32();
        Self {
            is_ready,
            pid,
            group_id,
            restarts_count,
            weight,
            first_started_at: r.u64(),
            started_at: r.u64(),
            finished_at: r.u64(),
            updated_at: r.u64(),
            memory_usage: r.u64(),
            memory_peak_usage: r.u64(),
            connections: r.counters(),
            jobs: r.counters(),
        }
    }
}

struct Writer {
    buf: [u8; RECORD_SIZE],
    pos: usize,
}

impl Writer {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.put(&v.to_le_bytes());
    }

    fn counters(&mut self, c: &Counters) {
        for v in [c.accepted, c.processing, c.processed, c.errors, c.rejected] {
            self.u64(v);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8; RECORD_SIZE],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn counters(&mut self) -> Counters {
        Counters {
            accepted: self.u64(),
            processing: self.u64(),
            processed: self.u64(),
            errors: self.u64(),
            rejected: self.u64(),
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
