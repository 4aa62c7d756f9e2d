// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

#[test]
fn fields_land_at_fixed_offsets() {
    let state = WorkerState {
        is_ready: true,
        pid: 4242,
        group_id: GroupId::new(3),
        restarts_count: 7,
        weight: 100,
        first_started_at: 11,
        started_at: 22,
        finished_at: 33,
        updated_at: 44,
        memory_usage: 55,
        memory_peak_usage: 66,
        connections: Counters {
            accepted: 1,
            processing: 2,
            processed: 3,
            errors: 4,
            rejected: 5,
        },
        jobs: Counters {
            accepted: 6,
            processing: 7,
            processed: 8,
            errors: 9,
            rejected: 10,
        },
    };
    let buf = state.encode();

    assert_eq!(le_u32(&buf, 0), 1);
    assert_eq!(le_u32(&buf, 4), 4242);
    assert_eq!(le_u32(&buf, 8), 3);
    assert_eq!(le_u32(&buf, 12), 7);
    assert_eq!(le_u32(&buf, 16), 100);
    assert_eq!(le_u32(&buf, 20), 0);
    assert_eq!(le_u64(&buf, 24), 11);
    assert_eq!(le_u64(&buf, 48), 44);
    assert_eq!(le_u64(&buf, 64), 66);
    assert_eq!(le_u64(&buf, 72), 1);
    assert_eq!(le_u64(&buf, 104), 5);
    assert_eq!(le_u64(&buf, 112), 6);
    assert_eq!(le_u64(&buf, 144), 10);
}

#[test]
fn zeroed_slot_decodes_to_default() {
    assert_eq!(WorkerState::decode(&[0; RECORD_SIZE]), WorkerState::default());
}

#[test]
fn any_nonzero_ready_word_reads_as_ready() {
    let mut buf = [0; RECORD_SIZE];
    buf[0] = 7;
    assert!(WorkerState::decode(&buf).is_ready);
}

fn counters() -> impl Strategy<Value = Counters> {
    any::<[u64; 5]>().prop_map(|[accepted, processing, processed, errors, rejected]| Counters {
        accepted,
        processing,
        processed,
        errors,
        rejected,
    })
}

prop_compose! {
    fn worker_state()(
        is_ready in any::<bool>(),
        head in any::<[u32; 4]>(),
        times in any::<[u64; 6]>(),
        connections in counters(),
        jobs in counters(),
    ) -> WorkerState {
        WorkerState {
            is_ready,
            pid: head[0],
            group_id: GroupId::new(head[1]),
            restarts_count: head[2],
            weight: head[3],
            first_started_at: times[0],
            started_at: times[1],
            finished_at: times[2],
            updated_at: times[3],
            memory_usage: times[4],
            memory_peak_usage: times[5],
            connections,
            jobs,
        }
    }
}

proptest! {
    #[test]
    fn layout_preserves_every_field(state in worker_state()) {
        prop_assert_eq!(WorkerState::decode(&state.encode()), state);
    }
}
