// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
#[test]
fn sampler_reads_this_process() {
    let mut sampler = MemorySampler::new();
    assert!(sampler.sample() > 0);
    assert!(sampler.sample() > 0);
}

#[test]
fn peak_tracks_the_largest_sample() {
    let mut state = WorkerState::default();
    record(&mut state, 4096);
    record(&mut state, 1024);
    assert_eq!(state.memory_usage, 1024);
    assert_eq!(state.memory_peak_usage, 4096);
    record(&mut state, 8192);
    assert_eq!(state.memory_peak_usage, 8192);
}
