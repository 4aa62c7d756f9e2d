// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::PoolConfig;
use serial_test::serial;

const VARS: [&str; 4] = [
    "HIVEPOOL_RUNTIME_DIR",
    "HIVEPOOL_SHUTDOWN_TIMEOUT_MS",
    "HIVEPOOL_LOG_FILE",
    BOOTSTRAP_TIMEOUT_VAR,
];

fn clear() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn unset_variables_leave_config_alone() {
    clear();
    assert_eq!(runtime_dir(), None);
    assert_eq!(shutdown_timeout(), None);
    assert_eq!(bootstrap_timeout(), Duration::from_secs(5));
    assert_eq!(PoolConfig::default().with_env_overrides(), PoolConfig::default());
}

#[test]
#[serial]
fn overrides_apply_to_config() {
    clear();
    std::env::set_var("HIVEPOOL_RUNTIME_DIR", "/tmp/hp-env");
    std::env::set_var("HIVEPOOL_SHUTDOWN_TIMEOUT_MS", "1500");
    std::env::set_var("HIVEPOOL_LOG_FILE", "/tmp/hp-env/pool.log");

    let config = PoolConfig::default().with_env_overrides();
    assert_eq!(config.runtime_dir, PathBuf::from("/tmp/hp-env"));
    assert_eq!(config.shutdown_timeout_ms, 1500);
    assert_eq!(config.log_file, Some(PathBuf::from("/tmp/hp-env/pool.log")));
    clear();
}

#[test]
#[serial]
fn malformed_and_empty_values_are_ignored() {
    clear();
    std::env::set_var("HIVEPOOL_SHUTDOWN_TIMEOUT_MS", "soon");
    std::env::set_var("HIVEPOOL_RUNTIME_DIR", "");
    std::env::set_var(BOOTSTRAP_TIMEOUT_VAR, "-1");

    assert_eq!(shutdown_timeout(), None);
    assert_eq!(runtime_dir(), None);
    assert_eq!(bootstrap_timeout(), Duration::from_secs(5));
    clear();
}
