// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hp_core::WorkerType;
use hp_ipc::wire;
use tokio::io::AsyncReadExt;

fn group() -> WorkerGroup {
    WorkerGroup::new("echo", WorkerType::Service).name("Echo")
}

#[cfg(unix)]
#[tokio::test]
async fn spawned_process_speaks_on_its_pipes() {
    let runner = DefaultRunner::new("cat", Vec::new());
    let mut process = runner.spawn(WorkerId::new(1), &group()).await.unwrap();
    assert!(process.pid > 0);

    wire::write_frame(&mut process.stdin, b"ping").await.unwrap();
    let echoed = wire::read_frame(&mut process.stdout).await.unwrap();
    assert_eq!(echoed, b"ping");

    drop(process.stdin);
    let status = process.child.wait().await.unwrap();
    assert!(status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn worker_environment_is_set() {
    let runner = DefaultRunner::new(
        "sh",
        vec![
            "-c".into(),
            "printf '%s %s %s' \"$HIVEPOOL_WORKER\" \"$HIVEPOOL_WORKER_ID\" \"$EXTRA\"".into(),
        ],
    )
    .env("EXTRA", "yes");
    let process = runner.spawn(WorkerId::new(7), &group()).await.unwrap();
    let WorkerProcess {
        child, mut stdout, ..
    } = process;
    let mut out = String::new();
    stdout.read_to_string(&mut out).await.unwrap();
    let _ = child.wait_with_output().await;
    assert_eq!(out, "1 7 yes");
}

#[tokio::test]
async fn missing_program_fails_to_spawn() {
    let runner = DefaultRunner::new("/nonexistent/hivepool-worker", Vec::new());
    let err = runner.spawn(WorkerId::new(1), &group()).await.unwrap_err();
    assert!(matches!(err, RunnerError::Io(_)));
}

#[test]
fn from_config_prefers_configured_program() {
    let config = PoolConfig {
        worker_program: Some("/usr/bin/worker".into()),
        worker_args: vec!["worker".into()],
        ..PoolConfig::default()
    };
    let runner = DefaultRunner::from_config(&config);
    assert_eq!(runner.program(), &PathBuf::from("/usr/bin/worker"));
    assert_eq!(runner.args, vec!["worker".to_string()]);
    assert!(runner
        .envs
        .iter()
        .any(|(k, v)| k == BOOTSTRAP_TIMEOUT_VAR && v == "5000"));
    assert!(!runner.envs.iter().any(|(k, _)| k == LOG_FILE_VAR));
}

#[test]
fn from_config_passes_log_file_to_workers() {
    let config = PoolConfig {
        log_file: Some("/var/log/hivepool.log".into()),
        ..PoolConfig::default()
    };
    let runner = DefaultRunner::from_config(&config);
    assert!(runner
        .envs
        .iter()
        .any(|(k, v)| k == LOG_FILE_VAR && v == "/var/log/hivepool.log"));
}
