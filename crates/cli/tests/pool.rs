// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests: the `hivepool` binary supervising copies of itself.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serial_test::serial;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DEADLINE: Duration = Duration::from_secs(20);

struct Scenario {
    dir: TempDir,
}

impl Scenario {
    /// A pool definition with the given `[[groups]]` tables, a private
    /// runtime dir, and `output_dir` pointing at the scenario dir.
    fn new(groups: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            r#"
[pool]
runtime_dir = "{runtime}"
shutdown_timeout_ms = 2000
restart_delay_ms = 20

[pool.context]
output_dir = "{output}"

{groups}
"#,
            runtime = dir.path().join("run").display(),
            output = dir.path().display(),
        );
        std::fs::write(dir.path().join("pool.toml"), config).unwrap();
        Self { dir }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_hivepool"));
        cmd.env_remove("HIVEPOOL_RUNTIME_DIR")
            .env_remove("HIVEPOOL_LOG_FILE")
            .env_remove("HIVEPOOL_SHUTDOWN_TIMEOUT_MS")
            .env_remove("HIVEPOOL_WORKER")
            .env("RUST_LOG", "info");
        cmd
    }

    fn run(&self) -> Output {
        let child = self
            .command()
            .arg("run")
            .arg("--config")
            .arg(self.dir.path().join("pool.toml"))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        wait_output(child)
    }

    fn spawn(&self) -> Child {
        self.command()
            .arg("run")
            .arg("--config")
            .arg(self.dir.path().join("pool.toml"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    fn status(&self, json: bool) -> Output {
        let mut cmd = self.command();
        cmd.arg("status")
            .arg("--runtime-dir")
            .arg(self.dir.path().join("run"));
        if json {
            cmd.args(["-o", "json"]);
        }
        cmd.output().unwrap()
    }

    fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn wait_output(child: Child) -> Output {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });
    rx.recv_timeout(DEADLINE)
        .expect("hivepool did not exit in time")
        .unwrap()
}

fn wait_exit(child: &mut Child) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if start.elapsed() > DEADLINE {
            let _ = child.kill();
            panic!("hivepool did not exit within {:?}", DEADLINE);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn wait_for_file(path: &Path) -> String {
    let start = Instant::now();
    loop {
        if let Ok(text) = std::fs::read_to_string(path) {
            if !text.is_empty() {
                return text;
            }
        }
        if start.elapsed() > DEADLINE {
            panic!("{} never appeared", path.display());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn signal(child: &Child, name: &str) {
    let status = Command::new("kill")
        .arg(format!("-{}", name))
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
#[serial]
fn workers_run_to_completion() {
    let scenario = Scenario::new(
        r#"
[[groups]]
entry_point = "hello"
worker_type = "service"
min_workers = 2
restart = { kind = "never" }
"#,
    );

    let output = scenario.run();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        std::fs::read_to_string(scenario.output("hello-1")).unwrap(),
        "Hello from worker 1 of Hello\n"
    );
    assert_eq!(
        std::fs::read_to_string(scenario.output("hello-2")).unwrap(),
        "Hello from worker 2 of Hello\n"
    );
}

#[test]
#[serial]
fn job_round_trip_between_groups() {
    let scenario = Scenario::new(
        r#"
[[groups]]
entry_point = "echo"
worker_type = "job"
min_workers = 1
scaling = { kind = "disabled" }

[[groups]]
entry_point = "job-client"
worker_type = "service"
min_workers = 1
job_groups = [1]
restart = { kind = "never" }
job_client = { max_try_count = 5, retry_interval_ms = 100 }
"#,
    );

    let mut child = scenario.spawn();
    let result = wait_for_file(&scenario.output("result-2"));
    assert_eq!(result, "OK: Test");

    let status = scenario.status(true);
    assert!(status.status.success(), "stderr: {}", stderr(&status));
    let value: serde_json::Value = serde_json::from_slice(&status.stdout).unwrap();
    assert_eq!(value["pool"]["running"], true);
    assert_eq!(value["workers"][0]["group_id"], 1);
    assert_eq!(value["workers"][0]["jobs"]["processed"], 1);

    signal(&child, "TERM");
    assert!(wait_exit(&mut child).success());
}

#[test]
#[serial]
fn signal_stops_workers_softly() {
    let scenario = Scenario::new(
        r#"
[[groups]]
entry_point = "counter"
worker_type = "service"
min_workers = 2
"#,
    );

    let mut child = scenario.spawn();
    let start = Instant::now();
    loop {
        let status = scenario.status(false);
        let text = String::from_utf8_lossy(&status.stdout).into_owned();
        let ready = text
            .lines()
            .skip(2)
            .filter(|line| line.split_whitespace().nth(3) == Some("yes"))
            .count();
        if ready == 2 {
            break;
        }
        assert!(start.elapsed() < DEADLINE, "workers never became ready");
        std::thread::sleep(Duration::from_millis(50));
    }

    signal(&child, "INT");
    assert!(wait_exit(&mut child).success());
    for name in ["counter-1", "counter-2"] {
        let count: u64 = wait_for_file(&scenario.output(name)).trim().parse().unwrap();
        assert!(count >= 1);
    }
}

#[test]
#[serial]
fn fatal_worker_stops_the_pool() {
    let scenario = Scenario::new(
        r#"
[[groups]]
entry_point = "wait"
worker_type = "service"
min_workers = 1

[[groups]]
entry_point = "fatal"
worker_type = "service"
min_workers = 1
"#,
    );

    let output = scenario.run();

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("worker 2 failed fatally: fatal entry point"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
#[serial]
fn terminated_worker_is_not_restarted() {
    let scenario = Scenario::new(
        r#"
[[groups]]
entry_point = "terminate"
worker_type = "service"
min_workers = 1
"#,
    );

    let output = scenario.run();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
#[serial]
fn unknown_entry_point_is_rejected() {
    let scenario = Scenario::new(
        r#"
[[groups]]
entry_point = "nope"
worker_type = "service"
min_workers = 1
"#,
    );

    let output = scenario.run();

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("unknown entry point 'nope'"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
#[serial]
fn status_without_pool_fails() {
    let scenario = Scenario::new("");
    let output = scenario.status(false);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no running pool in"));
}
