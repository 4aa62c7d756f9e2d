// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hp_core::{
    Bootstrap, ExitOutcome, FromWorker, GroupId, GroupsScheme, ToWorker, WorkerGroup, WorkerId,
    WorkerType,
};
use hp_engine::run_worker_on;
use hp_ipc::wire;
use hp_storage::WorkerStorage;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

struct Fixture {
    dir: TempDir,
    storage: WorkerStorage,
    scheme: GroupsScheme,
}

impl Fixture {
    fn new(entry_point: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut scheme = GroupsScheme::new();
        scheme
            .describe(WorkerGroup::new(entry_point, WorkerType::Service).min_workers(1))
            .unwrap();
        let storage = WorkerStorage::create(&dir.path().join("workers.state"), 1).unwrap();
        Self {
            dir,
            storage,
            scheme,
        }
    }

    fn bootstrap(&self, context: BTreeMap<String, String>) -> Bootstrap {
        Bootstrap {
            id: WorkerId::new(1),
            group: GroupId::new(1),
            groups_scheme: self.scheme.clone(),
            storage_path: self.storage.path().to_path_buf(),
            runtime_dir: self.dir.path().to_path_buf(),
            context,
        }
    }

    fn with_output_dir(&self) -> Bootstrap {
        let dir = self.dir.path().display().to_string();
        self.bootstrap(BTreeMap::from([(OUTPUT_DIR.to_string(), dir)]))
    }

    fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Runs the worker over in-memory pipes, optionally sending a soft
/// shutdown once it has started, and returns the reported outcome.
async fn drive(bootstrap: Bootstrap, shutdown_after_start: bool) -> ExitOutcome {
    let (mut to_worker, worker_in) = tokio::io::duplex(64 * 1024);
    let (worker_out, mut from_worker) = tokio::io::duplex(64 * 1024);
    let task = tokio::spawn(async move {
        let registry = registry();
        run_worker_on(&registry, worker_in, worker_out, WAIT).await
    });

    wire::write_json(&mut to_worker, &ToWorker::Bootstrap(Box::new(bootstrap)))
        .await
        .unwrap();

    let outcome = loop {
        let msg: FromWorker = tokio::time::timeout(WAIT, wire::read_json(&mut from_worker))
            .await
            .expect("worker message")
            .expect("well-formed message");
        match msg {
            FromWorker::Started { .. } if shutdown_after_start => {
                wire::write_json(&mut to_worker, &ToWorker::Shutdown { soft: true })
                    .await
                    .unwrap();
            }
            FromWorker::Exiting { outcome } => break outcome,
            _ => {}
        }
    };
    let _ = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    outcome
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn registry_has_every_builtin_entry_point() {
    let registry = registry();
    let names: Vec<_> = registry.names().collect();
    assert_eq!(
        names,
        vec!["counter", "echo", "fatal", "hello", "job-client", "terminate", "wait"]
    );
}

#[tokio::test]
async fn hello_writes_greeting() {
    let fixture = Fixture::new("hello");
    let outcome = drive(fixture.with_output_dir(), false).await;

    assert_eq!(outcome, ExitOutcome::Clean);
    assert_eq!(read(&fixture.output("hello-1")), "Hello from worker 1 of Hello\n");
}

#[tokio::test]
async fn missing_output_dir_is_fatal() {
    let fixture = Fixture::new("hello");
    let outcome = drive(fixture.bootstrap(BTreeMap::new()), false).await;

    assert_eq!(
        outcome,
        ExitOutcome::Fatal("context has no output_dir".to_string())
    );
}

#[tokio::test]
async fn counter_writes_count_on_shutdown() {
    let fixture = Fixture::new("counter");
    let outcome = drive(fixture.with_output_dir(), true).await;

    assert_eq!(outcome, ExitOutcome::Clean);
    let count: u64 = read(&fixture.output("counter-1")).trim().parse().unwrap();
    // The first interval tick completes immediately.
    assert!(count >= 1);
}

#[tokio::test]
async fn wait_exits_cleanly_on_shutdown() {
    let fixture = Fixture::new("wait");
    assert_eq!(drive(fixture.with_output_dir(), true).await, ExitOutcome::Clean);
}

#[tokio::test]
async fn fatal_reports_fatal() {
    let fixture = Fixture::new("fatal");
    assert_eq!(
        drive(fixture.with_output_dir(), false).await,
        ExitOutcome::Fatal("fatal entry point".to_string())
    );
}

#[tokio::test]
async fn terminate_reports_terminate() {
    let fixture = Fixture::new("terminate");
    assert_eq!(
        drive(fixture.with_output_dir(), false).await,
        ExitOutcome::Terminate
    );
}
