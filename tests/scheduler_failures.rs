// tests/scheduler_failures.rs

mod common;
use crate::common::{init_tracing, start_and_run};

use rundag::errors::RundagError;
use rundag::model::{ExecutionStatus, TaskStatus};
use rundag::store::Store;
use rundag_test_utils::builders::{RecipeBuilder, StageSpecBuilder};
use rundag_test_utils::fake_job_manager::FakeJobManager;

/// A must-succeed task exiting non-zero kills the whole execution: the
/// task ends `failed`, the execution ends `killed`, and the job manager is
/// told to terminate exactly once.
#[tokio::test]
async fn must_succeed_failure_kills_execution() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage("t1", StageSpecBuilder::new("false").build())
        .with_stage("t2", StageSpecBuilder::new("echo ok").build())
        .build();

    let mut jm = FakeJobManager::new();
    jm.fail_stage("t1", 3);
    let (execution, result) = start_and_run(
        &mut store,
        "fatal",
        &tmp.path().join("fatal"),
        None,
        &recipe,
        &mut jm,
    )
    .await;

    match result {
        Err(RundagError::ExecutionFailed { task }) => assert_eq!(task, "t1[0]"),
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
    assert_eq!(execution.status(), ExecutionStatus::Killed);
    assert!(!execution.successful);
    assert!(execution.finished_on.is_some());
    assert_eq!(jm.terminate_calls, 1);

    let tasks = store.load_tasks(execution.id).unwrap();
    let t1 = tasks.iter().find(|t| t.stage_name == "t1").unwrap();
    assert_eq!(t1.status(), TaskStatus::Failed);
    assert_eq!(
        t1.profile.get("exit_status").and_then(|v| v.as_i64()),
        Some(3)
    );

    // The stored execution row agrees with the in-memory aggregate.
    let stored = store.find_execution_by_name("fatal").unwrap().unwrap();
    assert_eq!(stored.status(), ExecutionStatus::Killed);
}

/// A soft failure is removed from the graph so its dependents still run,
/// but the execution's terminal status is downgraded to `failed`.
#[tokio::test]
async fn soft_failure_keeps_going_but_fails_execution() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage("t1", StageSpecBuilder::new("false").must_succeed(false).build())
        .with_stage("t2", StageSpecBuilder::new("echo ok").after("t1").build())
        .build();

    let mut jm = FakeJobManager::new();
    jm.fail_stage("t1", 1);
    let (execution, result) = start_and_run(
        &mut store,
        "soft",
        &tmp.path().join("soft"),
        None,
        &recipe,
        &mut jm,
    )
    .await;

    assert_eq!(result.unwrap(), ExecutionStatus::Failed);
    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert!(!execution.successful);
    assert_eq!(jm.terminate_calls, 0);
    assert_eq!(jm.submitted_stages(), vec!["t1", "t2"]);

    let tasks = store.load_tasks(execution.id).unwrap();
    let t1 = tasks.iter().find(|t| t.stage_name == "t1").unwrap();
    let t2 = tasks.iter().find(|t| t.stage_name == "t2").unwrap();
    assert_eq!(t1.status(), TaskStatus::Failed);
    assert!(!t1.successful);
    assert_eq!(t2.status(), TaskStatus::Successful);
}
