// tests/local_jobmanager.rs

//! End-to-end runs through the real process-based job manager.

mod common;
use crate::common::{init_tracing, start_and_run};

use rundag::errors::RundagError;
use rundag::exec::LocalJobManager;
use rundag::model::{ExecutionStatus, TaskStatus};
use rundag::store::Store;
use rundag_test_utils::builders::{RecipeBuilder, StageSpecBuilder};

#[tokio::test]
async fn shell_tasks_produce_declared_outputs() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("shell");
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage(
            "greet",
            StageSpecBuilder::new("echo hello > {out.greeting}")
                .output("greeting", "hello.txt")
                .build(),
        )
        .with_stage(
            "announce",
            StageSpecBuilder::new("echo done in {output_dir}").after("greet").build(),
        )
        .build();

    let mut jm = LocalJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "shell", &out, None, &recipe, &mut jm).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Successful);

    let tasks = store.load_tasks(execution.id).unwrap();
    let greet = tasks.iter().find(|t| t.stage_name == "greet").unwrap();
    let greeting = greet.output_file("greeting").unwrap();
    let path = greeting.path.as_ref().unwrap();
    assert!(path.exists(), "missing output file {}", path.display());
    assert_eq!(std::fs::read_to_string(path).unwrap().trim(), "hello");

    // stdout/stderr were captured into the log dir.
    let log_dir = greet.log_dir.as_ref().unwrap();
    assert!(log_dir.join("stdout.log").exists());
    assert!(log_dir.join("stderr.log").exists());

    // The recorded profile has the exit status and a wall time.
    assert_eq!(
        greet.profile.get("exit_status").and_then(|v| v.as_i64()),
        Some(0)
    );
    assert!(greet.profile.contains_key("wall_time_ms"));
}

#[tokio::test]
async fn failing_shell_task_kills_the_execution() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("shellfail");
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage("boom", StageSpecBuilder::new("exit 3").build())
        .build();

    let mut jm = LocalJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "shellfail", &out, None, &recipe, &mut jm).await;
    match result {
        Err(RundagError::ExecutionFailed { task }) => assert_eq!(task, "boom[0]"),
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
    assert_eq!(execution.status(), ExecutionStatus::Killed);

    let tasks = store.load_tasks(execution.id).unwrap();
    assert_eq!(tasks[0].status(), TaskStatus::Failed);
    assert_eq!(
        tasks[0].profile.get("exit_status").and_then(|v| v.as_i64()),
        Some(3)
    );
}

#[tokio::test]
async fn soft_shell_failure_lets_dependents_run() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("shellsoft");
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage("flaky", StageSpecBuilder::new("false").must_succeed(false).build())
        .with_stage("after", StageSpecBuilder::new("true").after("flaky").build())
        .build();

    let mut jm = LocalJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "shellsoft", &out, None, &recipe, &mut jm).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Failed);

    let tasks = store.load_tasks(execution.id).unwrap();
    let flaky = tasks.iter().find(|t| t.stage_name == "flaky").unwrap();
    let after = tasks.iter().find(|t| t.stage_name == "after").unwrap();
    assert_eq!(flaky.status(), TaskStatus::Failed);
    assert_eq!(after.status(), TaskStatus::Successful);
}

#[tokio::test]
async fn noop_tasks_never_spawn_processes() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("noopshell");
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage("gate", StageSpecBuilder::noop().build())
        .build();

    let mut jm = LocalJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "noopshell", &out, None, &recipe, &mut jm).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Successful);

    let tasks = store.load_tasks(execution.id).unwrap();
    assert_eq!(tasks[0].status(), TaskStatus::Successful);
    // No process ran, so no log files were written.
    assert!(!tasks[0].log_dir.as_ref().unwrap().join("stdout.log").exists());
}
