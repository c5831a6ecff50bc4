// tests/lifecycle_resume.rs

mod common;
use crate::common::{init_tracing, start_and_run};

use rundag::model::{ExecutionStatus, TaskStatus};
use rundag::store::Store;
use rundag_test_utils::builders::{RecipeBuilder, StageSpecBuilder};
use rundag_test_utils::fake_job_manager::FakeJobManager;

fn chain_recipe(fail_c: bool) -> rundag::recipe::Recipe {
    let c = if fail_c {
        StageSpecBuilder::new("false").after("b").must_succeed(false).build()
    } else {
        StageSpecBuilder::new("echo c").after("b").must_succeed(false).build()
    };
    RecipeBuilder::new()
        .with_stage("a", StageSpecBuilder::new("echo a").build())
        .with_stage("b", StageSpecBuilder::new("echo b").after("a").build())
        .with_stage("c", c)
        .build()
}

/// Resume after a partial failure: completed tasks are kept, the failed
/// one is pruned and re-run, and the final state matches a clean run.
#[tokio::test]
async fn resume_reruns_only_unfinished_work() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("resume");
    let mut store = Store::in_memory().unwrap();

    // First attempt: c fails softly, a and b succeed.
    let mut jm1 = FakeJobManager::new();
    jm1.fail_stage("c", 1);
    let (execution, result) =
        start_and_run(&mut store, "resume", &out, None, &chain_recipe(true), &mut jm1).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Failed);

    let first_tasks = store.load_tasks(execution.id).unwrap();
    let a_id = first_tasks.iter().find(|t| t.stage_name == "a").unwrap().id;
    let b_id = first_tasks.iter().find(|t| t.stage_name == "b").unwrap().id;

    // Second attempt resumes: only c is submitted again.
    let mut jm2 = FakeJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "resume", &out, None, &chain_recipe(false), &mut jm2).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Successful);
    assert_eq!(jm2.submitted_stages(), vec!["c"]);

    let tasks = store.load_tasks(execution.id).unwrap();
    assert_eq!(tasks.len(), 3);
    for task in &tasks {
        assert_eq!(task.status(), TaskStatus::Successful);
    }
    // Completed rows survived with their ids.
    assert_eq!(tasks.iter().find(|t| t.stage_name == "a").unwrap().id, a_id);
    assert_eq!(tasks.iter().find(|t| t.stage_name == "b").unwrap().id, b_id);

    assert_eq!(execution.status(), ExecutionStatus::Successful);
    assert!(execution.successful);
}

/// Starting a finished execution again with identical inputs is a no-op:
/// nothing is submitted and no rows change.
#[tokio::test]
async fn resume_of_successful_execution_is_noop() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("idem");
    let mut store = Store::in_memory().unwrap();
    let recipe = chain_recipe(false);

    let mut jm1 = FakeJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "idem", &out, None, &recipe, &mut jm1).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Successful);
    let ids_before: Vec<i64> = store
        .load_tasks(execution.id)
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();

    let mut jm2 = FakeJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "idem", &out, None, &recipe, &mut jm2).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Successful);
    assert!(jm2.submitted().is_empty());

    let ids_after: Vec<i64> = store
        .load_tasks(execution.id)
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids_before, ids_after);
}

/// Resuming updates max_cpus from the caller.
#[tokio::test]
async fn resume_updates_max_cpus() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("cpus");
    let mut store = Store::in_memory().unwrap();
    let recipe = chain_recipe(false);

    let mut jm1 = FakeJobManager::new();
    let (_execution, result) =
        start_and_run(&mut store, "cpus", &out, Some(2), &recipe, &mut jm1).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Successful);

    let mut jm2 = FakeJobManager::new();
    let (execution, result) =
        start_and_run(&mut store, "cpus", &out, Some(5), &recipe, &mut jm2).await;
    assert_eq!(result.unwrap(), ExecutionStatus::Successful);
    assert_eq!(execution.max_cpus, Some(5));
    let stored = store.find_execution_by_name("cpus").unwrap().unwrap();
    assert_eq!(stored.max_cpus, Some(5));
}
