// tests/scheduler_admission.rs

mod common;
use crate::common::{init_tracing, start_and_run};

use rundag::model::ExecutionStatus;
use rundag::store::Store;
use rundag_test_utils::builders::{RecipeBuilder, StageSpecBuilder};
use rundag_test_utils::fake_job_manager::FakeJobManager;

/// Diamond under a tight budget: a -> {b, c} -> d with b and c costing two
/// CPUs each against max_cpus = 3. Only one of {b, c} may be in flight at a
/// time; d runs last.
#[tokio::test]
async fn diamond_respects_cpu_budget() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage("a", StageSpecBuilder::new("echo a").build())
        .with_stage("b", StageSpecBuilder::new("echo b").after("a").cpu_req(2).build())
        .with_stage("c", StageSpecBuilder::new("echo c").after("a").cpu_req(2).build())
        .with_stage("d", StageSpecBuilder::new("echo d").after("b").after("c").build())
        .build();

    let mut jm = FakeJobManager::new();
    let (execution, result) = start_and_run(
        &mut store,
        "diamond",
        &tmp.path().join("diamond"),
        Some(3),
        &recipe,
        &mut jm,
    )
    .await;

    assert_eq!(result.unwrap(), ExecutionStatus::Successful);
    assert_eq!(execution.status(), ExecutionStatus::Successful);

    let stages = jm.submitted_stages();
    assert_eq!(stages.len(), 4);
    assert_eq!(stages[0], "a");
    assert_eq!(stages[3], "d");
    // b and c in either order between them.
    let mut middle = vec![stages[1].clone(), stages[2].clone()];
    middle.sort();
    assert_eq!(middle, vec!["b", "c"]);

    // The budget was never exceeded; in particular b and c (2 + 2 = 4)
    // were never in flight together.
    assert!(jm.peak_cpus <= 3, "peak cpus {} > 3", jm.peak_cpus);
}

/// A fan-out stage saturates the budget task by task.
#[tokio::test]
async fn fanout_is_bounded_by_budget() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let mut store = Store::in_memory().unwrap();
    let recipe = RecipeBuilder::new()
        .with_stage(
            "wide",
            StageSpecBuilder::new("echo {seq}").cpu_req(2).tasks(5).build(),
        )
        .build();

    let mut jm = FakeJobManager::new();
    let (_execution, result) = start_and_run(
        &mut store,
        "fanout",
        &tmp.path().join("fanout"),
        Some(4),
        &recipe,
        &mut jm,
    )
    .await;

    assert_eq!(result.unwrap(), ExecutionStatus::Successful);
    assert_eq!(jm.submitted().len(), 5);
    assert!(jm.peak_cpus <= 4, "peak cpus {} > 4", jm.peak_cpus);

    // Fan-out tasks are admitted in seq order (tie on cpu_req, so the
    // insertion order wins).
    let seqs: Vec<u32> = jm.submitted().iter().map(|s| s.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
}
