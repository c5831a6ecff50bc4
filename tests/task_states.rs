// tests/task_states.rs

//! State-machine rules for tasks and executions.

use rundag::errors::RundagError;
use rundag::model::{Execution, ExecutionStatus, Task, TaskStatus};

fn task() -> Task {
    Task::new(1, "stage", 0, 1, true, false)
}

#[test]
fn fresh_task_submits_then_completes() {
    let mut t = task();
    assert_eq!(t.status(), TaskStatus::NoAttempt);
    assert!(!t.is_submitted());

    t.mark_submitted().unwrap();
    assert!(t.is_submitted());
    assert_eq!(t.status(), TaskStatus::NoAttempt);

    let status = t.complete(0).unwrap();
    assert_eq!(status, TaskStatus::Successful);
    assert!(t.successful);
    assert_eq!(
        t.profile.get("exit_status").and_then(|v| v.as_i64()),
        Some(0)
    );
}

#[test]
fn nonzero_exit_fails_the_task() {
    let mut t = task();
    t.mark_submitted().unwrap();
    assert_eq!(t.complete(2).unwrap(), TaskStatus::Failed);
    assert!(!t.successful);
}

#[test]
fn noop_completes_successfully_regardless_of_exit_status() {
    let mut t = Task::new(1, "gate", 0, 1, true, true);
    assert_eq!(t.complete(0).unwrap(), TaskStatus::Successful);
}

#[test]
fn double_submit_is_rejected() {
    let mut t = task();
    t.mark_submitted().unwrap();
    let err = t.mark_submitted().unwrap_err();
    assert!(matches!(err, RundagError::TaskState(_)), "got {err:?}");
}

#[test]
fn terminal_tasks_accept_no_further_completions() {
    let mut t = task();
    t.mark_submitted().unwrap();
    t.complete(0).unwrap();
    let err = t.complete(1).unwrap_err();
    assert!(matches!(err, RundagError::TaskState(_)), "got {err:?}");

    let mut f = task();
    f.mark_submitted().unwrap();
    f.complete(1).unwrap();
    assert!(f.complete(0).is_err());
    assert!(f.mark_submitted().is_err());
}

#[test]
fn execution_status_is_monotonic() {
    let mut ex = Execution::new(0, "mono".to_string(), "/tmp/mono".into(), None, None).unwrap();
    assert_eq!(ex.status(), ExecutionStatus::NoAttempt);
    assert!(ex.finished_on.is_none());

    assert!(ex.set_status(ExecutionStatus::Running));
    assert!(ex.set_status(ExecutionStatus::Successful));
    assert!(ex.successful);
    assert!(ex.finished_on.is_some());

    // Terminal statuses never replace one another.
    assert!(!ex.set_status(ExecutionStatus::Failed));
    assert!(!ex.set_status(ExecutionStatus::Killed));
    assert_eq!(ex.status(), ExecutionStatus::Successful);

    // Setting the same status again reports no change.
    assert!(!ex.set_status(ExecutionStatus::Successful));

    // A new attempt moves the execution back to running and clears the
    // derived fields from the prior run.
    assert!(ex.set_status(ExecutionStatus::Running));
    assert!(!ex.successful);
    assert!(ex.finished_on.is_none());
}

#[test]
fn successful_flag_tracks_the_successful_branch_only() {
    let mut ex = Execution::new(0, "flags".to_string(), "/tmp/flags".into(), None, None).unwrap();
    ex.set_status(ExecutionStatus::Running);
    ex.set_status(ExecutionStatus::Failed);
    assert!(!ex.successful);
    assert!(ex.finished_on.is_some());
}
