// src/exec/mod.rs

//! Job management: the interface the scheduler drives, plus the local
//! process-based implementation.
//!
//! The scheduler talks to a [`JobManager`] instead of spawning processes
//! directly. This keeps the parallelism behind one interface — production
//! uses [`LocalJobManager`]; tests can provide a manager that scripts
//! completions without running anything.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::model::{Task, TaskId};

pub mod local;

pub use local::LocalJobManager;

/// Snapshot entry for an in-flight task.
#[derive(Debug, Clone, Copy)]
pub struct RunningJob {
    pub task_id: TaskId,
    pub cpu_req: u32,
}

/// Outcome reported by the resource manager for one task.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task_id: TaskId,
    pub exit_status: i64,
    /// Wall-clock duration in milliseconds, when the backend measured one.
    pub wall_time_ms: Option<u64>,
}

/// Interface to the distributed resource manager.
///
/// A submitted task counts as running until it has been handed back by
/// `get_finished_tasks`.
pub trait JobManager: Send {
    /// Hand a task off for execution.
    fn submit(&mut self, task: &Task) -> Result<()>;

    /// Snapshot of the currently in-flight tasks.
    fn running_tasks(&self) -> Vec<RunningJob>;

    /// Drain the completion queue.
    ///
    /// With `at_least_one`, blocks until at least one completion is
    /// available and then returns as many as are immediately available;
    /// otherwise returns only what is already queued, without blocking.
    fn get_finished_tasks(
        &mut self,
        at_least_one: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TaskCompletion>>> + Send + '_>>;

    /// Best-effort kill of all in-flight tasks.
    fn terminate(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Sum of `cpu_req` over a running snapshot.
pub fn cpus_in_flight(running: &[RunningJob]) -> u32 {
    running.iter().map(|job| job.cpu_req).sum()
}
