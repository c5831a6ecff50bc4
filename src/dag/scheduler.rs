// src/dag/scheduler.rs

//! Ready-task admission and the completion-drain loop.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::dag::GraphView;
use crate::engine::ShutdownSignal;
use crate::errors::{Result, RundagError};
use crate::exec::{JobManager, TaskCompletion, cpus_in_flight};
use crate::model::{Task, TaskId, TaskStatus};
use crate::store::Store;

/// What a finished drain observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainSummary {
    /// Completions that ended failed with `must_succeed == false`.
    pub soft_failures: usize,
}

/// Drives the remaining task DAG to empty against a CPU budget.
///
/// The loop is single-threaded: it submits as many ready tasks as the
/// budget allows, blocks until the job manager reports at least one
/// completion, applies the status transitions in reported order, and
/// removes finished nodes from the view. A `must_succeed` failure aborts
/// the drain; a requested shutdown does too.
pub struct Scheduler<'a, J: JobManager> {
    view: GraphView,
    tasks: &'a mut BTreeMap<TaskId, Task>,
    jobmanager: &'a mut J,
    store: &'a mut Store,
    max_cpus: Option<u32>,
    shutdown: ShutdownSignal,
    soft_failures: usize,
}

impl<'a, J: JobManager> Scheduler<'a, J> {
    pub fn new(
        view: GraphView,
        tasks: &'a mut BTreeMap<TaskId, Task>,
        jobmanager: &'a mut J,
        store: &'a mut Store,
        max_cpus: Option<u32>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            view,
            tasks,
            jobmanager,
            store,
            max_cpus,
            shutdown,
            soft_failures: 0,
        }
    }

    /// Run until the view drains, a must-succeed task fails, or termination
    /// is requested.
    pub async fn drain(mut self) -> Result<DrainSummary> {
        while !self.view.is_empty() {
            if self.shutdown.is_requested() {
                return Err(RundagError::Interrupted);
            }

            self.submit_ready()?;

            let shutdown = self.shutdown.clone();
            let finished = tokio::select! {
                _ = shutdown.wait() => return Err(RundagError::Interrupted),
                finished = self.jobmanager.get_finished_tasks(true) => finished?,
            };

            if finished.is_empty() {
                // The at_least_one contract was violated; bail out instead
                // of spinning.
                return Err(RundagError::Other(anyhow::anyhow!(
                    "job manager returned no completions while {} tasks remain",
                    self.view.len()
                )));
            }
            for completion in finished {
                self.apply_completion(completion)?;
            }
        }

        Ok(DrainSummary {
            soft_failures: self.soft_failures,
        })
    }

    /// One admission sweep: submit ready tasks in ascending `cpu_req` order
    /// until the CPU budget is exhausted.
    ///
    /// The sweep stops (rather than skips) at the first task that does not
    /// fit — the ordering guarantees everything after it costs at least as
    /// much.
    fn submit_ready(&mut self) -> Result<()> {
        let mut ready = self.view.ready(self.tasks);
        // Stable sort: ties stay in ascending id (= insertion) order.
        ready.sort_by_key(|id| self.tasks.get(id).map(|t| t.cpu_req).unwrap_or(u32::MAX));

        for id in ready {
            let in_flight = cpus_in_flight(&self.jobmanager.running_tasks());
            let Some(task) = self.tasks.get_mut(&id) else {
                warn!(task_id = id, "ready task missing from arena; ignoring");
                continue;
            };

            if let Some(max) = self.max_cpus {
                if task.cpu_req + in_flight > max {
                    info!(
                        max_cpus = max,
                        in_flight, "reached max_cpus limit, waiting for a task to finish"
                    );
                    break;
                }
            }

            // Finalize any output file path that is still unset.
            if let Some(out_dir) = task.output_dir.clone() {
                for file in &mut task.output_files {
                    if file.path.is_none() {
                        file.path = Some(out_dir.join(&file.basename));
                    }
                }
            }

            task.mark_submitted()?;
            debug!(task = %task.label(), cpu_req = task.cpu_req, "submitting task");
            self.jobmanager.submit(task)?;
        }
        Ok(())
    }

    /// Apply one completion: advance the state machine, persist the task,
    /// and drop terminal tasks from the view. The commit happens before the
    /// removal, so a task only ever leaves the graph with a durable
    /// terminal status.
    fn apply_completion(&mut self, completion: TaskCompletion) -> Result<()> {
        let Some(task) = self.tasks.get_mut(&completion.task_id) else {
            warn!(
                task_id = completion.task_id,
                "completion for unknown task; ignoring"
            );
            return Ok(());
        };

        if let Some(ms) = completion.wall_time_ms {
            task.profile
                .insert("wall_time_ms".to_string(), ms.into());
        }
        let status = task.complete(completion.exit_status)?;
        self.store.commit_task(task)?;

        if status == TaskStatus::Successful {
            debug!(task = %task.label(), "task successful");
            self.view.remove(completion.task_id);
        } else if task.must_succeed {
            warn!(
                task = %task.label(),
                exit_status = completion.exit_status,
                "required task failed"
            );
            return Err(RundagError::ExecutionFailed { task: task.label() });
        } else {
            warn!(
                task = %task.label(),
                exit_status = completion.exit_status,
                "task failed; continuing without it"
            );
            self.soft_failures += 1;
            self.view.remove(completion.task_id);
        }
        Ok(())
    }
}
