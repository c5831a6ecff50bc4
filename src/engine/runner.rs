// src/engine/runner.rs

//! Orchestration of a single execution run.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::dag::{GraphView, Scheduler};
use crate::engine::signal::{self, ShutdownSignal};
use crate::errors::{Result, RundagError};
use crate::exec::JobManager;
use crate::model::{Execution, ExecutionStatus, Task, TaskId};
use crate::recipe::{Recipe, StageValues, render_recipe};
use crate::store::Store;

/// Computes a per-task directory from the owning execution and the task.
pub type DirFn = Box<dyn Fn(&Execution, &Task) -> PathBuf + Send + Sync>;

pub struct RunOptions {
    /// Per-stage settings handed to command generation (`{s.KEY}`).
    pub settings: StageValues,
    /// Per-stage parameters handed to command generation (`{p.KEY}`).
    pub parameters: StageValues,
    /// Render, persist and prepare everything, but don't schedule.
    pub dry: bool,
    pub task_output_dir: DirFn,
    pub task_log_dir: DirFn,
    /// Cooperative termination signal; SIGINT is wired to it at run entry.
    pub shutdown: ShutdownSignal,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            settings: StageValues::new(),
            parameters: StageValues::new(),
            dry: false,
            task_output_dir: Box::new(default_task_output_dir),
            task_log_dir: Box::new(default_task_log_dir),
            shutdown: ShutdownSignal::new(),
        }
    }
}

/// The default function for computing a task's output dir:
/// `<output_dir>/<stage>/<task id>`.
fn default_task_output_dir(execution: &Execution, task: &Task) -> PathBuf {
    execution
        .output_dir
        .join(&task.stage_name)
        .join(task.id.to_string())
}

/// The default function for computing a task's log dir:
/// `<output_dir>/log/<stage>/<task id>`.
fn default_task_log_dir(execution: &Execution, task: &Task) -> PathBuf {
    execution
        .output_dir
        .join("log")
        .join(&task.stage_name)
        .join(task.id.to_string())
}

/// Execute `recipe` against `jobmanager` until the task DAG drains or the
/// execution dies. Returns the terminal status (`running` for a dry run).
pub async fn run<J: JobManager>(
    store: &mut Store,
    execution: &mut Execution,
    recipe: &Recipe,
    jobmanager: &mut J,
    opts: RunOptions,
) -> Result<ExecutionStatus> {
    execution.set_status(ExecutionStatus::Running);
    if execution.started_on.is_none() {
        execution.started_on = Some(Utc::now());
    }
    store.commit_execution(execution)?;

    // Render the recipe against whatever survived in the store and persist
    // the result, so every task has an id before directories are derived.
    let existing_stages = store.load_stages(execution.id)?;
    let existing_tasks = store.load_tasks(execution.id)?;
    let mut rendered = render_recipe(execution, recipe, existing_stages, existing_tasks);
    store.insert_stages(&mut rendered.stages)?;
    rendered.bind_stage_ids();
    store.insert_tasks(&mut rendered.tasks)?;

    let (task_g, stage_g) = rendered.build_graphs();
    info!(
        execution = %execution.name,
        stages = stage_g.len(),
        tasks = task_g.len(),
        "task graph rendered"
    );

    let mut tasks: BTreeMap<TaskId, Task> = rendered
        .tasks
        .into_iter()
        .map(|task| (task.id, task))
        .collect();

    let mut view = GraphView::from_graph(&task_g);
    let skipped = view.retain_unfinished(&tasks);
    info!(execution = %execution.name, "Skipping {skipped} successful tasks");
    info!(execution = %execution.name, "Queueing {} new tasks", view.len());

    signal::install_ctrl_c(&opts.shutdown);

    // Directory assignment for queued tasks. Log dirs must be unique across
    // the whole execution, completed tasks included.
    let mut log_dirs: HashMap<PathBuf, String> = tasks
        .values()
        .filter(|task| !view.contains(task.id))
        .filter_map(|task| task.log_dir.clone().map(|dir| (dir, task.label())))
        .collect();

    let queued: Vec<TaskId> = view.ids().collect();
    for id in &queued {
        let Some(task) = tasks.get_mut(id) else {
            continue;
        };
        task.output_dir = Some((opts.task_output_dir)(execution, task));
        let log_dir = (opts.task_log_dir)(execution, task);
        if let Some(other) = log_dirs.get(&log_dir) {
            return Err(RundagError::Config(format!(
                "duplicate log_dir {} for {} and {}",
                log_dir.display(),
                task.label(),
                other
            )));
        }
        log_dirs.insert(log_dir.clone(), task.label());
        task.log_dir = Some(log_dir);

        if let Some(out_dir) = task.output_dir.clone() {
            for file in &mut task.output_files {
                if file.path.is_none() {
                    file.path = Some(out_dir.join(&file.basename));
                }
            }
        }
    }

    // Generate commands for queued, non-NOOP tasks.
    for id in &queued {
        let Some(task) = tasks.get_mut(id) else {
            continue;
        };
        if task.noop {
            continue;
        }
        let spec = recipe.stage(&task.stage_name).ok_or_else(|| {
            RundagError::Config(format!("no stage '{}' in recipe", task.stage_name))
        })?;
        let command = spec.generate_command(
            task,
            opts.settings.get(&task.stage_name),
            opts.parameters.get(&task.stage_name),
        )?;
        task.command = Some(command);
    }
    store.commit_tasks(tasks.values())?;

    if opts.dry {
        info!(execution = %execution.name, "dry run; not scheduling");
        store.commit_execution(execution)?;
        return Ok(execution.status());
    }

    let scheduler = Scheduler::new(
        view,
        &mut tasks,
        &mut *jobmanager,
        &mut *store,
        execution.max_cpus,
        opts.shutdown.clone(),
    );
    match scheduler.drain().await {
        Ok(summary) => {
            let status = if summary.soft_failures > 0 {
                warn!(
                    execution = %execution.name,
                    soft_failures = summary.soft_failures,
                    "tasks failed; marking execution failed"
                );
                ExecutionStatus::Failed
            } else {
                ExecutionStatus::Successful
            };
            execution.set_status(status);
            store.commit_execution(execution)?;
            Ok(status)
        }
        Err(err) => {
            if let Err(term_err) = terminate(store, execution, &mut tasks, jobmanager).await {
                warn!(error = %term_err, "terminate failed while handling a fatal error");
            }
            Err(err)
        }
    }
}

/// Stop an execution: drain whatever already finished (without blocking for
/// more), kill the rest, and mark the execution killed. Idempotent.
pub async fn terminate<J: JobManager>(
    store: &mut Store,
    execution: &mut Execution,
    tasks: &mut BTreeMap<TaskId, Task>,
    jobmanager: &mut J,
) -> Result<()> {
    if execution.status() == ExecutionStatus::Killed {
        return Ok(());
    }
    warn!(execution = %execution.name, "Terminating!");

    info!(execution = %execution.name, "Processing finished tasks and terminating running ones");
    let finished = jobmanager.get_finished_tasks(false).await?;
    for completion in finished {
        let Some(task) = tasks.get_mut(&completion.task_id) else {
            continue;
        };
        if task.status().is_terminal() {
            continue;
        }
        if let Some(ms) = completion.wall_time_ms {
            task.profile.insert("wall_time_ms".to_string(), ms.into());
        }
        task.complete(completion.exit_status)?;
        store.commit_task(task)?;
    }
    jobmanager.terminate().await?;

    execution.set_status(ExecutionStatus::Killed);
    store.commit_execution(execution)?;
    Ok(())
}
