// src/exec/local.rs

//! Local process-based job manager.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::errors::{Result, RundagError};
use crate::exec::{JobManager, RunningJob, TaskCompletion};
use crate::model::{Task, TaskId};

struct InFlight {
    cpu_req: u32,
    /// Absent for NOOP tasks and for jobs that failed to spawn.
    cancel: Option<oneshot::Sender<()>>,
}

/// Runs task commands as local `sh -c` child processes.
///
/// stdout and stderr are redirected into the task's log directory. Each
/// child reports exactly one completion over the internal queue; a child
/// killed by `terminate` reports none. NOOP tasks never spawn a process and
/// complete immediately with exit status 0.
pub struct LocalJobManager {
    completions_tx: mpsc::UnboundedSender<TaskCompletion>,
    completions_rx: mpsc::UnboundedReceiver<TaskCompletion>,
    running: HashMap<TaskId, InFlight>,
}

impl LocalJobManager {
    pub fn new() -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            completions_tx,
            completions_rx,
            running: HashMap::new(),
        }
    }
}

impl Default for LocalJobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager for LocalJobManager {
    fn submit(&mut self, task: &Task) -> Result<()> {
        if self.running.contains_key(&task.id) {
            return Err(RundagError::TaskState(format!(
                "task {} is already in flight",
                task.label()
            )));
        }

        if task.noop {
            debug!(task = %task.label(), "NOOP task; completing immediately");
            let _ = self.completions_tx.send(TaskCompletion {
                task_id: task.id,
                exit_status: 0,
                wall_time_ms: None,
            });
            self.running.insert(
                task.id,
                InFlight {
                    cpu_req: task.cpu_req,
                    cancel: None,
                },
            );
            return Ok(());
        }

        let command = task.command.clone().ok_or_else(|| {
            RundagError::Config(format!("task {} has no command", task.label()))
        })?;
        let log_dir = task.log_dir.clone().ok_or_else(|| {
            RundagError::Config(format!("task {} has no log_dir", task.label()))
        })?;
        fs::create_dir_all(&log_dir)?;
        if let Some(out_dir) = &task.output_dir {
            fs::create_dir_all(out_dir)?;
        }
        let stdout = fs::File::create(log_dir.join("stdout.log"))?;
        let stderr = fs::File::create(log_dir.join("stderr.log"))?;

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&command);
            c
        };
        cmd.stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        info!(task = %task.label(), cmd = %command, "starting task process");

        let task_id = task.id;
        let label = task.label();
        let tx = self.completions_tx.clone();
        let cancel = match cmd.spawn() {
            Ok(child) => {
                let (cancel_tx, cancel_rx) = oneshot::channel();
                tokio::spawn(wait_for_exit(task_id, label, child, tx, cancel_rx));
                Some(cancel_tx)
            }
            Err(err) => {
                error!(task = %label, error = %err, "failed to spawn task process");
                let _ = tx.send(TaskCompletion {
                    task_id,
                    exit_status: -1,
                    wall_time_ms: None,
                });
                None
            }
        };

        self.running.insert(
            task_id,
            InFlight {
                cpu_req: task.cpu_req,
                cancel,
            },
        );
        Ok(())
    }

    fn running_tasks(&self) -> Vec<RunningJob> {
        self.running
            .iter()
            .map(|(&task_id, job)| RunningJob {
                task_id,
                cpu_req: job.cpu_req,
            })
            .collect()
    }

    fn get_finished_tasks(
        &mut self,
        at_least_one: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TaskCompletion>>> + Send + '_>> {
        Box::pin(async move {
            let mut finished = Vec::new();
            if at_least_one {
                match self.completions_rx.recv().await {
                    Some(completion) => finished.push(completion),
                    // We hold a sender, so this can't happen in practice.
                    None => return Ok(finished),
                }
            }
            while let Ok(completion) = self.completions_rx.try_recv() {
                finished.push(completion);
            }
            for completion in &finished {
                self.running.remove(&completion.task_id);
            }
            Ok(finished)
        })
    }

    fn terminate(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for (task_id, job) in self.running.drain() {
                if let Some(cancel) = job.cancel {
                    if cancel.send(()).is_err() {
                        debug!(task_id, "task already exited before cancellation");
                    }
                }
            }
            Ok(())
        })
    }
}

/// Wait for a child to exit and report its completion, unless cancellation
/// wins the race — a cancelled instance reports nothing, so the scheduler
/// never sees completions from a terminated run.
async fn wait_for_exit(
    task_id: TaskId,
    label: String,
    mut child: Child,
    tx: mpsc::UnboundedSender<TaskCompletion>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let started = Instant::now();
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => {
                    let code = i64::from(status.code().unwrap_or(-1));
                    info!(
                        task = %label,
                        exit_code = code,
                        success = status.success(),
                        "task process exited"
                    );
                    let _ = tx.send(TaskCompletion {
                        task_id,
                        exit_status: code,
                        wall_time_ms: Some(started.elapsed().as_millis() as u64),
                    });
                }
                Err(err) => {
                    error!(task = %label, error = %err, "waiting for task process");
                    let _ = tx.send(TaskCompletion {
                        task_id,
                        exit_status: -1,
                        wall_time_ms: None,
                    });
                }
            }
        }
        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => {
                    info!(task = %label, "terminating running task");
                    if let Err(err) = child.kill().await {
                        warn!(task = %label, error = %err, "failed to kill task process");
                    }
                }
                Err(_) => {
                    // Sender dropped without an explicit cancel; the child
                    // is killed on drop.
                    debug!(task = %label, "cancel channel closed without explicit cancellation");
                }
            }
        }
    }
}
