use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;
use rundag::errors::Result;
use rundag::exec::{JobManager, RunningJob, TaskCompletion};
use rundag::model::{Task, TaskId};

/// One recorded submission.
#[derive(Debug, Clone)]
pub struct SubmittedTask {
    pub task_id: TaskId,
    pub stage: String,
    pub seq: u32,
    pub cpu_req: u32,
}

/// A fake job manager that never runs anything.
///
/// - records submissions in order
/// - completes jobs one at a time in FIFO order when the scheduler blocks,
///   which makes scenario tests deterministic
/// - reports scripted exit statuses (default 0), keyed by stage name
/// - tracks the peak CPU load ever in flight, for budget assertions
pub struct FakeJobManager {
    submitted: Vec<SubmittedTask>,
    /// Pending non-NOOP jobs, completed FIFO on demand.
    queue: VecDeque<TaskCompletion>,
    /// Completions available without blocking (NOOP tasks).
    instant: VecDeque<TaskCompletion>,
    running: HashMap<TaskId, u32>,
    outcomes: HashMap<String, i64>,
    pub peak_cpus: u32,
    pub terminate_calls: usize,
}

impl FakeJobManager {
    pub fn new() -> Self {
        Self {
            submitted: Vec::new(),
            queue: VecDeque::new(),
            instant: VecDeque::new(),
            running: HashMap::new(),
            outcomes: HashMap::new(),
            peak_cpus: 0,
            terminate_calls: 0,
        }
    }

    /// Script every task of `stage` to exit with `exit_status`.
    pub fn fail_stage(&mut self, stage: &str, exit_status: i64) {
        self.outcomes.insert(stage.to_string(), exit_status);
    }

    pub fn submitted(&self) -> &[SubmittedTask] {
        &self.submitted
    }

    /// Stage names in submission order.
    pub fn submitted_stages(&self) -> Vec<String> {
        self.submitted.iter().map(|s| s.stage.clone()).collect()
    }
}

impl Default for FakeJobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager for FakeJobManager {
    fn submit(&mut self, task: &Task) -> Result<()> {
        self.submitted.push(SubmittedTask {
            task_id: task.id,
            stage: task.stage_name.clone(),
            seq: task.seq,
            cpu_req: task.cpu_req,
        });
        self.running.insert(task.id, task.cpu_req);
        let in_flight: u32 = self.running.values().sum();
        self.peak_cpus = self.peak_cpus.max(in_flight);

        let completion = TaskCompletion {
            task_id: task.id,
            exit_status: *self.outcomes.get(&task.stage_name).unwrap_or(&0),
            wall_time_ms: None,
        };
        if task.noop {
            self.instant.push_back(TaskCompletion {
                exit_status: 0,
                ..completion
            });
        } else {
            self.queue.push_back(completion);
        }
        Ok(())
    }

    fn running_tasks(&self) -> Vec<RunningJob> {
        self.running
            .iter()
            .map(|(&task_id, &cpu_req)| RunningJob { task_id, cpu_req })
            .collect()
    }

    fn get_finished_tasks(
        &mut self,
        at_least_one: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TaskCompletion>>> + Send + '_>> {
        Box::pin(async move {
            let mut finished: Vec<TaskCompletion> = self.instant.drain(..).collect();
            if finished.is_empty() && at_least_one {
                match self.queue.pop_front() {
                    Some(completion) => finished.push(completion),
                    // A real manager would block forever here; fail the
                    // test instead.
                    None => return Err(anyhow!("get_finished_tasks called with nothing in flight").into()),
                }
            }
            for completion in &finished {
                self.running.remove(&completion.task_id);
            }
            Ok(finished)
        })
    }

    fn terminate(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.terminate_calls += 1;
            self.queue.clear();
            self.running.clear();
            Ok(())
        })
    }
}
