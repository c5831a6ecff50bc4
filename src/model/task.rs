// src/model/task.rs

//! Tasks, their output files, and the per-task state machine.

use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::errors::{Result, RundagError};
use crate::model::{StageId, TaskId};

/// Persisted status of a task.
///
/// "Submitted" is deliberately not part of this enumeration: it only exists
/// while a scheduler is alive and is materialized as a transient flag on
/// [`Task`]. A crash while submitted resumes as `no_attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    NoAttempt,
    Successful,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NoAttempt => "no_attempt",
            TaskStatus::Successful => "successful",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "no_attempt" => Ok(TaskStatus::NoAttempt),
            "successful" => Ok(TaskStatus::Successful),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(RundagError::Config(format!("unknown task status '{other}'"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Successful | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file produced by a task. `path` is finalized at scheduling time and
/// never rewritten afterwards.
#[derive(Debug, Clone)]
pub struct TaskFile {
    /// Logical output name, referenced as `{out.<name>}` in tool templates.
    pub name: String,
    pub basename: String,
    pub path: Option<PathBuf>,
}

/// Unit of execution: one command with a declared CPU requirement and file
/// outputs.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub stage_id: StageId,
    /// Denormalized stage name, used for directory layout and logging.
    pub stage_name: String,
    /// Position within the stage's fan-out. `(stage, seq)` identifies a
    /// task across process restarts.
    pub seq: u32,
    pub cpu_req: u32,
    /// Whether a failure of this task is fatal for the execution.
    pub must_succeed: bool,
    /// Marker task: no command is generated or dispatched; completes
    /// immediately as successful on selection.
    pub noop: bool,
    pub command: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub output_files: Vec<TaskFile>,
    /// Runtime measurements; contains at least `exit_status` after
    /// completion.
    pub profile: Map<String, Value>,
    pub successful: bool,
    status: TaskStatus,
    submitted: bool,
}

impl Task {
    pub fn new(
        stage_id: StageId,
        stage_name: impl Into<String>,
        seq: u32,
        cpu_req: u32,
        must_succeed: bool,
        noop: bool,
    ) -> Self {
        Self {
            id: 0,
            stage_id,
            stage_name: stage_name.into(),
            seq,
            cpu_req,
            must_succeed,
            noop,
            command: None,
            output_dir: None,
            log_dir: None,
            output_files: Vec::new(),
            profile: Map::new(),
            successful: false,
            status: TaskStatus::NoAttempt,
            submitted: false,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Human-readable identity for logs and error messages.
    pub fn label(&self) -> String {
        format!("{}[{}]", self.stage_name, self.seq)
    }

    /// `no_attempt` → submitted. Any other starting point is a scheduler
    /// bug.
    pub fn mark_submitted(&mut self) -> Result<()> {
        if self.status != TaskStatus::NoAttempt || self.submitted {
            return Err(RundagError::TaskState(format!(
                "cannot submit {} from status {} (submitted={})",
                self.label(),
                self.status,
                self.submitted
            )));
        }
        self.submitted = true;
        Ok(())
    }

    /// Apply a completion, recording `exit_status` in the profile.
    ///
    /// Exit status 0 — or a NOOP task regardless of status — transitions to
    /// `successful`; anything else to `failed`. Terminal states accept no
    /// further completions.
    pub fn complete(&mut self, exit_status: i64) -> Result<TaskStatus> {
        if self.status.is_terminal() {
            return Err(RundagError::TaskState(format!(
                "completion for {} which is already {}",
                self.label(),
                self.status
            )));
        }

        self.profile
            .insert("exit_status".to_string(), Value::from(exit_status));
        if exit_status == 0 || self.noop {
            self.status = TaskStatus::Successful;
            self.successful = true;
        } else {
            self.status = TaskStatus::Failed;
            self.successful = false;
        }
        Ok(self.status)
    }

    /// Find a declared output file by its logical name.
    pub fn output_file(&self, name: &str) -> Option<&TaskFile> {
        self.output_files.iter().find(|f| f.name == name)
    }

    /// Restore persisted state without transition checks. Store use only.
    pub(crate) fn restore_status(&mut self, status: TaskStatus, successful: bool) {
        self.status = status;
        self.successful = successful;
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task[{}] {}", self.id, self.label())
    }
}
