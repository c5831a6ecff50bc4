// src/model/execution.rs

//! The execution aggregate and its status cell.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::errors::{Result, RundagError};
use crate::model::{ExecutionId, validate_word_name};

/// Lifecycle status of an execution. Persisted by textual name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    NoAttempt,
    Running,
    Successful,
    Failed,
    Killed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::NoAttempt => "no_attempt",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Successful => "successful",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Killed => "killed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "no_attempt" => Ok(ExecutionStatus::NoAttempt),
            "running" => Ok(ExecutionStatus::Running),
            "successful" => Ok(ExecutionStatus::Successful),
            "failed" => Ok(ExecutionStatus::Failed),
            "killed" => Ok(ExecutionStatus::Killed),
            other => Err(RundagError::Config(format!(
                "unknown execution status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Successful | ExecutionStatus::Failed | ExecutionStatus::Killed
        )
    }

    /// Whether `next` is a legal successor. Every status may move (back) to
    /// `running` — that is how a finished execution is resumed — but
    /// terminal statuses never replace one another.
    fn allows(self, next: ExecutionStatus) -> bool {
        match (self, next) {
            (_, ExecutionStatus::Running) => true,
            (ExecutionStatus::NoAttempt | ExecutionStatus::Running, n) => n.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The primary object. An execution is an instantiation of a recipe being
/// run.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: ExecutionId,
    pub name: String,
    pub description: Option<String>,
    pub successful: bool,
    /// Immutable after creation.
    pub output_dir: PathBuf,
    pub created_on: DateTime<Utc>,
    pub started_on: Option<DateTime<Utc>>,
    pub finished_on: Option<DateTime<Utc>>,
    /// `None` means unbounded.
    pub max_cpus: Option<u32>,
    /// Free-form metadata, serialized as JSON on every commit.
    pub info: Map<String, Value>,
    status: ExecutionStatus,
}

impl Execution {
    /// A fresh execution. Pass `id != 0` to reuse a prior id on restart.
    pub fn new(
        id: ExecutionId,
        name: String,
        output_dir: PathBuf,
        max_cpus: Option<u32>,
        description: Option<String>,
    ) -> Result<Self> {
        validate_word_name("execution", &name)?;
        Ok(Self {
            id,
            name,
            description,
            successful: false,
            output_dir,
            created_on: Utc::now(),
            started_on: None,
            finished_on: None,
            max_cpus,
            info: Map::new(),
            status: ExecutionStatus::NoAttempt,
        })
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Change the status, returning whether anything changed.
    ///
    /// On a real change this maintains the derived fields — `finished_on`
    /// is set iff the status is terminal, `successful` is true iff the
    /// status is successful — and logs the transition. The caller is
    /// responsible for committing afterwards.
    pub fn set_status(&mut self, status: ExecutionStatus) -> bool {
        if self.status == status {
            return false;
        }
        if !self.status.allows(status) {
            warn!(
                execution = %self.name,
                from = %self.status,
                to = %status,
                "ignoring non-monotonic execution status transition"
            );
            return false;
        }

        self.status = status;
        if status.is_terminal() {
            self.finished_on = Some(Utc::now());
        } else {
            // A new attempt on a previously finished execution.
            self.finished_on = None;
            self.successful = false;
        }
        if status == ExecutionStatus::Successful {
            self.successful = true;
        }
        info!(
            execution = %self.name,
            status = %status,
            output_dir = %self.output_dir.display(),
            "execution status changed"
        );
        true
    }

    /// Restore a persisted status without observer side effects. Store use
    /// only.
    pub(crate) fn restore_status(&mut self, status: ExecutionStatus) {
        self.status = status;
    }
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Execution[{}] {}", self.id, self.name)
    }
}
