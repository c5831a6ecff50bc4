// src/model/mod.rs

//! Core entities: executions, stages, tasks.
//!
//! Entities live in arenas keyed by their store id and reference each other
//! by id only (`Task::stage_id`, `Stage::execution_id`), matching the
//! primary-key identity of the persistence layer.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, RundagError};

pub mod execution;
pub mod stage;
pub mod task;

pub use execution::{Execution, ExecutionStatus};
pub use stage::Stage;
pub use task::{Task, TaskFile, TaskStatus};

/// Row ids synthesised by the store; 0 means "not yet persisted".
pub type ExecutionId = i64;
pub type StageId = i64;
pub type TaskId = i64;

static WORD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("static regex"));

/// Execution and stage names double as directory components, so they are
/// restricted to word characters.
pub fn validate_word_name(kind: &str, name: &str) -> Result<()> {
    if WORD_NAME.is_match(name) {
        Ok(())
    } else {
        Err(RundagError::Config(format!(
            "invalid {kind} name '{name}' (word characters only)"
        )))
    }
}
