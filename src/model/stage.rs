// src/model/stage.rs

use crate::model::{ExecutionId, StageId};

/// A named group of tasks with a common tool. Organisational only; carries
/// no scheduling semantics. Unique per execution by name.
#[derive(Debug, Clone)]
pub struct Stage {
    pub id: StageId,
    pub execution_id: ExecutionId,
    pub name: String,
}
