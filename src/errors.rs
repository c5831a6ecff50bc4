// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RundagError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A task with `must_succeed` ended with a non-zero exit status.
    #[error("task {task} failed and must succeed")]
    ExecutionFailed { task: String },

    /// Cooperative termination was requested (SIGINT).
    #[error("execution terminated")]
    Interrupted,

    /// The user declined a confirmation prompt.
    #[error("aborted by user")]
    Aborted,

    #[error("illegal task state transition: {0}")]
    TaskState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("recipe parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cycle detected in stage DAG: {0}")]
    DagCycle(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RundagError>;
