// src/dag/mod.rs

//! Task DAG structures and the scheduler that drains them.
//!
//! - [`graph`] holds the dependency graphs and the mutable view of
//!   remaining work.
//! - [`scheduler`] admits ready tasks against the CPU budget and drives
//!   the completion-drain loop.

pub mod graph;
pub mod scheduler;

pub use graph::{DepGraph, GraphView};
pub use scheduler::{DrainSummary, Scheduler};
