// src/lib.rs

//! rundag runs recipes of tasks organised as a DAG: it schedules ready
//! tasks under a global CPU budget, dispatches them to a job manager,
//! records every outcome in SQLite, and drives the execution to a terminal
//! state. Named executions can be resumed (completed work is kept) or
//! restarted from scratch.

pub mod cli;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod model;
pub mod recipe;
pub mod store;

use tracing::info;

use crate::cli::CliArgs;
use crate::engine::{RunOptions, StartOptions};
use crate::errors::{Result, RundagError};
use crate::exec::LocalJobManager;
use crate::model::ExecutionStatus;
use crate::store::Store;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - recipe loading
/// - the sqlite store
/// - lifecycle start (create / resume / restart)
/// - the local job manager and the run itself
pub async fn run(args: CliArgs) -> Result<ExecutionStatus> {
    let root = &args.root_output_dir;
    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => {
            if !root.exists() {
                return Err(RundagError::Config(format!(
                    "root_output_dir {} does not exist",
                    root.display()
                )));
            }
            root.join(&args.name)
        }
    };
    let db_path = args.db.clone().unwrap_or_else(|| root.join("rundag.db"));

    let recipe = recipe::load_and_validate(&args.recipe)?;
    let mut store = Store::open(&db_path)?;

    // 0 from the CLI means "no limit".
    let max_cpus = args.max_cpus.filter(|&n| n > 0);

    let mut execution = engine::start(
        &mut store,
        StartOptions {
            name: args.name.clone(),
            output_dir,
            restart: args.restart,
            prompt_confirm: !args.yes,
            max_cpus,
            description: recipe.description().map(str::to_string),
        },
    )?;

    let mut jobmanager = LocalJobManager::new();
    let opts = RunOptions {
        dry: args.dry_run,
        ..RunOptions::default()
    };
    let status = engine::run(&mut store, &mut execution, &recipe, &mut jobmanager, opts).await?;
    info!(execution = %execution.name, status = %status, "run finished");
    Ok(status)
}
