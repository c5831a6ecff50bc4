#![allow(dead_code)]

use std::path::Path;

use rundag::engine::{self, RunOptions, StartOptions};
use rundag::errors::Result;
use rundag::exec::JobManager;
use rundag::model::{Execution, ExecutionStatus};
use rundag::recipe::Recipe;
use rundag::store::Store;

pub use rundag_test_utils::init_tracing;

pub fn start_options(name: &str, output_dir: &Path) -> StartOptions {
    StartOptions {
        name: name.to_string(),
        output_dir: output_dir.to_path_buf(),
        restart: false,
        prompt_confirm: false,
        max_cpus: None,
        description: None,
    }
}

/// Start (or resume) `name` and run `recipe` against `jobmanager` with
/// default run options.
pub async fn start_and_run<J: JobManager>(
    store: &mut Store,
    name: &str,
    output_dir: &Path,
    max_cpus: Option<u32>,
    recipe: &Recipe,
    jobmanager: &mut J,
) -> (Execution, Result<ExecutionStatus>) {
    let mut opts = start_options(name, output_dir);
    opts.max_cpus = max_cpus;
    let mut execution = engine::start(store, opts).expect("start failed");
    let result = engine::run(
        store,
        &mut execution,
        recipe,
        jobmanager,
        RunOptions::default(),
    )
    .await;
    (execution, result)
}
