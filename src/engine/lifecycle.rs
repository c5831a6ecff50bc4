// src/engine/lifecycle.rs

//! Execution lifecycle: create, resume, restart, delete.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing::info;

use crate::errors::{Result, RundagError};
use crate::logging;
use crate::model::{Execution, validate_word_name};
use crate::store::Store;

/// Inputs to [`start`].
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub name: String,
    pub output_dir: PathBuf,
    /// Delete any prior execution with this name (and its output
    /// directory) before creating a fresh one.
    pub restart: bool,
    /// When false, destructive prompts are auto-confirmed.
    pub prompt_confirm: bool,
    pub max_cpus: Option<u32>,
    pub description: Option<String>,
}

/// Start, resume, or restart an execution by name.
///
/// - No prior execution: create the output directory (it must not already
///   exist) and a fresh record.
/// - Prior execution, `restart == false`: resume; every task that did not
///   succeed is pruned, the rest is kept. The output directory must match
///   the stored one.
/// - Prior execution, `restart == true`: after confirmation, delete the
///   record (cascading to tasks) and its output directory, then create
///   fresh, reusing the prior id.
///
/// Every mode records `info["last_cmd_executed"]` and commits.
pub fn start(store: &mut Store, opts: StartOptions) -> Result<Execution> {
    validate_word_name("execution", &opts.name)?;

    let mut old_id = 0;
    if opts.restart {
        if let Some(existing) = store.find_execution_by_name(&opts.name)? {
            old_id = existing.id;
            let msg = format!(
                "Are you sure you want to delete {} and all records of execution '{}'?",
                existing.output_dir.display(),
                existing.name
            );
            if opts.prompt_confirm && !confirm(&msg)? {
                return Err(RundagError::Aborted);
            }
            delete(store, existing, true)?;
        }
    }

    let version_banner = format!("Execution started, rundag v{}", env!("CARGO_PKG_VERSION"));

    let mut execution = match store.find_execution_by_name(&opts.name)? {
        Some(mut existing) => {
            // Resuming.
            if existing.output_dir != opts.output_dir {
                return Err(RundagError::Config(format!(
                    "cannot change the output_dir of execution '{}' being resumed ({} != {})",
                    existing.name,
                    existing.output_dir.display(),
                    opts.output_dir.display()
                )));
            }
            existing.max_cpus = opts.max_cpus;
            fs::create_dir_all(&existing.output_dir)?;
            logging::attach_execution_log(&existing.output_dir.join("execution.log"))?;
            info!(execution = %existing.name, "{version_banner}");

            let pruned = store.delete_unsuccessful_tasks(existing.id)?;
            if pruned > 0 {
                info!(execution = %existing.name, "Deleting {pruned} unsuccessful tasks");
            }
            existing
        }
        None => {
            // Starting from scratch.
            if opts.output_dir.exists() {
                return Err(RundagError::Config(format!(
                    "{} already exists",
                    opts.output_dir.display()
                )));
            }
            fs::create_dir_all(&opts.output_dir)?;
            logging::attach_execution_log(&opts.output_dir.join("execution.log"))?;

            let mut execution = Execution::new(
                old_id,
                opts.name,
                opts.output_dir,
                opts.max_cpus,
                opts.description,
            )?;
            info!(execution = %execution.name, "{version_banner}");
            store.insert_execution(&mut execution)?;
            execution
        }
    };

    execution.info.insert(
        "last_cmd_executed".to_string(),
        crate::cli::last_cmd_executed().into(),
    );
    store.commit_execution(&execution)?;
    Ok(execution)
}

/// Delete an execution record (cascading to stages, tasks and files),
/// optionally removing its output directory from disk.
pub fn delete(store: &mut Store, execution: Execution, delete_output_dir: bool) -> Result<()> {
    if delete_output_dir && execution.output_dir.exists() {
        info!(
            execution = %execution.name,
            "Deleting {}",
            execution.output_dir.display()
        );
        fs::remove_dir_all(&execution.output_dir)?;
    }
    store.delete_execution(&execution)
}

/// Interactive yes/no prompt on stderr/stdin.
fn confirm(msg: &str) -> Result<bool> {
    eprint!("{msg} [y/N] ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
