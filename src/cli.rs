// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `rundag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rundag",
    version,
    about = "Run a recipe of tasks as a DAG against a CPU budget.",
    long_about = None
)]
pub struct CliArgs {
    /// A name for this execution (word characters only).
    #[arg(short = 'n', long)]
    pub name: String,

    /// The directory to write output files to.
    ///
    /// Must not exist for a new execution. Defaults to
    /// `<root_output_dir>/<name>`.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of CPUs to use at once, based on the sum of the
    /// running tasks' cpu_req. 0 means unlimited.
    #[arg(short = 'c', long, value_name = "INT")]
    pub max_cpus: Option<u32>,

    /// Completely restart the execution, deleting all record of it in the
    /// database and its output directory first.
    #[arg(short = 'r', long)]
    pub restart: bool,

    /// Do not use confirmation prompts before restarting or deleting, and
    /// assume the answer is always yes.
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Path to the recipe file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Recipe.toml")]
    pub recipe: PathBuf,

    /// Path to the sqlite database.
    ///
    /// Defaults to `<root_output_dir>/rundag.db`.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Root directory used to derive default output and database paths.
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub root_output_dir: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Render the recipe, assign directories and commands, but don't
    /// schedule anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Reconstruct the command line that started this process, quoting
/// arguments that contain spaces. Recorded in `info["last_cmd_executed"]`.
pub fn last_cmd_executed() -> String {
    let mut args = std::env::args();
    let prog = args
        .next()
        .map(|p| {
            PathBuf::from(&p)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(p)
        })
        .unwrap_or_default();

    let mut parts = vec![prog];
    for arg in args {
        if arg.contains(' ') {
            parts.push(format!("'{arg}'"));
        } else {
            parts.push(arg);
        }
    }
    format!("$ {}", parts.join(" "))
}
