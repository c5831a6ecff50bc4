// src/logging.rs

//! Logging setup for `rundag` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the stderr log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `RUNDAG_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Besides the stderr layer, the subscriber carries a reloadable file layer
//! that is pointed at `<output_dir>/execution.log` once the execution's
//! output directory exists. Logs go to STDERR so that command stdout stays
//! free for task output.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::{Result, anyhow};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use crate::cli::LogLevel;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

static EXECUTION_LOG: OnceLock<reload::Handle<Option<BoxedLayer>, Registry>> = OnceLock::new();

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(level_str(lvl)),
        None => EnvFilter::try_from_env("RUNDAG_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (file_layer, handle) = reload::Layer::new(None::<BoxedLayer>);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(filter),
        )
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))?;

    let _ = EXECUTION_LOG.set(handle);
    Ok(())
}

/// Point the file layer at an execution's `execution.log`.
///
/// A no-op when [`init_logging`] was never called (e.g. library use from
/// tests). The file is opened in append mode so resumed executions keep
/// their history.
pub fn attach_execution_log(path: &Path) -> Result<()> {
    let Some(handle) = EXECUTION_LOG.get() else {
        return Ok(());
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Arc::new(file))
        .with_filter(LevelFilter::DEBUG)
        .boxed();

    handle
        .reload(Some(layer))
        .map_err(|e| anyhow!("attaching execution log at {}: {e}", path.display()))?;
    Ok(())
}

fn level_str(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
