// src/main.rs

use std::process::ExitCode;

use rundag::errors::RundagError;
use rundag::model::ExecutionStatus;
use rundag::{cli, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("rundag: failed to initialise logging: {err:?}");
        return ExitCode::FAILURE;
    }

    let dry = args.dry_run;
    match rundag::run(args).await {
        Ok(ExecutionStatus::Successful) => ExitCode::SUCCESS,
        Ok(_) if dry => ExitCode::SUCCESS,
        Ok(status) => {
            eprintln!("rundag: execution finished with status {status}");
            ExitCode::FAILURE
        }
        Err(RundagError::Interrupted) => {
            eprintln!("Execution terminated with a SIGINT (ctrl+c) event");
            ExitCode::from(130)
        }
        Err(err) => {
            eprintln!("rundag error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
