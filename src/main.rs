// src/main.rs

use std::process::ExitCode;

use tddwatch::{cli, logging, run};

/// Exit code for errors before the run loop starts (bad config, missing
/// program, unreadable file).
const STARTUP_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("tddwatch error: {err:?}");
        return ExitCode::from(STARTUP_ERROR);
    }

    match run(args).await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(err) => {
            eprintln!("tddwatch error: {err}");
            if err.is_configuration() {
                ExitCode::from(STARTUP_ERROR)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
