// src/lib.rs

pub mod bus;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod status;
pub mod types;
pub mod watch;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, RawConfigFile, load_from_path};
use crate::engine::{CoreRuntime, Runtime, RuntimeOptions};
use crate::errors::{Result, TddError};
use crate::exec::RealExecutorBackend;
use crate::status::{LogSubscriber, StatusLine, StatusSnapshot};
use crate::types::{RunOutcome, TriggerSource};
use crate::watch::WatchPatterns;

/// How the tool ended, mapped to a process exit code by `main.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Clean stop, or a passing `--once` run.
    Clean,
    /// A `--once` run that failed or never finished.
    RunFailed,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Exit::Clean => 0,
            Exit::RunFailed => 1,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides
/// - event bus / core / runtime
/// - process executor
/// - built-in subscribers (log, status line)
/// - (optional) file watcher and stdin protocol host
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<Exit> {
    let cfg = build_config(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(Exit::Clean);
    }

    let (bus, endpoint) = EventBus::channel();

    // Process executor backend (real implementation in production).
    let executor = RealExecutorBackend::new(bus.sender());

    // Subscribers are registered before any trigger is fed, so they see the
    // very first transition.
    bus.subscribe(LogSubscriber);
    bus.subscribe(StatusLine::stderr(!args.plain));

    // Optional file watcher (disabled in --once / --no-watch mode).
    let _watcher_handle = if !args.once && !args.no_watch {
        let patterns = WatchPatterns::compile(cfg.watch_section())?;
        Some(crate::watch::spawn_watcher(
            cfg.working_dir(),
            patterns,
            bus.clone(),
        )?)
    } else {
        None
    };

    if args.stdin {
        let bus = bus.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::bus::stdin::run_stdin_host(bus).await {
                warn!(error = %e, "stdin host stopped");
            }
        });
    }

    // Ctrl-C → graceful shutdown.
    {
        let bus = bus.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            bus.request_shutdown();
        });
    }

    if args.once || cfg.run_on_start() {
        bus.feed_trigger(TriggerSource::Startup);
    }

    let options = RuntimeOptions {
        exit_when_idle: args.once,
    };

    // Construct the pure core runtime (single source of truth for semantics).
    let core = CoreRuntime::from_config(&cfg, options);

    info!(
        command = %cfg.command().display(),
        working_dir = ?cfg.working_dir(),
        "tddwatch ready"
    );

    // Construct the async IO shell around the core.
    let runtime = Runtime::new(core, endpoint, executor);
    let last = runtime.run().await?;

    Ok(exit_for(args.once, &last))
}

/// Effective configuration: the config file (if needed or present) with the
/// CLI overrides applied, then validated.
pub fn build_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = raw_config_for(&args.config, !args.command.is_empty())?;

    if let Some((program, rest)) = args.command.split_first() {
        raw.command = program.clone();
        raw.args = rest.to_vec();
    }
    if args.shell {
        raw.shell = true;
    }
    if let Some(ms) = args.debounce_ms {
        raw.debounce_ms = ms;
    }

    ConfigFile::try_from(raw)
}

/// The config file is required unless the command comes from the CLI; in
/// that case a missing file just means "all defaults".
fn raw_config_for(config_path: &Path, command_on_cli: bool) -> Result<RawConfigFile> {
    if command_on_cli && !config_path.exists() {
        debug!(?config_path, "no config file; using defaults");
        let mut raw = RawConfigFile::default();
        raw.resolve_relative_to(&std::env::current_dir()?);
        return Ok(raw);
    }

    load_from_path(config_path).map_err(|e| match e {
        TddError::IoError(io) => {
            TddError::ConfigError(format!("reading {}: {io}", config_path.display()))
        }
        other => other,
    })
}

fn exit_for(once: bool, last: &StatusSnapshot) -> Exit {
    if !once {
        return Exit::Clean;
    }
    match last.last_outcome {
        Some(RunOutcome::Success) => Exit::Clean,
        _ => Exit::RunFailed,
    }
}

/// Simple dry-run output: print the effective configuration.
fn print_dry_run(cfg: &ConfigFile) {
    let command = cfg.command();
    println!("tddwatch dry-run");
    println!("  command = {}", command.display());
    println!("  shell = {}", command.shell);
    println!("  working_dir = {}", cfg.working_dir().display());
    println!("  debounce_ms = {}", cfg.debounce().as_millis());
    println!(
        "  output_buffer_limit_bytes = {}",
        cfg.output_buffer_limit_bytes()
    );
    println!("  run_on_start = {}", cfg.run_on_start());

    let watch = cfg.watch_section();
    println!("  watch.include = {:?}", watch.include);
    if !watch.exclude.is_empty() {
        println!("  watch.exclude = {:?}", watch.exclude);
    }

    debug!("dry-run complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunError;

    #[test]
    fn once_exit_follows_last_outcome() {
        let mut snap = StatusSnapshot::default();
        assert_eq!(exit_for(false, &snap), Exit::Clean);
        assert_eq!(exit_for(true, &snap), Exit::RunFailed);

        snap.last_outcome = Some(RunOutcome::Success);
        assert_eq!(exit_for(true, &snap), Exit::Clean);

        snap.last_outcome = Some(RunOutcome::Failure(101));
        assert_eq!(exit_for(true, &snap), Exit::RunFailed);
        assert_eq!(exit_for(false, &snap), Exit::Clean);

        snap.last_outcome = Some(RunOutcome::Aborted(RunError::Signal(9)));
        assert_eq!(exit_for(true, &snap), Exit::RunFailed);
    }
}
