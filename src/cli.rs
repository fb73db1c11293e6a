// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `tddwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tddwatch",
    version,
    about = "Re-run your build/test command every time you save.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Tddwatch.toml` in the current working directory. Optional
    /// when a command is given after `--`.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Run the command once, then exit with 0 (passed) or 1 (failed).
    #[arg(long)]
    pub once: bool,

    /// Parse + validate, print the effective configuration, but don't run.
    #[arg(long)]
    pub dry_run: bool,

    /// Read `save` / `cancel` / `status` / `quit` commands from stdin.
    #[arg(long)]
    pub stdin: bool,

    /// Don't start the filesystem watcher (use with `--stdin`).
    #[arg(long)]
    pub no_watch: bool,

    /// Run the command through `sh -c`.
    #[arg(long)]
    pub shell: bool,

    /// Override `debounce_ms` from the config file.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TDDWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Status line without colours.
    #[arg(long)]
    pub plain: bool,

    /// Command to run, overriding `command` / `args` from the config file.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_command_and_flags() {
        let args = CliArgs::try_parse_from([
            "tddwatch",
            "--once",
            "--debounce-ms",
            "150",
            "--",
            "cargo",
            "test",
            "--quiet",
        ])
        .unwrap();
        assert!(args.once);
        assert_eq!(args.debounce_ms, Some(150));
        assert_eq!(args.command, vec!["cargo", "test", "--quiet"]);
        assert_eq!(args.config, default_config_path());
    }

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["tddwatch"]).unwrap();
        assert!(!args.once && !args.stdin && !args.no_watch && !args.plain);
        assert!(args.command.is_empty());
        assert!(args.log_level.is_none());
    }
}
