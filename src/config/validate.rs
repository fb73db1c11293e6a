// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, RunCommand};
use crate::errors::{Result, TddError};
use crate::watch::WatchPatterns;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TddError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let working_dir = match raw.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let command = RunCommand {
            program: raw.command.trim().to_string(),
            args: raw.args,
            working_dir,
            shell: raw.shell,
        };
        validate_program(&command)?;

        Ok(ConfigFile::new_unchecked(
            command,
            Duration::from_millis(raw.debounce_ms),
            raw.output_buffer_limit_bytes,
            raw.run_on_start,
            raw.watch,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_command(cfg)?;
    validate_working_dir(cfg)?;
    validate_limits(cfg)?;
    validate_watch_patterns(cfg)?;
    Ok(())
}

fn ensure_has_command(cfg: &RawConfigFile) -> Result<()> {
    if cfg.command.trim().is_empty() {
        return Err(TddError::ConfigError(
            "`command` must be set (in the config file or after `--` on the command line)"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_working_dir(cfg: &RawConfigFile) -> Result<()> {
    if let Some(dir) = &cfg.working_dir {
        if !dir.is_dir() {
            return Err(TddError::ConfigError(format!(
                "working_dir {:?} does not exist or is not a directory",
                dir
            )));
        }
    }
    Ok(())
}

fn validate_limits(cfg: &RawConfigFile) -> Result<()> {
    if cfg.output_buffer_limit_bytes == 0 {
        return Err(TddError::ConfigError(
            "output_buffer_limit_bytes must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch_patterns(cfg: &RawConfigFile) -> Result<()> {
    WatchPatterns::compile(&cfg.watch)
        .map_err(|e| TddError::ConfigError(format!("invalid [watch] pattern: {e:#}")))?;
    Ok(())
}

/// In direct mode the program must be launchable before we enter the run
/// loop. Shell commands are only checked when they run.
fn validate_program(command: &RunCommand) -> Result<()> {
    if command.shell {
        return Ok(());
    }
    match resolve_program(&command.program, &command.working_dir) {
        Some(_) => Ok(()),
        None => Err(TddError::CommandNotFound(command.program.clone())),
    }
}

/// Locate `program` the way a spawn would: paths with a separator are
/// resolved against `working_dir`, bare names are searched on `PATH`
/// (honouring `PATHEXT` on Windows).
pub fn resolve_program(program: &str, working_dir: &Path) -> Option<PathBuf> {
    which::which_in(program, std::env::var_os("PATH"), working_dir).ok()
}
