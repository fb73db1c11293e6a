// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default size of the per-run output buffer.
pub const DEFAULT_OUTPUT_BUFFER_LIMIT_BYTES: usize = 64 * 1024;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// command = "cargo"
/// args = ["test"]
/// working_dir = "."
/// debounce_ms = 200
/// output_buffer_limit_bytes = 65536
///
/// [watch]
/// include = ["src/**/*.rs", "tests/**/*.rs"]
/// exclude = ["target/**"]
/// ```
///
/// Every key is optional here; [`ConfigFile::try_from`] decides what is
/// actually required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Program to run (or the whole command line when `shell = true`).
    #[serde(default)]
    pub command: String,

    /// Arguments passed to `command`, in order.
    #[serde(default)]
    pub args: Vec<String>,

    /// Directory the command runs in and the watcher observes.
    ///
    /// Relative paths are resolved against the config file's directory by
    /// the loader.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Run through `sh -c` instead of spawning `command` directly.
    #[serde(default)]
    pub shell: bool,

    /// Suppress triggers closer together than this many milliseconds.
    #[serde(default)]
    pub debounce_ms: u64,

    /// Upper bound for the captured output of a single run.
    #[serde(default = "default_output_buffer_limit_bytes")]
    pub output_buffer_limit_bytes: usize,

    /// Start one run as soon as the tool is up, without waiting for a save.
    #[serde(default)]
    pub run_on_start: bool,

    /// `[watch]` section.
    #[serde(default)]
    pub watch: WatchSection,
}

fn default_output_buffer_limit_bytes() -> usize {
    DEFAULT_OUTPUT_BUFFER_LIMIT_BYTES
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            working_dir: None,
            shell: false,
            debounce_ms: 0,
            output_buffer_limit_bytes: default_output_buffer_limit_bytes(),
            run_on_start: false,
            watch: WatchSection::default(),
        }
    }
}

impl RawConfigFile {
    /// Make a relative `working_dir` relative to `base` instead of the
    /// process working directory. A missing `working_dir` becomes `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        self.working_dir = Some(match self.working_dir.take() {
            Some(dir) if dir.is_relative() => base.join(dir),
            Some(dir) => dir,
            None => base.to_path_buf(),
        });
    }
}

/// `[watch]` section: which saved paths count as triggers.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Globs (relative to `working_dir`) a changed path must match.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Globs that veto a match from `include`.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec!["target/**".to_string(), ".git/**".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
        }
    }
}

/// The command a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub shell: bool,
}

impl RunCommand {
    /// Human-readable command line, used for logging and `--dry-run`.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    command: RunCommand,
    debounce: Duration,
    output_buffer_limit_bytes: usize,
    run_on_start: bool,
    watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        command: RunCommand,
        debounce: Duration,
        output_buffer_limit_bytes: usize,
        run_on_start: bool,
        watch: WatchSection,
    ) -> Self {
        Self {
            command,
            debounce,
            output_buffer_limit_bytes,
            run_on_start,
            watch,
        }
    }

    pub fn command(&self) -> &RunCommand {
        &self.command
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn output_buffer_limit_bytes(&self) -> usize {
        self.output_buffer_limit_bytes
    }

    pub fn run_on_start(&self) -> bool {
        self.run_on_start
    }

    pub fn watch_section(&self) -> &WatchSection {
        &self.watch
    }

    pub fn working_dir(&self) -> &Path {
        &self.command.working_dir
    }
}
