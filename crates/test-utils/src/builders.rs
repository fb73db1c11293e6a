#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tddwatch::config::{ConfigFile, RawConfigFile, WatchSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    /// Direct-mode command, e.g. `ConfigFileBuilder::new("true")`.
    pub fn new(command: &str) -> Self {
        Self {
            config: RawConfigFile {
                command: command.to_string(),
                ..RawConfigFile::default()
            },
        }
    }

    /// Shell-mode command line, e.g. `ConfigFileBuilder::shell("exit 1")`.
    pub fn shell(line: &str) -> Self {
        Self::new(line).with_shell(true)
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.config.args.push(arg.to_string());
        self
    }

    pub fn with_shell(mut self, shell: bool) -> Self {
        self.config.shell = shell;
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    pub fn output_limit(mut self, bytes: usize) -> Self {
        self.config.output_buffer_limit_bytes = bytes;
        self
    }

    pub fn run_on_start(mut self, yes: bool) -> Self {
        self.config.run_on_start = yes;
        self
    }

    pub fn watch(mut self, include: &[&str], exclude: &[&str]) -> Self {
        self.config.watch = WatchSection {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        };
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Write `contents` to `<dir>/Tddwatch.toml` and return its path.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("Tddwatch.toml");
    std::fs::write(&path, contents).expect("writing test config");
    path
}
