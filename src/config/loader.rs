// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated config.
///
/// A relative (or missing) `working_dir` is anchored at the directory that
/// contains the file, so `tddwatch --config sub/Tddwatch.toml` behaves the
/// same no matter where it is started from.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: RawConfigFile = toml::from_str(&contents)?;
    config.resolve_relative_to(&config_root_dir(path));

    Ok(config)
}

/// Load a configuration file and validate it.
///
/// This is what the binary uses when no CLI overrides are involved:
/// - reads TOML,
/// - applies defaults (via `serde` defaults),
/// - checks the command, working directory, limits and glob patterns.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Tddwatch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Tddwatch.toml")
}

/// Directory that relative paths inside a config file are resolved against.
///
/// A bare filename has an empty parent; in that case we fall back to the
/// current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
