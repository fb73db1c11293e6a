// src/config/mod.rs

//! Configuration loading and validation for tddwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into a [`ConfigFile`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, DEFAULT_OUTPUT_BUFFER_LIMIT_BYTES, RawConfigFile, RunCommand, WatchSection,
};
pub use validate::resolve_program;
