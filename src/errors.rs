// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TddError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TddError {
    /// True for errors that stop the tool before its run loop starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TddError::ConfigError(_) | TddError::CommandNotFound(_) | TddError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TddError>;
