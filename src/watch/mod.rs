// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling the `[watch]` include / exclude glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Relativizing changed paths against the working directory.
//!
//! It makes no run decisions; it only turns filesystem changes into save
//! events on the [`EventBus`](crate::bus::EventBus).

pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::WatchPatterns;
pub use watcher::{WatcherHandle, spawn_watcher};
