// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the configured command
//! with `tokio::process::Command` and reporting back to the runtime via
//! `RuntimeEvent::RunFinished`.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `RealExecutorBackend` the runtime uses in production; tests replace it
//!   with a fake.
//! - [`task_runner`] runs one command: spawn, capture, wait or cancel.
//! - [`process`] owns a child's identity and tears its process group down.
//! - [`output`] is the bounded per-run output buffer.

pub mod backend;
pub mod output;
pub mod process;
pub mod task_runner;

pub use backend::{BackendFuture, ExecutorBackend, RealExecutorBackend};
pub use output::{OutputBuffer, OutputRef};
pub use process::ProcessHandle;
