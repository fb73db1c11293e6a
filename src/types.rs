// src/types.rs

//! Small value types shared by the engine, the runner and the publisher.

use std::fmt;

use thiserror::Error;

/// Identifier of a single spawned run. Increases monotonically per runtime.
pub type RunId = u64;

/// Status of the most recent or current build/test invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    /// Nothing has run yet, or the last run was cancelled.
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn label(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Succeeded => "passed",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a run ended without producing an exit code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("terminated by signal {0}")]
    Signal(i32),

    #[error("cancelled")]
    Cancelled,

    #[error("waiting for process failed: {0}")]
    Wait(String),
}

/// Final result of one run, reported exactly once by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code.
    Failure(i32),
    Aborted(RunError),
}

impl RunOutcome {
    /// The state a finished run is displayed as.
    ///
    /// Aborted runs show as failed; the outcome itself still travels with the
    /// transition so subscribers can tell them apart.
    pub fn display_state(&self) -> RunState {
        match self {
            RunOutcome::Success => RunState::Succeeded,
            RunOutcome::Failure(_) | RunOutcome::Aborted(_) => RunState::Failed,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::Success => Some(0),
            RunOutcome::Failure(code) => Some(*code),
            RunOutcome::Aborted(_) => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => f.write_str("exit 0"),
            RunOutcome::Failure(code) => write!(f, "exit {code}"),
            RunOutcome::Aborted(err) => write!(f, "aborted ({err})"),
        }
    }
}

/// Where a save event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Fed directly through the event bus (editor hook, tests).
    Hook,
    /// Filesystem watcher.
    FileWatch,
    /// Startup trigger (`run_on_start`, `--once`).
    Startup,
}
