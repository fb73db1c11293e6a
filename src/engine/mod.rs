// src/engine/mod.rs

//! Trigger controller for tddwatch.
//!
//! This module ties together:
//! - the run slot (single-flight guard, coalesced rerun flag, debounce)
//! - the state machine deciding when to start, finish or cancel a run
//! - the runtime event loop that reacts to:
//!   - save events from hosts (editor hook, file watcher, stdin)
//!   - run completion events from the process runner
//!   - cancel / subscribe / shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::RunCommand;
use crate::exec::OutputRef;
use crate::status::{Subscriber, SubscriptionId};
use crate::types::{RunId, RunOutcome, TriggerSource};

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once no run is active and none is pending
    /// (used for `--once`).
    pub exit_when_idle: bool,
}

/// Everything the process runner needs to execute one run.
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub run_id: RunId,
    pub command: RunCommand,
    /// Fresh buffer for this run's output.
    pub output: OutputRef,
    /// Timestamp of the save event that caused the run.
    pub requested_at: Instant,
}

/// Events flowing into the runtime from hosts and the executor.
pub enum RuntimeEvent {
    /// A relevant file was saved.
    SaveDetected {
        at: Instant,
        source: TriggerSource,
        path: Option<PathBuf>,
    },
    /// Explicit user request to stop the current run.
    CancelRequested,
    /// The runner finished a run (exactly once per run id).
    RunFinished { run_id: RunId, outcome: RunOutcome },
    /// Register a status subscriber. Handled by the shell, not the core.
    Subscribe {
        id: SubscriptionId,
        subscriber: Box<dyn Subscriber>,
    },
    /// Remove a status subscriber. Handled by the shell, not the core.
    Unsubscribe { id: SubscriptionId },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

impl RuntimeEvent {
    /// Save event stamped with the current time.
    pub fn save_now(source: TriggerSource, path: Option<PathBuf>) -> Self {
        RuntimeEvent::SaveDetected {
            at: Instant::now(),
            source,
            path,
        }
    }
}

impl fmt::Debug for RuntimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEvent::SaveDetected { at, source, path } => f
                .debug_struct("SaveDetected")
                .field("at", at)
                .field("source", source)
                .field("path", path)
                .finish(),
            RuntimeEvent::CancelRequested => f.write_str("CancelRequested"),
            RuntimeEvent::RunFinished { run_id, outcome } => f
                .debug_struct("RunFinished")
                .field("run_id", run_id)
                .field("outcome", outcome)
                .finish(),
            RuntimeEvent::Subscribe { id, .. } => f
                .debug_struct("Subscribe")
                .field("id", id)
                .finish_non_exhaustive(),
            RuntimeEvent::Unsubscribe { id } => {
                f.debug_struct("Unsubscribe").field("id", id).finish()
            }
            RuntimeEvent::ShutdownRequested => f.write_str("ShutdownRequested"),
        }
    }
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod slot;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
pub use slot::RunSlot;
