// src/status/mod.rs

//! Observable run status.
//!
//! - [`publisher`] owns the current [`StatusSnapshot`] and the ordered list
//!   of subscribers, and is driven only by the runtime shell.
//! - [`glyph`] maps a state to the small coloured indicator shown on a
//!   status line.
//! - [`sinks`] holds the built-in subscribers (tracing log, terminal status
//!   line).

use std::time::SystemTime;

use crate::exec::OutputRef;
use crate::types::{RunId, RunOutcome, RunState};

pub mod glyph;
pub mod publisher;
pub mod sinks;

pub use glyph::StatusGlyph;
pub use publisher::{StatusPublisher, StatusReader};
pub use sinks::{LogSubscriber, StatusLine};

/// Handle returned by `subscribe`, used to unsubscribe again.
pub type SubscriptionId = u64;

/// One state change, delivered to every subscriber in order.
#[derive(Debug, Clone)]
pub struct Transition {
    pub old: RunState,
    pub new: RunState,
    /// Run the transition belongs to (the new run for `→ Running`).
    pub run_id: Option<RunId>,
    /// Output buffer of the run the transition belongs to.
    pub output: Option<OutputRef>,
    /// Outcome of the run that just ended, if one did.
    ///
    /// Set on `Running → Succeeded/Failed` and on a `Running → Running`
    /// rerun, where it reports the run being replaced.
    pub outcome: Option<RunOutcome>,
}

/// Receives state transitions. Called on the runtime task, synchronously.
///
/// Implementations must not block; anything slow belongs on another task.
pub trait Subscriber: Send {
    fn on_transition(&mut self, transition: &Transition);
}

impl<F> Subscriber for F
where
    F: FnMut(&Transition) + Send,
{
    fn on_transition(&mut self, transition: &Transition) {
        self(transition)
    }
}

/// Point-in-time view of the status, for hosts that poll.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub state: RunState,
    /// Output of the current run, or of the last one if none is running.
    pub output: Option<OutputRef>,
    pub last_outcome: Option<RunOutcome>,
    /// Wall-clock time the last run finished.
    pub last_finished: Option<SystemTime>,
    pub runs_started: u64,
}
