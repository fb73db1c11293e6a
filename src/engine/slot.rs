// src/engine/slot.rs

use std::time::{Duration, Instant};

use tracing::debug;

use crate::exec::OutputRef;
use crate::types::RunId;

/// The single child-process slot plus everything that guards it.
///
/// Semantics:
/// - At most one run occupies the slot. The slot is only released when the
///   runner reports completion for the run id that occupies it, so a
///   cancelled run keeps the slot until its process group is torn down.
/// - Triggers that arrive while the slot is occupied are coalesced into a
///   single `rerun_pending` flag; N triggers still mean one rerun.
/// - With a non-zero `debounce`, a trigger closer than `debounce` to the
///   previous *accepted* trigger is dropped entirely.
#[derive(Debug)]
pub struct RunSlot {
    debounce: Duration,
    last_accepted: Option<Instant>,
    active: Option<ActiveRun>,
    rerun_pending: bool,
    next_run_id: RunId,
}

#[derive(Debug)]
struct ActiveRun {
    run_id: RunId,
    cancelled: bool,
    output: OutputRef,
}

/// What the slot held when a run was released.
#[derive(Debug)]
pub struct ReleasedRun {
    pub run_id: RunId,
    pub cancelled: bool,
    pub output: OutputRef,
}

impl RunSlot {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_accepted: None,
            active: None,
            rerun_pending: false,
            next_run_id: 1,
        }
    }

    /// Apply the debounce window to a trigger stamped `at`.
    ///
    /// Returns false if the trigger must be ignored. Accepted triggers move
    /// the window forward; suppressed ones do not.
    pub fn accept_trigger(&mut self, at: Instant) -> bool {
        if !self.debounce.is_zero() {
            if let Some(prev) = self.last_accepted {
                let gap = at.saturating_duration_since(prev);
                if gap < self.debounce {
                    debug!(
                        gap_ms = gap.as_millis() as u64,
                        debounce_ms = self.debounce.as_millis() as u64,
                        "trigger suppressed by debounce window"
                    );
                    return false;
                }
            }
        }
        self.last_accepted = Some(at);
        true
    }

    pub fn is_occupied(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_run_id(&self) -> Option<RunId> {
        self.active.as_ref().map(|a| a.run_id)
    }

    /// Whether the occupying run was cancelled and is only draining.
    pub fn is_draining(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.cancelled)
    }

    pub fn rerun_pending(&self) -> bool {
        self.rerun_pending
    }

    /// Put a new run into the free slot and return its id.
    ///
    /// Callers must check [`is_occupied`](Self::is_occupied) first; occupying
    /// a busy slot is a logic error in the core.
    pub fn occupy(&mut self, output: OutputRef) -> RunId {
        debug_assert!(self.active.is_none(), "run slot occupied twice");
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.rerun_pending = false;
        self.active = Some(ActiveRun {
            run_id,
            cancelled: false,
            output,
        });
        run_id
    }

    pub fn mark_pending(&mut self) {
        if !self.rerun_pending {
            debug!("run in progress; rerun marked pending");
        }
        self.rerun_pending = true;
    }

    /// Consume the pending flag.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.rerun_pending)
    }

    /// Flag the active run as cancelled and drop any pending rerun.
    ///
    /// Returns the run id and its output if there was an uncancelled run.
    pub fn cancel(&mut self) -> Option<(RunId, OutputRef)> {
        self.rerun_pending = false;
        let active = self.active.as_mut()?;
        if active.cancelled {
            return None;
        }
        active.cancelled = true;
        Some((active.run_id, active.output.clone()))
    }

    /// Free the slot if `run_id` is the run occupying it.
    ///
    /// Completions for any other id are stale and return `None`.
    pub fn release(&mut self, run_id: RunId) -> Option<ReleasedRun> {
        match &self.active {
            Some(active) if active.run_id == run_id => {}
            _ => return None,
        }
        self.active.take().map(|a| ReleasedRun {
            run_id: a.run_id,
            cancelled: a.cancelled,
            output: a.output,
        })
    }
}
