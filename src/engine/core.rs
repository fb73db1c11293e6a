// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state (current [`RunState`], run slot, pending rerun)
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the channel
//! - handing `ScheduledRun`s to the executor
//! - publishing transitions to subscribers
//!
//! The core does no IO and reads no clock: every time it needs comes in on
//! the event, which keeps debounce and coalescing testable without Tokio.

use std::time::Duration;

use crate::config::{ConfigFile, RunCommand};
use crate::engine::event_handlers::{
    CoreStep, RunPlan, handle_cancel, handle_run_finished, handle_save, handle_shutdown,
};
use crate::engine::slot::RunSlot;
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::types::{RunId, RunState};

/// Pure core runtime state.
///
/// This owns:
/// - the current `RunState` (the single source of truth for display)
/// - the run slot (single-flight guard, rerun flag, debounce window)
/// - what a run executes
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    plan: RunPlan,
    slot: RunSlot,
    state: RunState,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(
        command: RunCommand,
        debounce: Duration,
        output_limit_bytes: usize,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            plan: RunPlan {
                command,
                output_limit_bytes,
            },
            slot: RunSlot::new(debounce),
            state: RunState::Idle,
            options,
        }
    }

    pub fn from_config(cfg: &ConfigFile, options: RuntimeOptions) -> Self {
        Self::new(
            cfg.command().clone(),
            cfg.debounce(),
            cfg.output_buffer_limit_bytes(),
            options,
        )
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether a process currently occupies the slot (for tests).
    pub fn has_active_run(&self) -> bool {
        self.slot.is_occupied()
    }

    pub fn active_run_id(&self) -> Option<RunId> {
        self.slot.active_run_id()
    }

    pub fn rerun_pending(&self) -> bool {
        self.slot.rerun_pending()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::SaveDetected { at, source, .. } => {
                handle_save(&self.plan, &mut self.slot, &mut self.state, at, source)
            }
            RuntimeEvent::RunFinished { run_id, outcome } => handle_run_finished(
                &self.plan,
                &mut self.slot,
                &mut self.state,
                &self.options,
                run_id,
                outcome,
            ),
            RuntimeEvent::CancelRequested => {
                handle_cancel(&mut self.slot, &mut self.state, &self.options)
            }
            RuntimeEvent::ShutdownRequested => handle_shutdown(&mut self.slot),
            // Subscriber registry lives in the shell.
            RuntimeEvent::Subscribe { .. } | RuntimeEvent::Unsubscribe { .. } => {
                CoreStep::nothing()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Instant;

    use super::*;
    use crate::engine::CoreCommand;
    use crate::types::{RunError, RunOutcome, TriggerSource};

    fn core(debounce_ms: u64) -> CoreRuntime {
        CoreRuntime::new(
            RunCommand {
                program: "cargo".to_string(),
                args: vec!["test".to_string()],
                working_dir: PathBuf::from("."),
                shell: false,
            },
            Duration::from_millis(debounce_ms),
            1024,
            RuntimeOptions::default(),
        )
    }

    fn save(at: Instant) -> RuntimeEvent {
        RuntimeEvent::SaveDetected {
            at,
            source: TriggerSource::Hook,
            path: None,
        }
    }

    fn started(step: &CoreStep) -> Vec<RunId> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::StartRun(run) => Some(run.run_id),
                _ => None,
            })
            .collect()
    }

    fn published(step: &CoreStep) -> Vec<(RunState, RunState)> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Publish(t) => Some((t.old, t.new)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_save_starts_a_run() {
        let mut core = core(0);
        let step = core.step(save(Instant::now()));
        assert_eq!(started(&step), vec![1]);
        assert_eq!(published(&step), vec![(RunState::Idle, RunState::Running)]);
        assert_eq!(core.state(), RunState::Running);
        // Publish goes out before the executor is asked to start.
        assert!(matches!(step.commands[0], CoreCommand::Publish(_)));
    }

    #[test]
    fn saves_while_running_coalesce_into_one_rerun() {
        let mut core = core(0);
        let t0 = Instant::now();
        core.step(save(t0));
        for _ in 0..5 {
            let step = core.step(save(t0));
            assert!(step.commands.is_empty());
        }
        assert!(core.rerun_pending());

        let step = core.step(RuntimeEvent::RunFinished {
            run_id: 1,
            outcome: RunOutcome::Success,
        });
        assert_eq!(started(&step), vec![2]);
        assert_eq!(published(&step), vec![(RunState::Running, RunState::Running)]);

        let step = core.step(RuntimeEvent::RunFinished {
            run_id: 2,
            outcome: RunOutcome::Failure(1),
        });
        assert!(started(&step).is_empty());
        assert_eq!(published(&step), vec![(RunState::Running, RunState::Failed)]);
        assert!(!core.has_active_run());
    }

    #[test]
    fn rerun_transition_carries_previous_outcome() {
        let mut core = core(0);
        let t0 = Instant::now();
        core.step(save(t0));
        core.step(save(t0));
        let step = core.step(RuntimeEvent::RunFinished {
            run_id: 1,
            outcome: RunOutcome::Failure(2),
        });
        match &step.commands[0] {
            CoreCommand::Publish(t) => assert_eq!(t.outcome, Some(RunOutcome::Failure(2))),
            other => panic!("expected publish, got {other:?}"),
        }
    }

    #[test]
    fn aborted_run_displays_as_failed() {
        let mut core = core(0);
        core.step(save(Instant::now()));
        core.step(RuntimeEvent::RunFinished {
            run_id: 1,
            outcome: RunOutcome::Aborted(RunError::Spawn("command not found: cargo".into())),
        });
        assert_eq!(core.state(), RunState::Failed);
        // Not fatal: the next save starts a new run.
        let step = core.step(save(Instant::now()));
        assert_eq!(started(&step), vec![2]);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut core = core(0);
        core.step(save(Instant::now()));
        let step = core.step(RuntimeEvent::RunFinished {
            run_id: 42,
            outcome: RunOutcome::Success,
        });
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), RunState::Running);
    }

    #[test]
    fn cancel_goes_idle_and_holds_slot_until_teardown() {
        let mut core = core(0);
        let t0 = Instant::now();
        core.step(save(t0));
        core.step(save(t0));

        let step = core.step(RuntimeEvent::CancelRequested);
        assert!(matches!(step.commands[0], CoreCommand::CancelRun(1)));
        assert_eq!(published(&step), vec![(RunState::Running, RunState::Idle)]);
        assert_eq!(core.state(), RunState::Idle);
        assert!(!core.rerun_pending(), "cancel discards the pending rerun");

        // Save after cancel, while the old process is still dying.
        let step = core.step(save(t0));
        assert!(started(&step).is_empty());
        assert!(core.rerun_pending());

        let step = core.step(RuntimeEvent::RunFinished {
            run_id: 1,
            outcome: RunOutcome::Aborted(RunError::Cancelled),
        });
        assert_eq!(started(&step), vec![2]);
        assert_eq!(published(&step), vec![(RunState::Idle, RunState::Running)]);
    }

    #[test]
    fn cancelled_run_without_new_save_stays_idle() {
        let mut core = core(0);
        core.step(save(Instant::now()));
        core.step(RuntimeEvent::CancelRequested);
        let step = core.step(RuntimeEvent::RunFinished {
            run_id: 1,
            outcome: RunOutcome::Aborted(RunError::Cancelled),
        });
        assert!(step.commands.is_empty());
        assert_eq!(core.state(), RunState::Idle);
        assert!(!core.has_active_run());
    }

    #[test]
    fn cancel_when_idle_does_nothing() {
        let mut core = core(0);
        let step = core.step(RuntimeEvent::CancelRequested);
        assert!(step.commands.is_empty());
        assert!(step.keep_running);
    }

    #[test]
    fn debounce_suppresses_close_triggers() {
        let mut core = core(200);
        let t0 = Instant::now();
        core.step(save(t0));
        core.step(save(t0 + Duration::from_millis(50)));
        assert!(!core.rerun_pending(), "suppressed trigger must not arm a rerun");
        core.step(save(t0 + Duration::from_millis(250)));
        assert!(core.rerun_pending());
    }

    #[test]
    fn once_mode_exits_after_run_completes() {
        let mut core = CoreRuntime::new(
            RunCommand {
                program: "true".to_string(),
                args: Vec::new(),
                working_dir: PathBuf::from("."),
                shell: false,
            },
            Duration::ZERO,
            1024,
            RuntimeOptions {
                exit_when_idle: true,
            },
        );
        let step = core.step(save(Instant::now()));
        assert!(step.keep_running);
        let step = core.step(RuntimeEvent::RunFinished {
            run_id: 1,
            outcome: RunOutcome::Success,
        });
        assert!(!step.keep_running);
        assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));
    }

    #[test]
    fn shutdown_cancels_active_run() {
        let mut core = core(0);
        core.step(save(Instant::now()));
        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
        assert!(matches!(step.commands[0], CoreCommand::CancelRun(1)));
    }
}
