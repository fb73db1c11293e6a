// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::RunCommand;
use crate::engine::slot::RunSlot;
use crate::engine::{RuntimeOptions, ScheduledRun};
use crate::exec::OutputBuffer;
use crate::status::Transition;
use crate::types::{RunId, RunOutcome, RunState, TriggerSource};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand this run to the executor.
    StartRun(ScheduledRun),
    /// Ask the executor to stop this run.
    CancelRun(RunId),
    /// Push a state change to the status publisher.
    Publish(Transition),
    /// Request that the process exits (used for `--once` when idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn keep_going(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn nothing() -> Self {
        Self::keep_going(Vec::new())
    }
}

/// What a run executes and how much output it may keep.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub command: RunCommand,
    pub output_limit_bytes: usize,
}

/// Handle a save event.
///
/// - Inside the debounce window: ignored.
/// - Process slot busy (running, or a cancelled run still draining): the
///   trigger becomes the single pending rerun.
/// - Otherwise a new run starts right away.
pub fn handle_save(
    plan: &RunPlan,
    slot: &mut RunSlot,
    state: &mut RunState,
    at: Instant,
    source: TriggerSource,
) -> CoreStep {
    if !slot.accept_trigger(at) {
        return CoreStep::nothing();
    }

    if slot.is_occupied() {
        debug!(
            ?source,
            active = ?slot.active_run_id(),
            draining = slot.is_draining(),
            "save while a run occupies the slot; coalescing"
        );
        slot.mark_pending();
        return CoreStep::nothing();
    }

    CoreStep::keep_going(start_run(plan, slot, state, at, None))
}

/// Handle the runner's completion report for `run_id`.
pub fn handle_run_finished(
    plan: &RunPlan,
    slot: &mut RunSlot,
    state: &mut RunState,
    options: &RuntimeOptions,
    run_id: RunId,
    outcome: RunOutcome,
) -> CoreStep {
    let Some(released) = slot.release(run_id) else {
        debug!(run_id, %outcome, "ignoring completion for a run that is not active");
        return CoreStep::nothing();
    };

    let mut commands = Vec::new();

    if released.cancelled {
        // Already shown as Idle when the cancel was requested.
        debug!(run_id, %outcome, "cancelled run torn down");
        if slot.take_pending() {
            commands.extend(start_run(plan, slot, state, Instant::now(), None));
        }
    } else if slot.take_pending() {
        info!(run_id, %outcome, "run finished with a rerun pending");
        commands.extend(start_run(plan, slot, state, Instant::now(), Some(outcome)));
    } else {
        let old = *state;
        *state = outcome.display_state();
        commands.push(CoreCommand::Publish(Transition {
            old,
            new: *state,
            run_id: Some(run_id),
            output: Some(released.output),
            outcome: Some(outcome),
        }));
    }

    finish_step(slot, options, commands)
}

/// Handle an explicit cancel request.
///
/// Running → Idle right away and any pending rerun is dropped. The slot is
/// only freed when the runner confirms the process group is gone.
pub fn handle_cancel(
    slot: &mut RunSlot,
    state: &mut RunState,
    options: &RuntimeOptions,
) -> CoreStep {
    let Some((run_id, output)) = slot.cancel() else {
        debug!("cancel requested but no run is active");
        return finish_step(slot, options, Vec::new());
    };

    info!(run_id, "cancelling current run");
    let old = *state;
    *state = RunState::Idle;

    CoreStep::keep_going(vec![
        CoreCommand::CancelRun(run_id),
        CoreCommand::Publish(Transition {
            old,
            new: RunState::Idle,
            run_id: Some(run_id),
            output: Some(output),
            outcome: None,
        }),
    ])
}

/// Handle shutdown: stop the active run (without a status change) and exit.
pub fn handle_shutdown(slot: &mut RunSlot) -> CoreStep {
    let mut commands = Vec::new();
    if let Some((run_id, _)) = slot.cancel() {
        commands.push(CoreCommand::CancelRun(run_id));
    }
    commands.push(CoreCommand::RequestExit);
    CoreStep {
        commands,
        keep_running: false,
    }
}

/// Occupy the slot with a fresh run and publish `→ Running`.
///
/// `finished` is the outcome of the run being replaced, for a
/// `Running → Running` rerun.
fn start_run(
    plan: &RunPlan,
    slot: &mut RunSlot,
    state: &mut RunState,
    requested_at: Instant,
    finished: Option<RunOutcome>,
) -> Vec<CoreCommand> {
    let output = OutputBuffer::shared(plan.output_limit_bytes);
    let run_id = slot.occupy(output.clone());

    let old = *state;
    *state = RunState::Running;

    debug!(run_id, old = %old, "starting run");

    vec![
        CoreCommand::Publish(Transition {
            old,
            new: RunState::Running,
            run_id: Some(run_id),
            output: Some(output.clone()),
            outcome: finished,
        }),
        CoreCommand::StartRun(ScheduledRun {
            run_id,
            command: plan.command.clone(),
            output,
            requested_at,
        }),
    ]
}

/// In `--once` mode, exit as soon as nothing is running or pending.
fn finish_step(slot: &RunSlot, options: &RuntimeOptions, mut commands: Vec<CoreCommand>) -> CoreStep {
    let mut keep_running = true;
    if options.exit_when_idle && !slot.is_occupied() && !slot.rerun_pending() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }
    CoreStep {
        commands,
        keep_running,
    }
}
