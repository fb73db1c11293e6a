// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning processes
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production process runner in [`task_runner`](super::task_runner).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, ScheduledRun};
use crate::errors::Result;
use crate::types::RunId;

use super::task_runner::run_task;

/// How long shutdown waits for a cancelled run to be torn down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how scheduled runs are executed.
///
/// Contract with the core: `start_run` is only called when no other run is
/// active, and every started run must eventually produce exactly one
/// `RuntimeEvent::RunFinished` for its id (cancelled runs included).
pub trait ExecutorBackend: Send {
    /// Begin executing `run` without waiting for it to finish.
    fn start_run(&mut self, run: ScheduledRun) -> BackendFuture<'_>;

    /// Ask the run with this id to stop. Unknown or finished ids are ignored.
    fn cancel_run(&mut self, run_id: RunId) -> BackendFuture<'_>;

    /// Stop whatever is still running and wait for it to be torn down.
    fn shutdown(&mut self) -> BackendFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// Internal handle for the currently-running process.
///
/// - `cancel` asks the runner task to kill the process group.
/// - `handle` is the Tokio task that is actually running the command.
struct ActiveRun {
    run_id: RunId,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Real executor backend used in production: one Tokio task per run, each
/// supervising one OS process group.
pub struct RealExecutorBackend {
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    active: Option<ActiveRun>,
}

impl std::fmt::Debug for RealExecutorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealExecutorBackend")
            .field("active_run", &self.active.as_ref().map(|a| a.run_id))
            .finish()
    }
}

impl RealExecutorBackend {
    /// Create a backend that reports completions on `runtime_tx`.
    pub fn new(runtime_tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            active: None,
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn start_run(&mut self, run: ScheduledRun) -> BackendFuture<'_> {
        Box::pin(async move {
            if let Some(previous) = self.active.take() {
                // The core only starts a run after the previous one reported
                // completion, so its task is at most returning right now.
                if !previous.handle.is_finished() {
                    debug!(
                        previous = previous.run_id,
                        next = run.run_id,
                        "previous runner task still winding down"
                    );
                }
            }

            let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
            let run_id = run.run_id;
            let tx = self.runtime_tx.clone();
            let handle = tokio::spawn(async move {
                run_task(run, tx, cancel_rx).await;
                debug!(run_id, "run task finished");
            });

            self.active = Some(ActiveRun {
                run_id,
                cancel: Some(cancel_tx),
                handle,
            });
            Ok(())
        })
    }

    fn cancel_run(&mut self, run_id: RunId) -> BackendFuture<'_> {
        Box::pin(async move {
            match self.active.as_mut() {
                Some(active) if active.run_id == run_id => match active.cancel.take() {
                    Some(cancel) => {
                        if cancel.send(()).is_err() {
                            debug!(run_id, "run already finished while cancelling");
                        }
                    }
                    None => debug!(run_id, "run already cancelled"),
                },
                _ => debug!(run_id, "cancel requested for a run that is not active"),
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            let Some(mut active) = self.active.take() else {
                return Ok(());
            };
            if active.handle.is_finished() {
                return Ok(());
            }

            info!(run_id = active.run_id, "stopping active run for shutdown");
            if let Some(cancel) = active.cancel.take() {
                let _ = cancel.send(());
            }

            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut active.handle)
                .await
                .is_err()
            {
                warn!(
                    run_id = active.run_id,
                    "run did not stop in time; aborting its task"
                );
                // Dropping the runner tears the process group down.
                active.handle.abort();
            }
            Ok(())
        })
    }
}
