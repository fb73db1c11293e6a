use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tddwatch::engine::{RuntimeEvent, ScheduledRun};
use tddwatch::exec::{BackendFuture, ExecutorBackend};
use tddwatch::types::{RunError, RunId, RunOutcome};

/// How the fake completes runs.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Report this outcome as soon as the run is started.
    Immediate(RunOutcome),
    /// Wait for the test to call [`FakeExecutorHandle::finish`].
    Manual,
}

#[derive(Default)]
struct Shared {
    started: Vec<ScheduledRun>,
    cancelled: Vec<RunId>,
    active: Vec<RunId>,
    max_concurrent: usize,
    shutdowns: usize,
}

/// A fake executor that:
/// - records which runs were started and cancelled
/// - tracks how many runs were in flight at once
/// - reports `RunFinished` either immediately or when the test says so.
///
/// Cancelled runs report `Aborted(Cancelled)` right away, like a process
/// group that dies on the first signal.
pub struct FakeExecutor {
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    completion: Completion,
    shared: Arc<Mutex<Shared>>,
}

/// Test-side view of a [`FakeExecutor`] that the runtime owns.
#[derive(Clone)]
pub struct FakeExecutorHandle {
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    shared: Arc<Mutex<Shared>>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
        completion: Completion,
    ) -> (Self, FakeExecutorHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let handle = FakeExecutorHandle {
            runtime_tx: runtime_tx.clone(),
            shared: Arc::clone(&shared),
        };
        (
            Self {
                runtime_tx,
                completion,
                shared,
            },
            handle,
        )
    }
}

fn report(
    shared: &Arc<Mutex<Shared>>,
    tx: &mpsc::UnboundedSender<RuntimeEvent>,
    run_id: RunId,
    outcome: RunOutcome,
) -> bool {
    {
        let mut guard = shared.lock().unwrap();
        let before = guard.active.len();
        guard.active.retain(|id| *id != run_id);
        if guard.active.len() == before {
            return false;
        }
    }
    tx.send(RuntimeEvent::RunFinished { run_id, outcome }).is_ok()
}

impl ExecutorBackend for FakeExecutor {
    fn start_run(&mut self, run: ScheduledRun) -> BackendFuture<'_> {
        Box::pin(async move {
            let run_id = run.run_id;
            {
                let mut guard = self.shared.lock().unwrap();
                guard.started.push(run);
                guard.active.push(run_id);
                guard.max_concurrent = guard.max_concurrent.max(guard.active.len());
            }
            if let Completion::Immediate(outcome) = &self.completion {
                report(&self.shared, &self.runtime_tx, run_id, outcome.clone());
            }
            Ok(())
        })
    }

    fn cancel_run(&mut self, run_id: RunId) -> BackendFuture<'_> {
        Box::pin(async move {
            self.shared.lock().unwrap().cancelled.push(run_id);
            report(
                &self.shared,
                &self.runtime_tx,
                run_id,
                RunOutcome::Aborted(RunError::Cancelled),
            );
            Ok(())
        })
    }

    fn shutdown(&mut self) -> BackendFuture<'_> {
        Box::pin(async move {
            self.shared.lock().unwrap().shutdowns += 1;
            Ok(())
        })
    }
}

impl FakeExecutorHandle {
    /// Complete `run_id` with `outcome`. Returns false if the run is not in
    /// flight (never started, already finished or cancelled).
    pub fn finish(&self, run_id: RunId, outcome: RunOutcome) -> bool {
        report(&self.shared, &self.runtime_tx, run_id, outcome)
    }

    pub fn started_ids(&self) -> Vec<RunId> {
        self.shared
            .lock()
            .unwrap()
            .started
            .iter()
            .map(|r| r.run_id)
            .collect()
    }

    pub fn started_runs(&self) -> Vec<ScheduledRun> {
        self.shared.lock().unwrap().started.clone()
    }

    pub fn cancelled(&self) -> Vec<RunId> {
        self.shared.lock().unwrap().cancelled.clone()
    }

    pub fn active(&self) -> Vec<RunId> {
        self.shared.lock().unwrap().active.clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.lock().unwrap().max_concurrent
    }

    pub fn shutdowns(&self) -> usize {
        self.shared.lock().unwrap().shutdowns
    }
}

/// Convenience: wait until `pred` holds, polling every few milliseconds.
pub async fn wait_until<F>(mut pred: F)
where
    F: FnMut() -> bool,
{
    while !pred() {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
