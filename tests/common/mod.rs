#![allow(dead_code)]

use tokio::task::JoinHandle;

use tddwatch::bus::EventBus;
use tddwatch::config::ConfigFile;
use tddwatch::engine::{CoreRuntime, Runtime, RuntimeOptions};
use tddwatch::errors::Result;
use tddwatch::exec::{ExecutorBackend, RealExecutorBackend};
use tddwatch::status::StatusSnapshot;

pub use tddwatch_test_utils::builders::{ConfigFileBuilder, write_config};
pub use tddwatch_test_utils::fake_executor::{
    Completion, FakeExecutor, FakeExecutorHandle, wait_until,
};
pub use tddwatch_test_utils::{TransitionLog, init_tracing, with_timeout};

/// A runtime running on its own task, with a transition log attached.
pub struct Harness {
    pub bus: EventBus,
    pub log: TransitionLog,
    pub task: JoinHandle<Result<StatusSnapshot>>,
}

impl Harness {
    /// Shut the runtime down and return its final snapshot.
    pub async fn stop(self) -> StatusSnapshot {
        self.bus.request_shutdown();
        self.join().await
    }

    /// Wait for the runtime to stop on its own (e.g. `--once` mode).
    pub async fn join(self) -> StatusSnapshot {
        with_timeout(self.task)
            .await
            .expect("runtime task panicked")
            .expect("runtime returned an error")
    }
}

fn spawn_with<E, F>(cfg: &ConfigFile, options: RuntimeOptions, make_executor: F) -> Harness
where
    E: ExecutorBackend + 'static,
    F: FnOnce(&EventBus) -> E,
{
    init_tracing();
    let (bus, endpoint) = EventBus::channel();
    let executor = make_executor(&bus);
    let log = TransitionLog::new();
    bus.subscribe(log.clone());

    let core = CoreRuntime::from_config(cfg, options);
    let runtime = Runtime::new(core, endpoint, executor);
    let task = tokio::spawn(runtime.run());

    Harness { bus, log, task }
}

/// Runtime driving real processes.
pub fn spawn_real(cfg: &ConfigFile, options: RuntimeOptions) -> Harness {
    spawn_with(cfg, options, |bus| RealExecutorBackend::new(bus.sender()))
}

/// Runtime driving a [`FakeExecutor`].
pub fn spawn_fake(
    cfg: &ConfigFile,
    options: RuntimeOptions,
    completion: Completion,
) -> (Harness, FakeExecutorHandle) {
    let mut handle = None;
    let harness = spawn_with(cfg, options, |bus| {
        let (executor, h) = FakeExecutor::new(bus.sender(), completion);
        handle = Some(h);
        executor
    });
    (harness, handle.expect("executor was built"))
}
