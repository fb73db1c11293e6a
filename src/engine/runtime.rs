// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::bus::BusEndpoint;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::status::{StatusPublisher, StatusSnapshot};

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the core state machine in response to `RuntimeEvent`s, hands runs
/// to an `ExecutorBackend` and publishes transitions.
///
/// This is the single owner of run state: the core, the publisher and the
/// subscriber callbacks are only ever touched from the task running
/// [`Runtime::run`].
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    publisher: StatusPublisher,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, endpoint: BusEndpoint, executor: E) -> Self {
        let BusEndpoint {
            event_rx,
            publisher,
        } = endpoint;
        Self {
            core,
            event_rx,
            publisher,
            executor,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from the bus.
    /// - Keeps the subscriber registry.
    /// - Feeds everything else into the core runtime and executes the
    ///   commands it returns (publish, start, cancel, exit).
    ///
    /// Returns the final status snapshot once the loop stops. The active run,
    /// if any, has been torn down by then.
    pub async fn run(mut self) -> Result<StatusSnapshot> {
        info!("tddwatch runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let event = match event {
                RuntimeEvent::Subscribe { id, subscriber } => {
                    self.publisher.subscribe(id, subscriber);
                    continue;
                }
                RuntimeEvent::Unsubscribe { id } => {
                    self.publisher.unsubscribe(id);
                    continue;
                }
                other => other,
            };

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        self.executor.shutdown().await?;
        info!("runtime exiting");
        Ok(self.publisher.current())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::Publish(transition) => {
                self.publisher.transition(transition);
            }
            CoreCommand::StartRun(run) => {
                debug!(run_id = run.run_id, "dispatching run to executor");
                self.executor.start_run(run).await?;
            }
            CoreCommand::CancelRun(run_id) => {
                self.executor.cancel_run(run_id).await?;
            }
            CoreCommand::RequestExit => {
                // keep_running=false already ends the loop; nothing to do.
                debug!("core issued RequestExit command");
            }
        }
        Ok(())
    }
}
