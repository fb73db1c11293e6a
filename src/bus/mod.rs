// src/bus/mod.rs

//! Event bus: the boundary every host integrates through.
//!
//! An [`EventBus`] is a cheap, cloneable, thread-safe handle. Editor hooks,
//! the filesystem watcher, the stdin protocol and tests all use it to feed
//! save events in and read status out. It does no logic of its own: every
//! call either enqueues an event for the runtime task or reads the latest
//! published snapshot, and none of them block.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::engine::RuntimeEvent;
use crate::exec::OutputRef;
use crate::status::{StatusPublisher, StatusReader, StatusSnapshot, Subscriber, SubscriptionId};
use crate::types::{RunState, TriggerSource};

pub mod stdin;

/// Runtime side of a bus: the event receiver and the status publisher.
/// Consumed by [`Runtime::new`](crate::engine::Runtime::new).
#[derive(Debug)]
pub struct BusEndpoint {
    pub event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    pub publisher: StatusPublisher,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<RuntimeEvent>,
    status: StatusReader,
    next_subscription: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus and the endpoint a runtime will own.
    pub fn channel() -> (EventBus, BusEndpoint) {
        let (tx, event_rx) = mpsc::unbounded_channel();
        let publisher = StatusPublisher::new();
        let bus = EventBus {
            tx,
            status: publisher.reader(),
            next_subscription: Arc::new(AtomicU64::new(1)),
        };
        (
            bus,
            BusEndpoint {
                event_rx,
                publisher,
            },
        )
    }

    /// Raw sender into the runtime, for executors.
    pub fn sender(&self) -> mpsc::UnboundedSender<RuntimeEvent> {
        self.tx.clone()
    }

    fn send(&self, event: RuntimeEvent) {
        if self.tx.send(event).is_err() {
            debug!("runtime has stopped; event dropped");
        }
    }

    /// A relevant file was saved. Returns immediately.
    pub fn feed_save_event(&self) {
        self.send(RuntimeEvent::save_now(TriggerSource::Hook, None));
    }

    /// Same as [`feed_save_event`](Self::feed_save_event), recording which
    /// path was saved and by whom.
    pub fn feed_save_event_from(&self, source: TriggerSource, path: impl Into<PathBuf>) {
        self.send(RuntimeEvent::save_now(source, Some(path.into())));
    }

    /// Save event without a path, tagged with its source (e.g. the startup
    /// trigger).
    pub fn feed_trigger(&self, source: TriggerSource) {
        self.send(RuntimeEvent::save_now(source, None));
    }

    /// Stop the current run, if any. Returns immediately.
    pub fn cancel_current_run(&self) {
        self.send(RuntimeEvent::CancelRequested);
    }

    /// Ask the runtime to stop (active run included).
    pub fn request_shutdown(&self) {
        self.send(RuntimeEvent::ShutdownRequested);
    }

    /// Register `subscriber` for every later transition.
    ///
    /// Registration is processed in order with other events, so the
    /// subscriber sees every transition caused by events sent after this call.
    pub fn subscribe<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: Subscriber + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.send(RuntimeEvent::Subscribe {
            id,
            subscriber: Box::new(subscriber),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.send(RuntimeEvent::Unsubscribe { id });
    }

    /// Latest published status. Never blocks on the runtime.
    pub fn current(&self) -> StatusSnapshot {
        self.status.current()
    }

    /// State plus output of the current (or last) run, for polling hosts.
    pub fn get_current(&self) -> (RunState, Option<OutputRef>) {
        let snap = self.status.current();
        (snap.state, snap.output)
    }

    pub fn current_state(&self) -> RunState {
        self.status.state()
    }

    /// Receiver for hosts that want to await status changes.
    pub fn status_receiver(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.receiver()
    }

    /// True once the runtime has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
