// src/status/publisher.rs

use std::time::SystemTime;

use tokio::sync::watch;
use tracing::{debug, trace};

use super::{StatusSnapshot, Subscriber, SubscriptionId, Transition};
use crate::types::RunState;

/// Owner of the current status and of the subscriber registry.
///
/// There is exactly one publisher per runtime and it lives on the runtime
/// task; everything else reads through a [`StatusReader`].
pub struct StatusPublisher {
    snapshot_tx: watch::Sender<StatusSnapshot>,
    subscribers: Vec<(SubscriptionId, Box<dyn Subscriber>)>,
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("state", &self.snapshot_tx.borrow().state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(StatusSnapshot::default());
        Self {
            snapshot_tx,
            subscribers: Vec::new(),
        }
    }

    /// A cheap, cloneable read handle.
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            rx: self.snapshot_tx.subscribe(),
        }
    }

    pub fn current(&self) -> StatusSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&mut self, id: SubscriptionId, subscriber: Box<dyn Subscriber>) {
        debug!(id, "subscriber registered");
        self.subscribers.push((id, subscriber));
    }

    /// Returns false if no subscriber had this id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        let removed = self.subscribers.len() != before;
        debug!(id, removed, "subscriber removed");
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Apply a transition: update the snapshot, then notify every subscriber
    /// in registration order.
    pub fn transition(&mut self, transition: Transition) {
        self.snapshot_tx.send_modify(|snap| {
            snap.state = transition.new;

            if transition.outcome.is_some() {
                snap.last_outcome = transition.outcome.clone();
                snap.last_finished = Some(SystemTime::now());
            }
            if transition.output.is_some() {
                snap.output = transition.output.clone();
            }
            if transition.new == RunState::Running {
                snap.runs_started += 1;
            }
        });

        trace!(
            old = %transition.old,
            new = %transition.new,
            subscribers = self.subscribers.len(),
            "publishing transition"
        );

        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber.on_transition(&transition);
        }
    }
}

/// Read-only view of the status, usable from any thread.
#[derive(Debug, Clone)]
pub struct StatusReader {
    rx: watch::Receiver<StatusSnapshot>,
}

impl StatusReader {
    /// Current snapshot. Never blocks on the runtime.
    pub fn current(&self) -> StatusSnapshot {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> RunState {
        self.rx.borrow().state
    }

    /// Receiver for async hosts that want to await changes.
    pub fn receiver(&self) -> watch::Receiver<StatusSnapshot> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::exec::OutputBuffer;
    use crate::types::RunOutcome;

    fn running(run_id: u64) -> Transition {
        Transition {
            old: RunState::Idle,
            new: RunState::Running,
            run_id: Some(run_id),
            output: Some(OutputBuffer::shared(64)),
            outcome: None,
        }
    }

    #[test]
    fn notifies_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut publisher = StatusPublisher::new();

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            publisher.subscribe(
                publisher.subscriber_count() as u64,
                Box::new(move |t: &Transition| seen.lock().unwrap().push((tag, t.new))),
            );
        }

        publisher.transition(running(1));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("first", RunState::Running),
                ("second", RunState::Running),
                ("third", RunState::Running)
            ]
        );
    }

    #[test]
    fn snapshot_is_updated_before_subscribers_run() {
        let mut publisher = StatusPublisher::new();
        let reader = publisher.reader();
        let observed = Arc::new(Mutex::new(None));
        {
            let observed = Arc::clone(&observed);
            let reader = reader.clone();
            publisher.subscribe(
                7,
                Box::new(move |_: &Transition| *observed.lock().unwrap() = Some(reader.state())),
            );
        }

        publisher.transition(running(1));
        assert_eq!(*observed.lock().unwrap(), Some(RunState::Running));
    }

    #[test]
    fn finish_records_outcome_and_keeps_output() {
        let mut publisher = StatusPublisher::new();
        let start = running(1);
        let output = start.output.clone();
        publisher.transition(start);
        publisher.transition(Transition {
            old: RunState::Running,
            new: RunState::Failed,
            run_id: Some(1),
            output: None,
            outcome: Some(RunOutcome::Failure(101)),
        });

        let snap = publisher.current();
        assert_eq!(snap.state, RunState::Failed);
        assert_eq!(snap.last_outcome, Some(RunOutcome::Failure(101)));
        assert!(snap.last_finished.is_some());
        assert_eq!(snap.runs_started, 1);
        assert!(Arc::ptr_eq(snap.output.as_ref().unwrap(), output.as_ref().unwrap()));
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let count = Arc::new(Mutex::new(0));
        let mut publisher = StatusPublisher::new();
        {
            let count = Arc::clone(&count);
            publisher.subscribe(1, Box::new(move |_: &Transition| *count.lock().unwrap() += 1));
        }
        publisher.transition(running(1));
        assert!(publisher.unsubscribe(1));
        assert!(!publisher.unsubscribe(1));
        publisher.transition(running(2));
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
