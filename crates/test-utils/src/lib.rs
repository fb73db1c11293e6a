pub mod builders;
pub mod fake_executor;

use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::{EnvFilter, fmt};

use tddwatch::status::Transition;
use tddwatch::types::RunState;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Subscriber that records every transition it sees.
///
/// Clone it before handing it to `subscribe`; all clones share one log.
#[derive(Clone, Default)]
pub struct TransitionLog {
    seen: Arc<Mutex<Vec<Transition>>>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.seen.lock().unwrap().clone()
    }

    /// `(old, new)` pairs in delivery order.
    pub fn pairs(&self) -> Vec<(RunState, RunState)> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|t| (t.old, t.new))
            .collect()
    }

    /// Number of transitions into `Running` (one per started run).
    pub fn running_phases(&self) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.new == RunState::Running)
            .count()
    }
}

impl tddwatch::status::Subscriber for TransitionLog {
    fn on_transition(&mut self, transition: &Transition) {
        self.seen.lock().unwrap().push(transition.clone());
    }
}
