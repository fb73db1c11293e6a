// src/status/sinks.rs

//! Built-in subscribers.

use std::io::Write;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{StatusGlyph, Subscriber, Transition};
use crate::types::{RunOutcome, RunState};

/// Logs every transition through `tracing`.
///
/// A failing test run is routine, so it is logged at `info`; only runs that
/// could not be executed at all are warnings.
#[derive(Debug, Default)]
pub struct LogSubscriber;

impl Subscriber for LogSubscriber {
    fn on_transition(&mut self, t: &Transition) {
        match (&t.outcome, t.new) {
            (Some(RunOutcome::Aborted(err)), _) => {
                warn!(run_id = ?t.run_id, old = %t.old, new = %t.new, error = %err, "run aborted");
            }
            (Some(outcome), _) => {
                info!(run_id = ?t.run_id, old = %t.old, new = %t.new, outcome = %outcome, "run finished");
            }
            (None, RunState::Idle) => {
                info!(run_id = ?t.run_id, old = %t.old, "run cancelled");
            }
            (None, new) => {
                debug!(run_id = ?t.run_id, old = %t.old, new = %new, "status changed");
            }
        }
    }
}

/// Terminal status line: one glyph-prefixed line per transition, plus the
/// tail of the captured output when a run fails.
pub struct StatusLine<W: Write + Send> {
    out: W,
    colored: bool,
    failure_tail_lines: usize,
    started: Option<Instant>,
}

impl StatusLine<std::io::Stderr> {
    /// Status line on stderr, keeping stdout free for the host.
    pub fn stderr(colored: bool) -> Self {
        Self::new(std::io::stderr(), colored)
    }
}

impl<W: Write + Send> StatusLine<W> {
    pub fn new(out: W, colored: bool) -> Self {
        Self {
            out,
            colored,
            failure_tail_lines: 20,
            started: None,
        }
    }

    pub fn with_failure_tail(mut self, lines: usize) -> Self {
        self.failure_tail_lines = lines;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, t: &Transition) -> std::io::Result<()> {
        let glyph = StatusGlyph::for_state(t.new).render(self.colored);
        let elapsed = match t.outcome {
            Some(_) => self.started.map(|s| s.elapsed()),
            None => None,
        };

        let mut line = format!("[tddwatch] {glyph} {}", t.new);
        if let Some(outcome) = &t.outcome {
            line.push_str(&format!(" ({outcome}"));
            if let Some(elapsed) = elapsed {
                line.push_str(&format!(", {:.1}s", elapsed.as_secs_f64()));
            }
            line.push(')');
        }
        if t.old == RunState::Running && t.new == RunState::Running {
            line.push_str(" - rerun");
        }
        writeln!(self.out, "{line}")?;

        if t.new == RunState::Running {
            self.started = Some(Instant::now());
        }

        let failed = matches!(&t.outcome, Some(o) if o.display_state() == RunState::Failed);
        if failed && self.failure_tail_lines > 0 {
            if let Some(output) = &t.output {
                for text in output.tail(self.failure_tail_lines) {
                    writeln!(self.out, "  | {text}")?;
                }
            }
        }

        self.out.flush()
    }
}

impl<W: Write + Send> Subscriber for StatusLine<W> {
    fn on_transition(&mut self, t: &Transition) {
        if let Err(e) = self.render(t) {
            debug!(error = %e, "failed to write status line");
        }
    }
}
