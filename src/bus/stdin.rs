// src/bus/stdin.rs

//! Line protocol host: lets an editor (or any other process) drive the bus
//! through a pipe.
//!
//! One command per line:
//!
//! ```text
//! save [path]   a file was saved
//! cancel        stop the current run
//! status        print "status <state>[ <outcome>]"
//! quit          shut tddwatch down
//! ```

use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::EventBus;
use crate::types::TriggerSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinCommand {
    Save(Option<PathBuf>),
    Cancel,
    Status,
    Quit,
}

impl StdinCommand {
    /// Parse one protocol line. Blank lines are `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<StdinCommand>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let command = match word.to_lowercase().as_str() {
            "save" => Self::Save((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "cancel" => Self::Cancel,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(Some(command))
    }
}

/// Serve the protocol from `reader` until `quit` or end of input, then ask
/// the runtime to shut down. Status replies are written to `out`.
pub async fn serve<R, W>(reader: R, mut out: W, bus: &EventBus) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match StdinCommand::parse(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = %line, "{e}");
                continue;
            }
        };
        debug!(?command, "stdin command");

        match command {
            StdinCommand::Save(Some(path)) => bus.feed_save_event_from(TriggerSource::Hook, path),
            StdinCommand::Save(None) => bus.feed_save_event(),
            StdinCommand::Cancel => bus.cancel_current_run(),
            StdinCommand::Status => {
                let snap = bus.current();
                let mut reply = format!("status {}", snap.state);
                if let Some(outcome) = &snap.last_outcome {
                    reply.push_str(&format!(" {outcome}"));
                }
                reply.push('\n');
                out.write_all(reply.as_bytes()).await?;
                out.flush().await?;
            }
            StdinCommand::Quit => break,
        }
    }

    bus.request_shutdown();
    Ok(())
}

/// Serve the protocol on the process's stdin/stdout.
pub async fn run_stdin_host(bus: EventBus) -> std::io::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(stdin, tokio::io::stdout(), &bus).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RuntimeEvent;

    #[test]
    fn parses_commands() {
        assert_eq!(StdinCommand::parse("save"), Ok(Some(StdinCommand::Save(None))));
        assert_eq!(
            StdinCommand::parse("save  src/lib.rs "),
            Ok(Some(StdinCommand::Save(Some(PathBuf::from("src/lib.rs")))))
        );
        assert_eq!(StdinCommand::parse("CANCEL"), Ok(Some(StdinCommand::Cancel)));
        assert_eq!(StdinCommand::parse("status"), Ok(Some(StdinCommand::Status)));
        assert_eq!(StdinCommand::parse("quit"), Ok(Some(StdinCommand::Quit)));
        assert_eq!(StdinCommand::parse("   "), Ok(None));
        assert!(StdinCommand::parse("build").is_err());
    }

    #[tokio::test]
    async fn serve_feeds_events_and_stops_at_quit() {
        let (bus, mut endpoint) = EventBus::channel();
        let input: &[u8] = b"save a.rs\nbogus\ncancel\nstatus\nquit\nsave\n";
        let mut out = Vec::new();

        serve(input, &mut out, &bus).await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = endpoint.event_rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3, "{events:?}");
        assert!(matches!(
            &events[0],
            RuntimeEvent::SaveDetected { path: Some(p), .. } if p == &PathBuf::from("a.rs")
        ));
        assert!(matches!(events[1], RuntimeEvent::CancelRequested));
        assert!(matches!(events[2], RuntimeEvent::ShutdownRequested));
        assert_eq!(String::from_utf8(out).unwrap(), "status idle\n");
    }
}
