// src/exec/task_runner.rs

//! Runs one scheduled command to completion (or cancellation).

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RunCommand;
use crate::engine::{RuntimeEvent, ScheduledRun};
use crate::exec::output::OutputRef;
use crate::exec::process::ProcessHandle;
use crate::types::{RunError, RunId, RunOutcome};

/// How long to wait for the output readers once the process group is gone.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Run a single scheduled command and report its outcome.
///
/// Exactly one `RunFinished` event is sent per call, including for spawn
/// failures and cancelled runs. The output buffer is closed before the event
/// goes out, so subscribers always see the complete capture.
pub async fn run_task(
    run: ScheduledRun,
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let run_id = run.run_id;
    let outcome = execute(&run, cancel_rx).await;
    run.output.close();

    debug!(run_id, %outcome, "run complete; reporting to runtime");

    if runtime_tx
        .send(RuntimeEvent::RunFinished { run_id, outcome })
        .is_err()
    {
        debug!(run_id, "runtime gone; dropping run completion");
    }
}

/// Spawn the command, capture its output and wait for exit or cancellation.
pub async fn execute(run: &ScheduledRun, mut cancel_rx: oneshot::Receiver<()>) -> RunOutcome {
    let run_id = run.run_id;
    info!(
        run_id,
        cmd = %run.command.display(),
        dir = ?run.command.working_dir,
        queued_ms = run.requested_at.elapsed().as_millis() as u64,
        "starting run"
    );

    let mut child = match build_command(&run.command).spawn() {
        Ok(child) => child,
        Err(e) => {
            let reason = spawn_error_message(&run.command, &e);
            warn!(run_id, error = %reason, "could not start command");
            return RunOutcome::Aborted(RunError::Spawn(reason));
        }
    };

    let mut process = ProcessHandle::new(child.id());
    debug!(run_id, pid = ?process.pid(), "child process spawned");

    let readers = attach_output_readers(&mut child, run_id, &run.output);

    // Either the process exits on its own (normal case), or the controller
    // asks us to stop it.
    let outcome = tokio::select! {
        status = wait_for_exit(&mut child, &mut process) => match status {
            Ok(status) => exit_outcome(status),
            Err(e) => RunOutcome::Aborted(RunError::Wait(e.to_string())),
        },

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => info!(run_id, "cancellation requested; killing process group"),
                Err(_) => debug!(run_id, "executor dropped the cancel channel; killing process group"),
            }
            process.terminate_group();
            // Make sure the leader is dead and reaped even where process
            // groups are not available.
            if let Err(e) = child.kill().await {
                debug!(run_id, error = %e, "child already gone while cancelling");
            }
            RunOutcome::Aborted(RunError::Cancelled)
        }
    };

    drain_readers(run_id, readers).await;

    info!(
        run_id,
        exit_code = ?outcome.exit_code(),
        elapsed_ms = process.elapsed().as_millis() as u64,
        %outcome,
        "run process exited"
    );

    outcome
}

/// Wait for the child to exit. Stray background processes it started are
/// killed before the leader is reaped, while the group id cannot yet belong
/// to anything else.
async fn wait_for_exit(child: &mut Child, process: &mut ProcessHandle) -> io::Result<ExitStatus> {
    if process.leader_exited().await {
        process.terminate_group();
        return child.wait().await;
    }
    let status = child.wait().await;
    // The group id may be recycled from here on.
    process.release();
    status
}

/// Build the OS command for a run.
pub fn build_command(command: &RunCommand) -> Command {
    let mut cmd = if command.shell {
        let line = command.display();
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(line);
            c
        }
    } else {
        let mut c = Command::new(&command.program);
        c.args(&command.args);
        c
    };

    cmd.current_dir(&command.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so cancellation reaches grandchildren too.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// Map an exit status to a run outcome.
pub fn exit_outcome(status: ExitStatus) -> RunOutcome {
    match status.code() {
        Some(0) => RunOutcome::Success,
        Some(code) => RunOutcome::Failure(code),
        None => RunOutcome::Aborted(RunError::Signal(termination_signal(status))),
    }
}

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(-1)
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> i32 {
    -1
}

fn spawn_error_message(command: &RunCommand, err: &io::Error) -> String {
    let program = if command.shell {
        if cfg!(windows) { "cmd" } else { "sh" }
    } else {
        command.program.as_str()
    };
    match err.kind() {
        io::ErrorKind::NotFound => format!("command not found: {program}"),
        io::ErrorKind::PermissionDenied => format!("permission denied: {program}"),
        _ => format!("{program}: {err}"),
    }
}

fn attach_output_readers(
    child: &mut Child,
    run_id: RunId,
    output: &OutputRef,
) -> Vec<JoinHandle<()>> {
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, run_id, "stdout", output.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, run_id, "stderr", output.clone()));
    }
    readers
}

/// Always consume the stream to EOF so the child never blocks on a full
/// pipe or dies of SIGPIPE. Bytes that are not valid UTF-8 are replaced,
/// not treated as the end of output.
fn spawn_line_reader<R>(
    stream: R,
    run_id: RunId,
    name: &'static str,
    output: OutputRef,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    debug!(run_id, stream = name, "{}", line);
                    output.push_line(line);
                }
                Err(e) => {
                    debug!(run_id, stream = name, error = %e, "stopped reading output");
                    break;
                }
            }
        }
    })
}

/// One raw line as text, without its `\n` / `\r\n` terminator.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

async fn drain_readers(run_id: RunId, readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader)
            .await
            .is_err()
        {
            debug!(run_id, "output reader did not finish in time; aborting it");
            reader.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;
    use std::time::Instant;

    use super::*;
    use crate::exec::OutputBuffer;

    fn scheduled(line: &str) -> ScheduledRun {
        ScheduledRun {
            run_id: 1,
            command: RunCommand {
                program: line.to_string(),
                args: Vec::new(),
                working_dir: PathBuf::from("/"),
                shell: true,
            },
            output: OutputBuffer::shared(4096),
            requested_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn exit_codes_map_to_outcomes() {
        let (_keep, rx) = oneshot::channel();
        assert_eq!(execute(&scheduled("exit 0"), rx).await, RunOutcome::Success);
        let (_keep, rx) = oneshot::channel();
        assert_eq!(execute(&scheduled("exit 3"), rx).await, RunOutcome::Failure(3));
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let run = scheduled("echo out; echo err 1>&2");
        let (_keep, rx) = oneshot::channel();
        assert_eq!(execute(&run, rx).await, RunOutcome::Success);
        let mut lines: Vec<String> = run.output.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["err".to_string(), "out".to_string()]);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let mut run = scheduled("unused");
        run.command.shell = false;
        run.command.program = "/nonexistent/tddwatch-no-such-binary".to_string();
        let (_keep, rx) = oneshot::channel();
        match execute(&run, rx).await {
            RunOutcome::Aborted(RunError::Spawn(msg)) => {
                assert!(msg.contains("command not found"), "{msg}");
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn external_signal_is_reported() {
        let (_keep, rx) = oneshot::channel();
        assert_eq!(
            execute(&scheduled("kill -9 $$"), rx).await,
            RunOutcome::Aborted(RunError::Signal(9))
        );
    }

    #[tokio::test]
    async fn cancel_kills_long_running_command() {
        let run = scheduled("sleep 30");
        let (tx, rx) = oneshot::channel();
        let started = Instant::now();
        let handle = tokio::spawn(async move { execute(&run, rx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, RunOutcome::Aborted(RunError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_stop_capture() {
        let mut run = scheduled(
            "printf 'bad \\377 byte\\n'; i=0; while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done; echo done; exit 0",
        );
        run.output = OutputBuffer::shared(1024 * 1024);
        let (_keep, rx) = oneshot::channel();

        assert_eq!(execute(&run, rx).await, RunOutcome::Success);
        let lines: Vec<String> = run.output.lines().collect();
        assert_eq!(lines.len(), 20002);
        assert_eq!(lines[0], "bad \u{FFFD} byte");
        assert_eq!(lines.last().map(String::as_str), Some("done"));
    }

    #[test]
    fn decode_line_strips_terminators() {
        assert_eq!(decode_line(b"ok\r\n"), "ok");
        assert_eq!(decode_line(b"ok\n"), "ok");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"\xff\n"), "\u{FFFD}");
    }

    #[test]
    fn shell_command_line_joins_args() {
        let command = RunCommand {
            program: "cargo".to_string(),
            args: vec!["test".to_string(), "--quiet".to_string()],
            working_dir: PathBuf::from("."),
            shell: true,
        };
        let cmd = build_command(&command);
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "sh");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, vec!["-c", "cargo test --quiet"]);
    }
}
