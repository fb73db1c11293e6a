// src/exec/process.rs

//! Identity and teardown of a spawned child process.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Identity of a running child: pid (which is also its process-group id on
/// unix) and start time.
///
/// The handle is owned by the runner task. Dropping it tears down the whole
/// process group, so no exit path of the runner (normal exit, cancellation,
/// task abort, panic) can leak the command or anything it spawned.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    started_at: Instant,
    released: bool,
}

impl ProcessHandle {
    pub fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            started_at: Instant::now(),
            released: false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Resolve once the leader has exited, without reaping it.
    ///
    /// While the leader is an unreaped zombie its pid, and with it the group
    /// id, cannot be handed to another process. Returns `false` where that
    /// state cannot be observed; the group must then not be signalled once
    /// the leader is reaped.
    pub async fn leader_exited(&self) -> bool {
        match self.pid {
            Some(pid) => wait_exited_unreaped(pid).await,
            None => false,
        }
    }

    /// Stop tracking the group without signalling it.
    pub fn release(&mut self) {
        self.released = true;
    }

    /// Kill every process left in the group. Idempotent.
    pub fn terminate_group(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.terminate_group();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        warn!(pgid, "process group id out of range; not signalling");
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "killed process group"),
        // Everything in the group has already exited.
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(pid: u32) {
    // No process groups here; the child itself is covered by kill_on_drop.
    debug!(pid, "process group teardown not supported on this platform");
}

#[cfg(any(target_os = "android", all(target_os = "linux", not(target_env = "uclibc"))))]
async fn wait_exited_unreaped(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::wait::{Id, WaitPidFlag, waitid};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    let waited = tokio::task::spawn_blocking(move || {
        loop {
            match waitid(
                Id::Pid(Pid::from_raw(raw)),
                WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT,
            ) {
                Err(Errno::EINTR) => continue,
                other => return other,
            }
        }
    })
    .await;

    match waited {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(pid, error = %e, "cannot observe leader exit; leaving its group alone");
            false
        }
        Err(e) => {
            warn!(pid, error = %e, "exit watcher task failed");
            false
        }
    }
}

#[cfg(not(any(target_os = "android", all(target_os = "linux", not(target_env = "uclibc")))))]
async fn wait_exited_unreaped(_pid: u32) -> bool {
    false
}
