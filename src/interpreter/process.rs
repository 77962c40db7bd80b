//! Process Handles
//!
//! A spawned pipeline stage and its lifecycle:
//! `NotStarted -> Running -> Exited(code) | Killed(signal)`.
//!
//! Children are placed in their own process group so a termination request
//! reaches anything they started in turn. Every handle is reaped before it
//! is released; `kill_on_drop` covers handles dropped on error paths.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::interpreter::errors::SpawnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Exited(i32),
    Killed(i32),
}

impl ProcessState {
    /// Shell exit status: the code, or 128 + signal.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessState::Exited(code) => Some(*code),
            ProcessState::Killed(signal) => Some(128 + signal),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Exited(_) | ProcessState::Killed(_))
    }
}

impl From<ExitStatus> for ProcessState {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ProcessState::Exited(code),
            (None, Some(signal)) => ProcessState::Killed(signal),
            (None, None) => ProcessState::Exited(1),
        }
    }
}

/// An OS process owned by one pipeline stage.
#[derive(Debug)]
pub struct ProcessHandle {
    program: String,
    pid: Option<u32>,
    child: Option<Child>,
    state: ProcessState,
}

impl ProcessHandle {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            pid: None,
            child: None,
            state: ProcessState::NotStarted,
        }
    }

    /// Spawn `command` in a fresh process group.
    ///
    /// The caller should drop `command` right after, so the parent's copies of
    /// the stage's descriptors are closed.
    pub fn spawn(&mut self, command: &mut Command) -> Result<(), SpawnError> {
        command.kill_on_drop(true).process_group(0);
        let child = command
            .spawn()
            .map_err(|e| SpawnError::from_io(&self.program, &e))?;
        self.pid = child.id();
        self.child = Some(child);
        self.state = ProcessState::Running;
        debug!(program = %self.program, pid = ?self.pid, "spawned process");
        Ok(())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Wait for the process to exit and return its shell exit status.
    pub async fn wait(&mut self) -> std::io::Result<i32> {
        if let Some(code) = self.state.exit_code() {
            return Ok(code);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(0);
        };
        let status = child.wait().await?;
        Ok(self.finish(status))
    }

    /// Ask the process group to exit (SIGTERM), give it `grace`, then SIGKILL.
    /// The process is always reaped. A group whose leader already exited is
    /// still signalled, since its members may outlive the leader.
    pub async fn terminate(&mut self, grace: Duration) -> std::io::Result<i32> {
        if let Some(code) = self.state.exit_code() {
            self.terminate_group(grace).await;
            return Ok(code);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(0);
        };

        if let Some(status) = child.try_wait()? {
            let code = self.finish(status);
            self.terminate_group(grace).await;
            return Ok(code);
        }

        signal_group(self.pid, libc::SIGTERM);
        debug!(program = %self.program, pid = ?self.pid, "sent SIGTERM");

        let status = match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                signal_group(self.pid, libc::SIGKILL);
                child.start_kill()?;
                debug!(program = %self.program, pid = ?self.pid, "killed after grace period");
                child.wait().await?
            }
        };
        // Leftovers in the group (grandchildren) do not get a grace period.
        signal_group(self.pid, libc::SIGKILL);
        Ok(self.finish(status))
    }

    /// SIGTERM what is left of the group, wait up to `grace` for it to
    /// empty, then SIGKILL. Only called once the leader has been reaped.
    async fn terminate_group(&self, grace: Duration) {
        if !group_alive(self.pid) {
            return;
        }
        signal_group(self.pid, libc::SIGTERM);
        debug!(program = %self.program, pgid = ?self.pid, "sent SIGTERM to orphaned group");

        let deadline = tokio::time::Instant::now() + grace;
        while group_alive(self.pid) && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }
        signal_group(self.pid, libc::SIGKILL);
    }

    fn finish(&mut self, status: ExitStatus) -> i32 {
        self.state = ProcessState::from(status);
        self.child = None;
        let code = self.state.exit_code().unwrap_or(1);
        debug!(program = %self.program, pid = ?self.pid, code, "process exited");
        code
    }
}

const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Whether any process is left in the group led by `pid`.
fn group_alive(pid: Option<u32>) -> bool {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return false;
    };
    // SAFETY: signal 0 only checks that the group exists.
    unsafe { libc::kill(-pid, 0) == 0 }
}

/// Send `signal` to the process group led by `pid`.
fn signal_group(pid: Option<u32>, signal: libc::c_int) {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a stale group id
    // only yields ESRCH.
    unsafe {
        libc::kill(-pid, signal);
    }
}
