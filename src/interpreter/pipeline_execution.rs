//! Pipeline Execution
//!
//! Handles execution of command pipelines (cmd1 | cmd2 | cmd3).
//!
//! Every command is expanded first, then all stages are started before any
//! is awaited, connected by OS pipes. The last stage writes into a capture
//! pipe and all stages share one stderr capture pipe; both are drained by
//! blocking reader tasks so a stage never stalls on a full pipe buffer.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, PipeReader, Read, Write};
use std::os::fd::OwnedFd;
use std::process::Stdio;

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ast::types::PipelineNode;
use crate::interpreter::builtins::{is_builtin, run_builtin, BuiltinResult};
use crate::interpreter::cancellation::ensure_not_cancelled;
use crate::interpreter::errors::{CancelledError, ShellError};
use crate::interpreter::execution_engine::{CapturedOutput, Interpreter};
use crate::interpreter::process::ProcessHandle;
use crate::interpreter::redirections::{
    null_reader, null_writer, write_diagnostic, PreparedRedirect, StageFds,
};
use crate::interpreter::types::{PipelineExitPolicy, ShellState};
use crate::interpreter::SHELL_NAME;

/// A command after expansion, ready to start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedCommand {
    pub argv: Vec<String>,
    pub assignments: Vec<(String, String)>,
    pub redirects: Vec<PreparedRedirect>,
}

/// Pipeline execution state.
#[derive(Debug, Default)]
pub struct PipelineState {
    /// Exit codes of all commands, in stage order
    pub pipestatus: Vec<i32>,
    /// Rightmost failing exit code (for pipefail)
    pub pipefail_exit_code: i32,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the exit code of the next stage.
    pub fn record(&mut self, exit_code: i32) {
        self.pipestatus.push(exit_code);
        if exit_code != 0 {
            self.pipefail_exit_code = exit_code;
        }
    }

    /// Get the final exit code under `policy`.
    pub fn final_exit_code(&self, policy: PipelineExitPolicy) -> i32 {
        let last = self.pipestatus.last().copied().unwrap_or(0);
        match policy {
            PipelineExitPolicy::Pipefail if self.pipefail_exit_code != 0 => self.pipefail_exit_code,
            _ => last,
        }
    }
}

/// A started stage.
enum Stage {
    Process(ProcessHandle),
    /// Builtin output still being written to its descriptors
    Builtin(JoinHandle<i32>),
    Finished(i32),
}

impl Stage {
    /// Wait for the stage to finish. A process stage keeps its handle so its
    /// group can still be signalled on cancellation.
    async fn wait(&mut self) -> i32 {
        match self {
            Stage::Process(handle) => match handle.wait().await {
                Ok(code) => code,
                Err(err) => {
                    warn!(program = handle.program(), error = %err, "failed to wait for process");
                    1
                }
            },
            Stage::Builtin(task) => {
                let code = task.await.unwrap_or(1);
                *self = Stage::Finished(code);
                code
            }
            Stage::Finished(code) => *code,
        }
    }

    async fn terminate(&mut self, grace: std::time::Duration) {
        match self {
            Stage::Process(handle) => {
                if let Err(err) = handle.terminate(grace).await {
                    warn!(program = handle.program(), error = %err, "failed to terminate process");
                }
            }
            // Builtins only write buffered output; their writer closes once the
            // readers stop or the capture drains
            Stage::Builtin(_) | Stage::Finished(_) => {}
        }
    }
}

/// Where a capture reader mirrors what it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forward {
    Nothing,
    Stdout,
    Stderr,
}

impl Forward {
    fn write(self, chunk: &[u8]) {
        let result = match self {
            Forward::Nothing => Ok(()),
            Forward::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(chunk).and_then(|_| stdout.flush())
            }
            Forward::Stderr => io::stderr().lock().write_all(chunk),
        };
        if let Err(err) = result {
            debug!(error = %err, "failed to forward output");
        }
    }
}

/// Drain `reader` until every writer is closed.
fn spawn_reader(mut reader: PipeReader, forward: Forward) -> JoinHandle<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut captured = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    captured.extend_from_slice(&buf[..n]);
                    forward.write(&buf[..n]);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "failed to read captured output");
                    break;
                }
            }
        }
        captured
    })
}

/// Reader tasks for the two capture pipes of one pipeline.
#[derive(Default)]
struct CaptureReaders {
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl CaptureReaders {
    /// Move everything read so far into `out`. Safe to drop mid-way: a
    /// handle is only released after its bytes were taken.
    async fn collect(&mut self, out: &mut CapturedOutput) {
        if let Some(task) = self.stdout.as_mut() {
            if let Ok(bytes) = task.await {
                out.stdout.extend_from_slice(&bytes);
            }
            self.stdout = None;
        }
        if let Some(task) = self.stderr.as_mut() {
            if let Ok(bytes) = task.await {
                out.stderr.extend_from_slice(&bytes);
            }
            self.stderr = None;
        }
    }
}

impl Interpreter {
    /// Expand, start and await one pipeline; returns its exit code under the
    /// configured policy.
    pub(crate) async fn execute_pipeline(
        &self,
        state: &mut ShellState,
        pipeline: &PipelineNode,
        out: &mut CapturedOutput,
        background: bool,
    ) -> Result<i32, ShellError> {
        let mut prepared = Vec::with_capacity(pipeline.commands.len());
        for command in &pipeline.commands {
            prepared.push(self.expand_command(state, command, out).await?);
        }
        ensure_not_cancelled(&self.token)?;

        let mut readers = CaptureReaders::default();
        let (capture_stdout, capture_stderr) = if background {
            (null_writer()?, null_writer()?)
        } else {
            let (stdout_reader, stdout_writer) = io::pipe()?;
            let (stderr_reader, stderr_writer) = io::pipe()?;
            readers.stdout = Some(spawn_reader(
                stdout_reader,
                if self.forward_stdout { Forward::Stdout } else { Forward::Nothing },
            ));
            readers.stderr = Some(spawn_reader(
                stderr_reader,
                if self.forward_stderr { Forward::Stderr } else { Forward::Nothing },
            ));
            (OwnedFd::from(stdout_writer), OwnedFd::from(stderr_writer))
        };

        let count = prepared.len();
        let isolated = count > 1 || background;
        let mut stages = Vec::with_capacity(count);
        let mut next_stdin: Option<OwnedFd> = None;

        for (i, command) in prepared.into_iter().enumerate() {
            let stdin = match next_stdin.take() {
                Some(fd) => fd,
                None => null_reader()?,
            };
            let stdout = if i + 1 < count {
                let (reader, writer) = io::pipe()?;
                next_stdin = Some(reader.into());
                writer.into()
            } else {
                capture_stdout.try_clone()?
            };
            let stderr = capture_stderr.try_clone()?;

            stages.push(self.start_stage(state, command, StageFds { stdin, stdout, stderr }, isolated));
        }
        // Only the stages may hold writers now, so readers see EOF when they finish
        drop(capture_stdout);
        drop(capture_stderr);

        let mut pipeline_state = PipelineState::new();
        for i in 0..stages.len() {
            let code = if self.token.is_cancelled() {
                None
            } else {
                tokio::select! {
                    code = stages[i].wait() => Some(code),
                    _ = self.token.cancelled() => None,
                }
            };
            match code {
                Some(code) => pipeline_state.record(code),
                None => return Err(self.abort_pipeline(&mut stages, &mut readers, out).await.into()),
            }
        }

        let drained = tokio::select! {
            _ = readers.collect(out) => true,
            _ = self.token.cancelled() => false,
        };
        if !drained {
            return Err(self.abort_pipeline(&mut stages, &mut readers, out).await.into());
        }

        let exit_code = pipeline_state.final_exit_code(self.options.pipeline_exit_policy);
        debug!(stages = count, pipestatus = ?pipeline_state.pipestatus, exit_code, "pipeline finished");
        Ok(exit_code)
    }

    /// Terminate every stage, then keep whatever output arrived.
    async fn abort_pipeline(
        &self,
        stages: &mut [Stage],
        readers: &mut CaptureReaders,
        out: &mut CapturedOutput,
    ) -> CancelledError {
        debug!(stages = stages.len(), "cancelling pipeline");
        for stage in stages.iter_mut() {
            stage.terminate(self.limits.kill_grace).await;
        }
        if tokio::time::timeout(self.limits.kill_grace, readers.collect(out)).await.is_err() {
            warn!("captured output still open after cancellation");
        }
        CancelledError::new()
    }

    /// Apply redirects and start one stage.
    fn start_stage(
        &self,
        state: &mut ShellState,
        command: PreparedCommand,
        mut fds: StageFds,
        isolated: bool,
    ) -> Stage {
        if let Err(message) = fds.apply(&command.redirects) {
            write_diagnostic(fds.stderr, &message);
            return Stage::Finished(1);
        }

        let Some(name) = command.argv.first() else {
            // Assignment-only command
            if !isolated {
                for (name, value) in command.assignments {
                    state.set_var(name, value);
                }
            }
            return Stage::Finished(0);
        };

        if is_builtin(name) {
            let mut scratch;
            let target = if isolated || !command.assignments.is_empty() {
                scratch = state.clone();
                for (name, value) in &command.assignments {
                    scratch.set_var(name.clone(), value.clone());
                }
                &mut scratch
            } else {
                &mut *state
            };
            if let Some(result) = run_builtin(name, target, &command.argv[1..]) {
                debug!(builtin = %name, exit_code = result.exit_code, "builtin finished");
                return write_builtin_output(result, fds);
            }
        }

        self.spawn_external(state, &command, fds)
    }

    fn spawn_external(&self, state: &ShellState, command: &PreparedCommand, fds: StageFds) -> Stage {
        let name = &command.argv[0];
        let program: OsString = if name.contains('/') {
            state.resolve_path(name).into_os_string()
        } else {
            name.into()
        };

        let diagnostics = fds.stderr.try_clone().ok();
        let mut cmd = Command::new(program);
        cmd.args(&command.argv[1..])
            .env_clear()
            .envs(state.child_env())
            .envs(command.assignments.iter().map(|(k, v)| (k, v)))
            .current_dir(&state.cwd)
            .stdin(Stdio::from(fds.stdin))
            .stdout(Stdio::from(fds.stdout))
            .stderr(Stdio::from(fds.stderr));

        let mut handle = ProcessHandle::new(name.clone());
        let spawned = handle.spawn(&mut cmd);
        // Close the parent's copies of the stage descriptors
        drop(cmd);

        match spawned {
            Ok(()) => Stage::Process(handle),
            Err(err) => {
                debug!(program = %name, error = %err, "spawn failed");
                if let Some(fd) = diagnostics {
                    write_diagnostic(fd, &format!("{}: {}\n", SHELL_NAME, err));
                }
                Stage::Finished(err.exit_code())
            }
        }
    }
}

/// Write builtin output to the stage's descriptors off the async runtime;
/// the write may block until the next stage reads.
fn write_builtin_output(result: BuiltinResult, fds: StageFds) -> Stage {
    let StageFds { stdin, stdout, stderr } = fds;
    drop(stdin);
    Stage::Builtin(tokio::task::spawn_blocking(move || {
        write_all(stdout, result.stdout.as_bytes());
        write_all(stderr, result.stderr.as_bytes());
        result.exit_code
    }))
}

fn write_all(fd: OwnedFd, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    if let Err(err) = File::from(fd).write_all(bytes) {
        // A closed reader (e.g. `echo x | true`) is not an error
        if err.kind() != io::ErrorKind::BrokenPipe {
            debug!(error = %err, "failed to write builtin output");
        }
    }
}
