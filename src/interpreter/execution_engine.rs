//! Execution Engine
//!
//! Ties the interpreter components together:
//!
//! run -> execute_sequence -> execute_pipeline -> expand_command / start_stage
//!
//! Pipelines joined by `;`, `&&` and `||` run strictly one after another and
//! are expanded only when they are about to run. A pipeline followed by `&`
//! runs on a spawned task over a snapshot of the state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ast::types::{PipelineNode, SequenceNode, SequenceOperator};
use crate::interpreter::cancellation::ensure_not_cancelled;
use crate::interpreter::errors::ShellError;
use crate::interpreter::types::{ExecutionLimits, ExecutionResult, ShellOptions, ShellState};
use crate::template::HostValue;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Output captured so far by one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Executes a parsed sequence for one invocation.
///
/// Cloned into command substitutions (one level deeper, stdout captured
/// only) and background jobs; all clones share the host values and the
/// cancellation token.
#[derive(Debug, Clone)]
pub struct Interpreter {
    pub(crate) values: Arc<Vec<HostValue>>,
    pub(crate) options: ShellOptions,
    pub(crate) limits: ExecutionLimits,
    pub(crate) token: CancellationToken,
    /// Command substitution nesting level
    pub(crate) depth: usize,
    pub(crate) forward_stdout: bool,
    pub(crate) forward_stderr: bool,
}

impl Interpreter {
    pub fn new(
        values: Vec<HostValue>,
        options: ShellOptions,
        limits: ExecutionLimits,
        token: CancellationToken,
    ) -> Self {
        let forward = !options.quiet;
        Self {
            values: Arc::new(values),
            options,
            limits,
            token,
            depth: 0,
            forward_stdout: forward,
            forward_stderr: forward,
        }
    }

    /// Interpreter for a command substitution body.
    pub(crate) fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            forward_stdout: false,
            ..self.clone()
        }
    }

    /// Run `sequence` to completion.
    ///
    /// Cancellation resolves to `ShellError::Cancelled` carrying the output
    /// captured up to that point.
    pub async fn run(&self, state: &mut ShellState, sequence: &SequenceNode) -> Result<ExecutionResult, ShellError> {
        let mut out = CapturedOutput::default();
        match self.execute_sequence(state, sequence, &mut out).await {
            Ok(exit_code) => {
                debug!(exit_code, "invocation finished");
                Ok(ExecutionResult::new(exit_code, out.stdout, out.stderr))
            }
            Err(ShellError::Cancelled(mut err)) => {
                err.prepend_output(&out.stdout, &out.stderr);
                debug!(stdout_bytes = err.partial.stdout.len(), "invocation cancelled");
                Err(err.into())
            }
            Err(err) => Err(err),
        }
    }

    /// Execute every pipeline of `sequence` under its sequencing operators.
    /// Boxed because command substitutions recurse back into it.
    pub(crate) fn execute_sequence<'a>(
        &'a self,
        state: &'a mut ShellState,
        sequence: &'a SequenceNode,
        out: &'a mut CapturedOutput,
    ) -> BoxFuture<'a, Result<i32, ShellError>> {
        Box::pin(async move {
            let mut status = 0;
            let mut run_next = true;

            for item in &sequence.items {
                if run_next {
                    ensure_not_cancelled(&self.token)?;
                    status = if item.operator == SequenceOperator::Background {
                        self.spawn_background(state, &item.pipeline);
                        0
                    } else {
                        self.execute_pipeline(state, &item.pipeline, out, false).await?
                    };
                    state.last_exit_code = status;

                    if let Some(code) = state.exit_requested {
                        debug!(exit_code = code, "exit requested");
                        return Ok(code);
                    }
                }

                run_next = match item.operator {
                    SequenceOperator::AndIf => status == 0,
                    SequenceOperator::OrIf => status != 0,
                    SequenceOperator::Always | SequenceOperator::Background => true,
                };
            }

            Ok(status)
        })
    }

    /// Start a pipeline without waiting for it. Its output goes to the null
    /// device unless redirected and its exit status is discarded.
    fn spawn_background(&self, state: &ShellState, pipeline: &PipelineNode) {
        let interpreter = self.clone();
        let mut state = state.clone();
        state.exit_requested = None;
        let pipeline = pipeline.clone();

        tokio::spawn(async move {
            let mut out = CapturedOutput::default();
            match interpreter.execute_pipeline(&mut state, &pipeline, &mut out, true).await {
                Ok(code) => debug!(exit_code = code, "background pipeline finished"),
                Err(err) => debug!(error = %err, "background pipeline failed"),
            }
        });
    }
}
