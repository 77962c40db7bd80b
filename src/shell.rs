//! Shell Environment
//!
//! Main entry point for embedding. A [`Shell`] holds reusable defaults; each
//! call to [`Shell::command`] yields a [`ShellCommand`] that renders, parses
//! and runs one template with its own copy of those defaults.
//!
//! ```no_run
//! use embedded_shell::{sh, Shell};
//!
//! # async fn demo() -> Result<(), embedded_shell::ShellError> {
//! let shell = Shell::new();
//! let file = "notes with spaces.txt";
//! let count = shell.command(sh!("wc -l < {}", file)).text().await?;
//! let lines = shell.command("ls -1 | sort").nothrow().lines().await?;
//! # let _ = (count, lines);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::interpreter::cancellation::{ensure_not_cancelled, CancellationToken};
use crate::interpreter::errors::{ExpansionError, ShellError};
use crate::interpreter::execution_engine::Interpreter;
use crate::interpreter::expansion::braces_with_limit;
use crate::interpreter::types::{
    ExecutionLimits, ExecutionResult, GlobPolicy, PipelineExitPolicy, ShellOptions, ShellState,
};
use crate::parser::parse;
use crate::template::Template;

/// Brace-expand `pattern` with the default word limit.
///
/// `braces("index.{js,jsx}")` yields `["index.js", "index.jsx"]`.
pub fn braces(pattern: &str) -> Result<Vec<String>, ExpansionError> {
    braces_with_limit(pattern, ExecutionLimits::default().max_expansion_words)
}

/// Reusable defaults for invocations.
#[derive(Debug, Clone)]
pub struct Shell {
    cwd: PathBuf,
    env: HashMap<String, String>,
    options: ShellOptions,
    limits: ExecutionLimits,
}

impl Shell {
    /// Inherit this process's environment and working directory.
    pub fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::with_env(cwd, std::env::vars().collect())
    }

    /// Start from an explicit working directory and environment.
    pub fn with_env(cwd: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        Self {
            cwd: cwd.into(),
            env,
            options: ShellOptions::default(),
            limits: ExecutionLimits::default(),
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(
        mut self,
        vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        for (key, value) in vars {
            self.env.insert(key.into(), value.into());
        }
        self
    }

    pub fn throw_on_nonzero_exit(mut self, enabled: bool) -> Self {
        self.options.throw_on_nonzero_exit = enabled;
        self
    }

    pub fn pipefail(mut self, enabled: bool) -> Self {
        self.options.pipeline_exit_policy = exit_policy(enabled);
        self
    }

    pub fn glob_policy(mut self, policy: GlobPolicy) -> Self {
        self.options.glob_policy = policy;
        self
    }

    pub fn strict_variables(mut self, enabled: bool) -> Self {
        self.options.strict_variables = enabled;
        self
    }

    pub fn continue_on_substitution_error(mut self, enabled: bool) -> Self {
        self.options.continue_on_substitution_error = enabled;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.options.quiet = quiet;
        self
    }

    pub fn options(mut self, options: ShellOptions) -> Self {
        self.options = options;
        self
    }

    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn current_dir(&self) -> &PathBuf {
        &self.cwd
    }

    pub fn shell_options(&self) -> &ShellOptions {
        &self.options
    }

    pub fn execution_limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Prepare one invocation of `template`.
    pub fn command(&self, template: impl Into<Template>) -> ShellCommand {
        ShellCommand {
            template: template.into(),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            options: self.options.clone(),
            limits: self.limits.clone(),
            token: CancellationToken::new(),
        }
    }

    /// Shorthand for `self.command(template).run()`.
    pub async fn run(&self, template: impl Into<Template>) -> Result<ExecutionResult, ShellError> {
        self.command(template).run().await
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

fn exit_policy(pipefail: bool) -> PipelineExitPolicy {
    if pipefail {
        PipelineExitPolicy::Pipefail
    } else {
        PipelineExitPolicy::LastStage
    }
}

/// One invocation: a template plus its settings.
///
/// Awaiting it directly is the same as calling [`ShellCommand::run`].
#[derive(Debug, Clone)]
pub struct ShellCommand {
    template: Template,
    cwd: PathBuf,
    env: HashMap<String, String>,
    options: ShellOptions,
    limits: ExecutionLimits,
    token: CancellationToken,
}

impl ShellCommand {
    /// Working directory; relative paths resolve against the current one.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = self.cwd.join(cwd.into());
        self
    }

    /// Replace the whole environment.
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Report non-zero exit codes in the result instead of failing.
    pub fn nothrow(self) -> Self {
        self.throws(false)
    }

    pub fn throws(mut self, enabled: bool) -> Self {
        self.options.throw_on_nonzero_exit = enabled;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.options.quiet = quiet;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn pipefail(mut self, enabled: bool) -> Self {
        self.options.pipeline_exit_policy = exit_policy(enabled);
        self
    }

    pub fn glob_policy(mut self, policy: GlobPolicy) -> Self {
        self.options.glob_policy = policy;
        self
    }

    pub fn strict_variables(mut self, enabled: bool) -> Self {
        self.options.strict_variables = enabled;
        self
    }

    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Source as the parser sees it, with `${n}` for opaque values.
    pub fn display_source(&self) -> String {
        self.template.display_source()
    }

    /// Render, parse and execute.
    pub async fn run(self) -> Result<ExecutionResult, ShellError> {
        let rendered = self.template.render()?;
        trace!(source = %self.template.display_source(), values = rendered.values.len(), "rendered template");
        let sequence = parse(&rendered.source, rendered.values.len())?;

        ensure_not_cancelled(&self.token)?;

        let throws = self.options.throw_on_nonzero_exit;
        let mut state = ShellState::new(self.cwd, self.env);
        let interpreter = Interpreter::new(rendered.values, self.options, self.limits, self.token);
        let result = interpreter.run(&mut state, &sequence).await?;

        if throws && result.exit_code != 0 {
            debug!(exit_code = result.exit_code, "command failed");
            return Err(ShellError::ExitCode(Box::new(result)));
        }
        Ok(result)
    }

    /// Captured stdout as text.
    pub async fn text(self) -> Result<String, ShellError> {
        Ok(self.run().await?.text())
    }

    /// Captured stdout split into lines.
    pub async fn lines(self) -> Result<Vec<String>, ShellError> {
        Ok(self.run().await?.lines())
    }

    /// Captured stdout parsed as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ShellError> {
        Ok(self.run().await?.json()?)
    }
}

impl IntoFuture for ShellCommand {
    type Output = Result<ExecutionResult, ShellError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}
