//! Interpreter Types
//!
//! Result, limits, options and mutable state of one invocation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Signal number used for the termination request; also the exit status
/// reported for an aborted invocation (128 + SIGTERM).
pub const ABORTED_EXIT_CODE: i32 = 128 + libc::SIGTERM;

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Set when the cancellation token fired
    pub aborted: bool,
}

impl ExecutionResult {
    pub fn new(exit_code: i32, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self { exit_code, stdout, stderr, aborted: false }
    }

    /// Success result with no output
    pub fn ok() -> Self {
        Self::new(0, Vec::new(), Vec::new())
    }

    /// Empty result of a cancelled invocation
    pub fn aborted() -> Self {
        Self {
            exit_code: ABORTED_EXIT_CODE,
            stdout: Vec::new(),
            stderr: Vec::new(),
            aborted: true,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.aborted
    }

    /// Captured stdout, lossily decoded as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Captured stdout split into lines, without line terminators.
    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(String::from).collect()
    }

    /// Deserialize captured stdout as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.stdout)
    }
}

/// What an unmatched glob expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobPolicy {
    /// Keep the pattern text unchanged
    #[default]
    Literal,
    /// Drop the word
    Null,
    /// Fail with `ExpansionError::NoGlobMatch`
    Fail,
}

/// Which stage decides a pipeline's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineExitPolicy {
    /// The last stage's exit code
    #[default]
    LastStage,
    /// The rightmost non-zero exit code, 0 if every stage succeeded
    Pipefail,
}

/// Execution limits
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Maximum number of words a single word may expand to
    pub max_expansion_words: u64,
    /// Maximum nesting of command substitutions at run time
    pub max_substitution_depth: usize,
    /// Time a process gets to exit after SIGTERM before it is killed
    pub kill_grace: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_expansion_words: 1 << 20,
            max_substitution_depth: 32,
            kill_grace: Duration::from_millis(250),
        }
    }
}

/// Behavioural switches for one invocation.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Reject with `ShellError::ExitCode` when the final exit code is non-zero
    pub throw_on_nonzero_exit: bool,
    pub pipeline_exit_policy: PipelineExitPolicy,
    pub glob_policy: GlobPolicy,
    /// Referencing an unset variable is an error
    pub strict_variables: bool,
    /// An expansion error inside `$( ... )` yields empty output plus a
    /// diagnostic instead of aborting the invocation
    pub continue_on_substitution_error: bool,
    /// Do not stream captured output to this process's stdout/stderr
    pub quiet: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            throw_on_nonzero_exit: true,
            pipeline_exit_policy: PipelineExitPolicy::LastStage,
            glob_policy: GlobPolicy::Literal,
            strict_variables: false,
            continue_on_substitution_error: false,
            quiet: true,
        }
    }
}

/// Variables, working directory and status of one invocation.
///
/// Cloned for command substitutions, multi-stage pipelines and background
/// jobs, so changes made there never leak back.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub cwd: PathBuf,
    pub previous_dir: PathBuf,
    /// Shell variables, exported or not
    pub variables: HashMap<String, String>,
    /// Names passed to child processes
    pub exported: HashSet<String>,
    /// `$?`
    pub last_exit_code: i32,
    /// Set by the `exit` builtin; stops the sequence
    pub exit_requested: Option<i32>,
}

impl ShellState {
    /// Every variable of `env` starts out exported.
    pub fn new(cwd: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        let cwd = cwd.into();
        let exported = env.keys().cloned().collect();
        Self {
            previous_dir: cwd.clone(),
            cwd,
            variables: env,
            exported,
            last_exit_code: 0,
            exit_requested: None,
        }
    }

    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn export(&mut self, name: impl Into<String>) {
        self.exported.insert(name.into());
    }

    pub fn unset(&mut self, name: &str) {
        self.variables.remove(name);
        self.exported.remove(name);
    }

    /// Environment for a child process.
    pub fn child_env(&self) -> HashMap<String, String> {
        self.exported
            .iter()
            .filter_map(|name| self.variables.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Resolve `path` against the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.cwd.join(p)
        }
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new("/", HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_text_helpers() {
        let result = ExecutionResult::new(0, b"one\ntwo\n".to_vec(), b"warn".to_vec());
        assert_eq!(result.text(), "one\ntwo\n");
        assert_eq!(result.lines(), vec!["one", "two"]);
        assert_eq!(result.stderr_text(), "warn");
        assert!(result.success());
    }

    #[test]
    fn test_result_json() {
        let result = ExecutionResult::new(0, br#"{"a": [1, 2]}"#.to_vec(), Vec::new());
        let value: serde_json::Value = result.json().unwrap();
        assert_eq!(value["a"][1], 2);
    }

    #[test]
    fn test_aborted_result() {
        let result = ExecutionResult::aborted();
        assert!(result.aborted);
        assert!(!result.success());
        assert_eq!(result.exit_code, 143);
    }

    #[test]
    fn test_default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.max_expansion_words, 1_048_576);
        assert_eq!(limits.max_substitution_depth, 32);
    }

    #[test]
    fn test_child_env_only_exported() {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/bin".to_string());
        let mut state = ShellState::new("/tmp", env);
        state.set_var("LOCAL", "1");
        let child = state.child_env();
        assert_eq!(child.get("PATH").map(String::as_str), Some("/bin"));
        assert!(!child.contains_key("LOCAL"));

        state.export("LOCAL");
        assert!(state.child_env().contains_key("LOCAL"));
        state.unset("LOCAL");
        assert!(state.get_var("LOCAL").is_none());
    }

    #[test]
    fn test_resolve_path() {
        let state = ShellState::new("/work", HashMap::new());
        assert_eq!(state.resolve_path("a/b"), PathBuf::from("/work/a/b"));
        assert_eq!(state.resolve_path("/etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn test_policy_deserialize() {
        let policy: GlobPolicy = serde_json::from_str("\"fail\"").unwrap();
        assert_eq!(policy, GlobPolicy::Fail);
        let policy: PipelineExitPolicy = serde_json::from_str("\"pipefail\"").unwrap();
        assert_eq!(policy, PipelineExitPolicy::Pipefail);
    }
}
