//! Interpreter Errors
//!
//! Error taxonomy at the embedding boundary:
//! - syntax errors (lex/parse) surface before anything runs
//! - expansion errors abort the invocation before the offending pipeline spawns
//! - spawn failures become exit codes 126/127 and never reach the caller
//! - a non-zero exit becomes an error only when the caller asked for it
//! - cancellation carries whatever output was captured

use thiserror::Error;

use crate::interpreter::types::ExecutionResult;
use crate::parser::types::{LexError, ParseError, SyntaxError};

/// Exit code reported when a command cannot be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when a command exists but cannot be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Failure while resolving words into arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    /// Unset variable referenced with `strict_variables` on
    #[error("{name}: unbound variable")]
    UnboundVariable { name: String },

    /// Brace groups or list values would produce more words than allowed
    #[error("expansion of `{word}` produces more than {limit} words")]
    Overflow { word: String, limit: u64 },

    /// Glob without matches under the `fail` policy
    #[error("no matches found: {pattern}")]
    NoGlobMatch { pattern: String },

    /// Redirect target that did not expand to exactly one word
    #[error("{word}: ambiguous redirect")]
    AmbiguousRedirect { word: String },

    /// `$( ... )` nested deeper than the configured maximum
    #[error("command substitution nested deeper than {limit} levels")]
    SubstitutionDepth { limit: usize },
}

/// The cancellation token fired before or during execution.
#[derive(Debug, Clone, Error)]
#[error("execution cancelled")]
pub struct CancelledError {
    /// Output captured before the token fired; `aborted` is always set.
    pub partial: ExecutionResult,
}

impl CancelledError {
    pub fn new() -> Self {
        Self { partial: ExecutionResult::aborted() }
    }

    pub fn with_partial(mut partial: ExecutionResult) -> Self {
        partial.aborted = true;
        Self { partial }
    }

    /// Put output captured by enclosing stages in front of this error's output.
    pub fn prepend_output(&mut self, stdout: &[u8], stderr: &[u8]) {
        let mut out = stdout.to_vec();
        out.append(&mut self.partial.stdout);
        self.partial.stdout = out;

        let mut err = stderr.to_vec();
        err.append(&mut self.partial.stderr);
        self.partial.stderr = err;
    }
}

impl Default for CancelledError {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a command could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnErrorKind {
    NotFound,
    NotExecutable,
}

/// A command binary could not be located or executed.
///
/// Never returned to the caller: the stage reports [`SpawnError::exit_code`]
/// and the message goes to the stage's stderr.
#[derive(Debug, Clone, Error)]
#[error("{message}: {program}")]
pub struct SpawnError {
    pub program: String,
    pub kind: SpawnErrorKind,
    pub message: String,
}

impl SpawnError {
    pub fn from_io(program: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self {
                program: program.to_string(),
                kind: SpawnErrorKind::NotFound,
                message: "command not found".to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self {
                program: program.to_string(),
                kind: SpawnErrorKind::NotExecutable,
                message: "permission denied".to_string(),
            },
            _ => Self {
                program: program.to_string(),
                kind: SpawnErrorKind::NotExecutable,
                message: err.to_string(),
            },
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind {
            SpawnErrorKind::NotFound => EXIT_NOT_FOUND,
            SpawnErrorKind::NotExecutable => EXIT_NOT_EXECUTABLE,
        }
    }
}

/// Every failure an invocation can settle with.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    /// Non-zero exit with `throw_on_nonzero_exit` enabled
    #[error("command failed with exit code {}", .0.exit_code)]
    ExitCode(Box<ExecutionResult>),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    #[error("failed to decode output as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SyntaxError> for ShellError {
    fn from(err: SyntaxError) -> Self {
        match err {
            SyntaxError::Lex(e) => ShellError::Lex(e),
            SyntaxError::Parse(e) => ShellError::Parse(e),
        }
    }
}

impl ShellError {
    /// The execution result carried by the error, if any.
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            ShellError::ExitCode(result) => Some(result),
            ShellError::Cancelled(e) => Some(&e.partial),
            _ => None,
        }
    }

    /// Exit code a command-line front end should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::Lex(_) | ShellError::Parse(_) => 2,
            ShellError::ExitCode(result) => result.exit_code,
            ShellError::Cancelled(e) => e.partial.exit_code,
            _ => 1,
        }
    }

    /// Source offset for syntax errors.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ShellError::Lex(e) => Some(e.offset),
            ShellError::Parse(e) => Some(e.offset),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShellError::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_codes() {
        let not_found = std::io::Error::from(std::io::ErrorKind::NotFound);
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(SpawnError::from_io("nope", &not_found).exit_code(), 127);
        assert_eq!(SpawnError::from_io("./file", &denied).exit_code(), 126);
        assert_eq!(
            SpawnError::from_io("nope", &not_found).to_string(),
            "command not found: nope"
        );
    }

    #[test]
    fn test_cancelled_error_is_aborted() {
        let err = CancelledError::with_partial(ExecutionResult::new(0, b"x".to_vec(), Vec::new()));
        assert!(err.partial.aborted);
    }

    #[test]
    fn test_prepend_output() {
        let mut err = CancelledError::with_partial(ExecutionResult::new(0, b"b".to_vec(), b"2".to_vec()));
        err.prepend_output(b"a", b"1");
        assert_eq!(err.partial.stdout, b"ab");
        assert_eq!(err.partial.stderr, b"12");
    }

    #[test]
    fn test_shell_error_from_syntax() {
        let err: ShellError = SyntaxError::Parse(ParseError::new("bad", 3)).into();
        assert_eq!(err.offset(), Some(3));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_error_carries_result() {
        let err = ShellError::ExitCode(Box::new(ExecutionResult::new(3, Vec::new(), Vec::new())));
        assert_eq!(err.result().map(|r| r.exit_code), Some(3));
        assert_eq!(err.to_string(), "command failed with exit code 3");
    }
}
