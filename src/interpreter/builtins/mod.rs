//! Builtin Commands
//!
//! Commands that run inside the interpreter instead of as a child process.
//! A builtin is a function of the shell state and its arguments; the
//! pipeline writes its output to the stage's descriptors.

pub mod cd_cmd;
pub mod echo_cmd;
pub mod exit_cmd;
pub mod export_cmd;
pub mod unset_cmd;

pub use cd_cmd::{handle_cd, handle_pwd};
pub use echo_cmd::handle_echo;
pub use exit_cmd::handle_exit;
pub use export_cmd::handle_export;
pub use unset_cmd::handle_unset;

use crate::interpreter::types::ShellState;

/// Output of a builtin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl BuiltinResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn output(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), ..Default::default() }
    }

    pub fn failure(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self { stderr: stderr.into(), exit_code, ..Default::default() }
    }
}

const BUILTINS: &[&str] = &["cd", "pwd", "echo", "true", "false", "export", "unset", "exit"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Run builtin `name`; `None` when there is no such builtin.
pub fn run_builtin(name: &str, state: &mut ShellState, args: &[String]) -> Option<BuiltinResult> {
    let result = match name {
        "cd" => handle_cd(state, args),
        "pwd" => handle_pwd(state),
        "echo" => handle_echo(args),
        "true" => BuiltinResult::ok(),
        "false" => BuiltinResult::failure("", 1),
        "export" => handle_export(state, args),
        "unset" => handle_unset(state, args),
        "exit" => handle_exit(state, args),
        _ => return None,
    };
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(is_builtin("cd"));
        assert!(is_builtin("echo"));
        assert!(!is_builtin("ls"));
    }

    #[test]
    fn test_true_false() {
        let mut state = ShellState::default();
        assert_eq!(run_builtin("true", &mut state, &[]).map(|r| r.exit_code), Some(0));
        assert_eq!(run_builtin("false", &mut state, &[]).map(|r| r.exit_code), Some(1));
        assert!(run_builtin("cat", &mut state, &[]).is_none());
    }
}
