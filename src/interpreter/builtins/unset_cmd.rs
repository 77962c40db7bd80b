//! unset - Remove variables builtin
//!
//! Supports:
//! - unset VAR... - remove variables
//! - unset -v VAR - remove variable (explicit)

use super::BuiltinResult;
use crate::interpreter::types::ShellState;
use crate::interpreter::SHELL_NAME;
use crate::parser::lexer::is_valid_name;

/// Handle the unset builtin command
pub fn handle_unset(state: &mut ShellState, args: &[String]) -> BuiltinResult {
    let mut stderr = String::new();
    let mut exit_code = 0;

    for arg in args {
        if arg == "-v" || arg == "--" {
            continue;
        }
        if !is_valid_name(arg) {
            stderr.push_str(&format!("{}: unset: `{}': not a valid identifier\n", SHELL_NAME, arg));
            exit_code = 1;
            continue;
        }
        state.unset(arg);
    }

    BuiltinResult { stdout: String::new(), stderr, exit_code }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_removes_variable() {
        let mut state = ShellState::default();
        state.set_var("A", "1");
        state.export("A");
        let result = handle_unset(&mut state, &["A".to_string()]);
        assert_eq!(result.exit_code, 0);
        assert!(state.get_var("A").is_none());
        assert!(!state.exported.contains("A"));
    }

    #[test]
    fn test_unset_missing_is_ok() {
        let mut state = ShellState::default();
        assert_eq!(handle_unset(&mut state, &["-v".to_string(), "NOPE".to_string()]).exit_code, 0);
    }

    #[test]
    fn test_unset_invalid_name() {
        let mut state = ShellState::default();
        let result = handle_unset(&mut state, &["a-b".to_string()]);
        assert_eq!(result.exit_code, 1);
    }
}
