//! exit - Stop the sequence builtin

use super::BuiltinResult;
use crate::interpreter::types::ShellState;
use crate::interpreter::SHELL_NAME;

/// Handle the exit builtin command.
///
/// Records the requested status in `state.exit_requested`; the sequence
/// walker stops before the next pipeline. Without an argument the status of
/// the previous pipeline is used.
pub fn handle_exit(state: &mut ShellState, args: &[String]) -> BuiltinResult {
    let (exit_code, stderr) = match args.first() {
        None => (state.last_exit_code, String::new()),
        Some(arg) => match arg.parse::<i64>() {
            // Exit codes are modulo 256 (wrap around)
            Ok(parsed) => (parsed.rem_euclid(256) as i32, String::new()),
            Err(_) => (2, format!("{}: exit: {}: numeric argument required\n", SHELL_NAME, arg)),
        },
    };

    state.exit_requested = Some(exit_code);
    BuiltinResult { stdout: String::new(), stderr, exit_code }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_no_args() {
        let mut state = ShellState::default();
        state.last_exit_code = 42;
        let result = handle_exit(&mut state, &[]);
        assert_eq!(result.exit_code, 42);
        assert_eq!(state.exit_requested, Some(42));
    }

    #[test]
    fn test_exit_with_code() {
        let mut state = ShellState::default();
        assert_eq!(handle_exit(&mut state, &["3".to_string()]).exit_code, 3);
        assert_eq!(handle_exit(&mut state, &["256".to_string()]).exit_code, 0);
        assert_eq!(handle_exit(&mut state, &["-1".to_string()]).exit_code, 255);
    }

    #[test]
    fn test_exit_non_numeric() {
        let mut state = ShellState::default();
        let result = handle_exit(&mut state, &["abc".to_string()]);
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("numeric argument required"));
        assert_eq!(state.exit_requested, Some(2));
    }
}
