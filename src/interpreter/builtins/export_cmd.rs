//! export - Mark variables for child processes builtin
//!
//! Usage:
//!   export              - List all exported variables
//!   export -p           - List all exported variables (same as no args)
//!   export NAME=value   - Set and export variable
//!   export NAME         - Export existing variable (or create empty)
//!   export -n NAME      - Un-export variable, keeping its value

use super::BuiltinResult;
use crate::interpreter::expansion::quoting::escape;
use crate::interpreter::types::ShellState;
use crate::interpreter::SHELL_NAME;
use crate::parser::lexer::is_valid_name;

/// Handle the export builtin command.
pub fn handle_export(state: &mut ShellState, args: &[String]) -> BuiltinResult {
    let mut unexport = false;
    let mut names: Vec<&str> = Vec::new();

    for arg in args {
        match arg.as_str() {
            "-n" => unexport = true,
            "-p" | "--" => {}
            _ => names.push(arg),
        }
    }

    // No args or just -p: list all exported variables
    if names.is_empty() && !unexport {
        let mut sorted: Vec<&String> = state.exported.iter().collect();
        sorted.sort();
        let mut stdout = String::new();
        for name in sorted {
            if let Some(value) = state.get_var(name) {
                stdout.push_str(&format!("export {}={}\n", name, escape(value)));
            }
        }
        return BuiltinResult::output(stdout);
    }

    let mut stderr = String::new();
    let mut exit_code = 0;

    for arg in names {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (arg, None),
        };

        if !is_valid_name(name) {
            stderr.push_str(&format!("{}: export: `{}': not a valid identifier\n", SHELL_NAME, arg));
            exit_code = 1;
            continue;
        }

        if unexport {
            if let Some(value) = value {
                state.set_var(name, value);
            }
            state.exported.remove(name);
            continue;
        }

        match value {
            Some(value) => state.set_var(name, value),
            None if state.get_var(name).is_none() => state.set_var(name, ""),
            None => {}
        }
        state.export(name);
    }

    BuiltinResult { stdout: String::new(), stderr, exit_code }
}
