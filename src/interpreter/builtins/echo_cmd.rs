//! echo - Print arguments builtin
//!
//! Usage: echo [-n] [arg ...]
//! Arguments are joined with single spaces; `-n` suppresses the newline.
//! Backslash escapes are not interpreted.

use super::BuiltinResult;

/// Handle the echo builtin command.
pub fn handle_echo(args: &[String]) -> BuiltinResult {
    let mut newline = true;
    let mut start = 0;

    // Leading option words made only of `n` flags, e.g. `-n` or `-nn`
    while let Some(arg) = args.get(start) {
        if arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'n') {
            newline = false;
            start += 1;
        } else {
            break;
        }
    }

    let capacity = args[start..].iter().map(|a| a.len() + 1).sum();
    let mut stdout = String::with_capacity(capacity);
    for (i, arg) in args[start..].iter().enumerate() {
        if i > 0 {
            stdout.push(' ');
        }
        stdout.push_str(arg);
    }
    if newline {
        stdout.push('\n');
    }

    BuiltinResult::output(stdout)
}
