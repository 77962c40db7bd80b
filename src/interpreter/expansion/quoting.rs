//! Quoting helpers
//!
//! Quote a value for safe reuse as shell source, e.g. before splicing it
//! into a template with `raw()`.

/// Characters that never need quoting.
fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | ',' | '+' | '@' | '%')
}

/// Quote `value` so the lexer reads it back as exactly one literal word.
///
/// - Empty strings become ''
/// - Strings of safe characters are returned unchanged
/// - Everything else is single-quoted, with embedded quotes written as '\''
pub fn escape(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }

    if value.chars().all(is_safe_char) {
        return value.to_string();
    }

    let mut result = String::with_capacity(value.len() + 2);
    result.push('\'');
    for c in value.chars() {
        if c == '\'' {
            result.push_str("'\\''");
        } else {
            result.push(c);
        }
    }
    result.push('\'');
    result
}
