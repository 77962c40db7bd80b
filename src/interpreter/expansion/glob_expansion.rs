//! Glob Expansion
//!
//! Pathname expansion of unquoted `*`, `?` and `[...]` against the
//! invocation's working directory. Matches are sorted; what an unmatched
//! pattern produces is decided by [`GlobPolicy`].

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::interpreter::errors::ExpansionError;
use crate::interpreter::types::GlobPolicy;

/// Expand one field.
///
/// `pattern` is the glob with quoted parts escaped, `literal` is the field's
/// text as written (used when nothing matches under the literal policy).
pub fn expand_glob_pattern(
    pattern: &str,
    literal: &str,
    cwd: &Path,
    policy: GlobPolicy,
) -> Result<Vec<String>, ExpansionError> {
    let matches = match glob_pattern(pattern, cwd) {
        Ok(m) => m,
        // An invalid pattern (e.g. an unclosed `[`) is plain text
        Err(_) => return Ok(vec![literal.to_string()]),
    };

    if !matches.is_empty() {
        return Ok(matches);
    }

    match policy {
        GlobPolicy::Literal => Ok(vec![literal.to_string()]),
        GlobPolicy::Null => Ok(Vec::new()),
        GlobPolicy::Fail => Err(ExpansionError::NoGlobMatch { pattern: literal.to_string() }),
    }
}

/// Perform glob pattern matching.
/// Relative patterns return paths relative to `cwd`.
fn glob_pattern(pattern: &str, cwd: &Path) -> Result<Vec<String>, glob::PatternError> {
    // Validate before touching the filesystem
    Pattern::new(pattern)?;

    let absolute = pattern.starts_with('/');
    let full_pattern = if absolute {
        pattern.to_string()
    } else {
        let base = Pattern::escape(&cwd.to_string_lossy());
        format!("{}/{}", base.trim_end_matches('/'), pattern)
    };

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut matches: Vec<String> = glob::glob_with(&full_pattern, options)?
        .filter_map(Result::ok)
        .map(|path| {
            if absolute {
                path.display().to_string()
            } else {
                path.strip_prefix(cwd)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| path.display().to_string())
            }
        })
        .collect();

    // Sort matches for consistent output
    matches.sort();
    Ok(matches)
}
