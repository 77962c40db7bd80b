//! cd, pwd - Working directory builtins
//!
//! Supports:
//! - cd [dir] - change to directory
//! - cd - - change to previous directory (OLDPWD)
//! - cd ~ / cd - change to home directory
//! - cd -L - use logical path (default)
//! - cd -P - use physical path (resolve symlinks)
//! - CDPATH support for relative paths
//!
//! The new directory only outlives the command when `cd` runs as a
//! single-command pipeline.

use std::path::{Component, Path, PathBuf};

use super::BuiltinResult;
use crate::interpreter::types::ShellState;
use crate::interpreter::SHELL_NAME;

/// Handle the cd builtin command
pub fn handle_cd(state: &mut ShellState, args: &[String]) -> BuiltinResult {
    let mut physical = false;
    let mut print_path = false;

    // Parse options
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--" {
            i += 1;
            break;
        } else if arg == "-L" {
            physical = false;
            i += 1;
        } else if arg == "-P" {
            physical = true;
            i += 1;
        } else if arg.starts_with('-') && arg != "-" {
            return BuiltinResult::failure(format!("{}: cd: {}: invalid option\n", SHELL_NAME, arg), 2);
        } else {
            break;
        }
    }

    let home = || state.get_var("HOME").unwrap_or("/").to_string();
    let target = match args.get(i).map(String::as_str) {
        None | Some("~") => home(),
        Some("-") => {
            print_path = true;
            state.previous_dir.to_string_lossy().into_owned()
        }
        Some(dir) => dir.to_string(),
    };

    let mut new_dir = normalize_path(&state.resolve_path(&target));

    // CDPATH is only consulted for relative names that don't start with `.`
    if !target.starts_with('/') && !target.starts_with('.') {
        if let Some(cdpath) = state.get_var("CDPATH") {
            for dir in cdpath.split(':').filter(|d| !d.is_empty()) {
                let candidate = normalize_path(&state.resolve_path(dir).join(&target));
                if candidate.is_dir() {
                    new_dir = candidate;
                    print_path = true;
                    break;
                }
            }
        }
    }

    if !new_dir.exists() {
        return BuiltinResult::failure(
            format!("{}: cd: {}: No such file or directory\n", SHELL_NAME, target),
            1,
        );
    }
    if !new_dir.is_dir() {
        return BuiltinResult::failure(format!("{}: cd: {}: Not a directory\n", SHELL_NAME, target), 1);
    }

    if physical {
        if let Ok(canonical) = std::fs::canonicalize(&new_dir) {
            new_dir = canonical;
        }
    }

    state.previous_dir = std::mem::replace(&mut state.cwd, new_dir);
    let pwd = state.cwd.to_string_lossy().into_owned();
    let oldpwd = state.previous_dir.to_string_lossy().into_owned();
    state.set_var("PWD", pwd.clone());
    state.set_var("OLDPWD", oldpwd);

    if print_path {
        BuiltinResult::output(format!("{}\n", pwd))
    } else {
        BuiltinResult::ok()
    }
}

/// Handle the pwd builtin command
pub fn handle_pwd(state: &ShellState) -> BuiltinResult {
    BuiltinResult::output(format!("{}\n", state.cwd.display()))
}

/// Normalize a path by resolving . and .. components lexically
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => result.push(part),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn state_at(cwd: &str) -> ShellState {
        let mut env = HashMap::new();
        env.insert("HOME".to_string(), "/tmp".to_string());
        ShellState::new(cwd, env)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("/foo/bar")), PathBuf::from("/foo/bar"));
        assert_eq!(normalize_path(Path::new("/foo/../bar")), PathBuf::from("/bar"));
        assert_eq!(normalize_path(Path::new("/foo/./bar")), PathBuf::from("/foo/bar"));
        assert_eq!(normalize_path(Path::new("/foo/bar/../..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("/foo//bar")), PathBuf::from("/foo/bar"));
    }

    #[test]
    fn test_handle_cd_to_tmp() {
        let mut state = state_at("/");
        let result = handle_cd(&mut state, &["tmp".to_string()]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(state.cwd, PathBuf::from("/tmp"));
        assert_eq!(state.get_var("PWD"), Some("/tmp"));
        assert_eq!(state.get_var("OLDPWD"), Some("/"));
    }

    #[test]
    fn test_handle_cd_home() {
        let mut state = state_at("/");
        let result = handle_cd(&mut state, &[]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(state.cwd, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_handle_cd_previous() {
        let mut state = state_at("/tmp");
        state.previous_dir = PathBuf::from("/");
        let result = handle_cd(&mut state, &["-".to_string()]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(state.cwd, PathBuf::from("/"));
        assert_eq!(result.stdout, "/\n");
    }

    #[test]
    fn test_handle_cd_missing() {
        let mut state = state_at("/");
        let result = handle_cd(&mut state, &["no-such-dir-xyz".to_string()]);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file or directory"));
        assert_eq!(state.cwd, PathBuf::from("/"));
    }

    #[test]
    fn test_handle_cd_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), "x").unwrap();
        let mut state = state_at(dir.path().to_str().unwrap());
        let result = handle_cd(&mut state, &["file".to_string()]);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("Not a directory"));
    }

    #[test]
    fn test_handle_pwd() {
        let state = state_at("/tmp");
        assert_eq!(handle_pwd(&state).stdout, "/tmp\n");
    }
}
