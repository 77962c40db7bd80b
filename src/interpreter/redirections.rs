//! Redirection Handling
//!
//! Each pipeline stage starts with automatic descriptors (null device or
//! pipe for stdin, pipe or capture for stdout, the shared stderr capture),
//! then explicit redirects are overlaid in source order:
//! - `<` : read stdin from file
//! - `>` / `>>` : write (truncate / append) a descriptor to file
//! - `&>` / `&>>` : write both stdout and stderr to file
//! - `n>&m` / `n<&m` : make descriptor n a copy of descriptor m

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use crate::interpreter::SHELL_NAME;

/// What a redirect does once its target is expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    Read(PathBuf),
    Write { path: PathBuf, append: bool },
    WriteBoth { path: PathBuf, append: bool },
    Duplicate(u32),
}

/// A redirect with its target already expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRedirect {
    pub fd: u32,
    pub action: RedirectAction,
    /// Target as the user wrote it after expansion, for diagnostics
    pub target: String,
}

/// Standard descriptors of one pipeline stage.
#[derive(Debug)]
pub struct StageFds {
    pub stdin: OwnedFd,
    pub stdout: OwnedFd,
    pub stderr: OwnedFd,
}

impl StageFds {
    fn slot(&mut self, fd: u32) -> Option<&mut OwnedFd> {
        match fd {
            0 => Some(&mut self.stdin),
            1 => Some(&mut self.stdout),
            2 => Some(&mut self.stderr),
            _ => None,
        }
    }

    fn get(&self, fd: u32) -> Option<&OwnedFd> {
        match fd {
            0 => Some(&self.stdin),
            1 => Some(&self.stdout),
            2 => Some(&self.stderr),
            _ => None,
        }
    }

    /// Overlay `redirects` in order. On failure the returned message is the
    /// complete diagnostic line for the stage's stderr.
    pub fn apply(&mut self, redirects: &[PreparedRedirect]) -> Result<(), String> {
        for redirect in redirects {
            let fail = |err: io::Error| format!("{}: {}: {}\n", SHELL_NAME, redirect.target, describe_io_error(&err));

            match &redirect.action {
                RedirectAction::Read(path) => {
                    let file = File::open(path).map_err(fail)?;
                    self.replace(redirect.fd, file.into())?;
                }
                RedirectAction::Write { path, append } => {
                    let file = open_for_write(path, *append).map_err(fail)?;
                    self.replace(redirect.fd, file.into())?;
                }
                RedirectAction::WriteBoth { path, append } => {
                    let file: OwnedFd = open_for_write(path, *append).map_err(fail)?.into();
                    self.stderr = file.try_clone().map_err(fail)?;
                    self.stdout = file;
                }
                RedirectAction::Duplicate(source) => {
                    let copy = self
                        .get(*source)
                        .ok_or_else(|| bad_descriptor(*source))?
                        .try_clone()
                        .map_err(fail)?;
                    self.replace(redirect.fd, copy)?;
                }
            }
        }
        Ok(())
    }

    fn replace(&mut self, fd: u32, new: OwnedFd) -> Result<(), String> {
        let slot = self.slot(fd).ok_or_else(|| bad_descriptor(fd))?;
        *slot = new;
        Ok(())
    }
}

fn bad_descriptor(fd: u32) -> String {
    format!("{}: {}: Bad file descriptor\n", SHELL_NAME, fd)
}

fn open_for_write(path: &Path, append: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path)
}

/// An `io::Error` message without the trailing `(os error N)`.
pub fn describe_io_error(err: &io::Error) -> String {
    let text = err.to_string();
    match text.find(" (os error") {
        Some(end) => text[..end].to_string(),
        None => text,
    }
}

/// Read end on the null device.
pub fn null_reader() -> io::Result<OwnedFd> {
    Ok(File::open("/dev/null")?.into())
}

/// Write end on the null device.
pub fn null_writer() -> io::Result<OwnedFd> {
    Ok(OpenOptions::new().write(true).open("/dev/null")?.into())
}

/// Best-effort write of a diagnostic to a stage descriptor.
pub fn write_diagnostic(fd: OwnedFd, message: &str) {
    let mut file = File::from(fd);
    if let Err(err) = file.write_all(message.as_bytes()) {
        tracing::debug!(error = %err, "failed to write diagnostic");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn stage() -> StageFds {
        StageFds {
            stdin: null_reader().unwrap(),
            stdout: null_writer().unwrap(),
            stderr: null_writer().unwrap(),
        }
    }

    fn write_redirect(fd: u32, path: &Path, append: bool) -> PreparedRedirect {
        PreparedRedirect {
            fd,
            action: RedirectAction::Write { path: path.to_path_buf(), append },
            target: path.display().to_string(),
        }
    }

    fn write_through(fd: OwnedFd, text: &str) {
        File::from(fd).write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_write_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut fds = stage();
        fds.apply(&[write_redirect(1, &path, false)]).unwrap();
        write_through(fds.stdout, "one\n");

        let mut fds = stage();
        fds.apply(&[write_redirect(1, &path, true)]).unwrap();
        write_through(fds.stdout, "two\n");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_read_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "input").unwrap();

        let mut fds = stage();
        let redirect = PreparedRedirect { fd: 0, action: RedirectAction::Read(path), target: "in.txt".into() };
        fds.apply(&[redirect]).unwrap();

        let mut text = String::new();
        File::from(fds.stdin).read_to_string(&mut text).unwrap();
        assert_eq!(text, "input");
    }

    #[test]
    fn test_duplicate_follows_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("both.txt");

        // > file 2>&1: stderr joins the file
        let mut fds = stage();
        let dup = PreparedRedirect { fd: 2, action: RedirectAction::Duplicate(1), target: "&1".into() };
        fds.apply(&[write_redirect(1, &path, false), dup]).unwrap();
        write_through(fds.stdout, "out\n");
        write_through(fds.stderr, "err\n");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "out\nerr\n");
    }

    #[test]
    fn test_write_both() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.txt");
        let mut fds = stage();
        let redirect = PreparedRedirect {
            fd: 1,
            action: RedirectAction::WriteBoth { path: path.clone(), append: false },
            target: "all.txt".into(),
        };
        fds.apply(&[redirect]).unwrap();
        write_through(fds.stderr, "a");
        write_through(fds.stdout, "b");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ab");
    }

    #[test]
    fn test_missing_input_file() {
        let mut fds = stage();
        let redirect = PreparedRedirect {
            fd: 0,
            action: RedirectAction::Read(PathBuf::from("/nonexistent/input")),
            target: "/nonexistent/input".into(),
        };
        let message = fds.apply(&[redirect]).unwrap_err();
        assert_eq!(message, format!("{}: /nonexistent/input: No such file or directory\n", SHELL_NAME));
    }

    #[test]
    fn test_directory_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut fds = stage();
        let message = fds.apply(&[write_redirect(1, dir.path(), false)]).unwrap_err();
        assert!(message.ends_with("Is a directory\n"));
    }
}
