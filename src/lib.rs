//! embedded-shell - A POSIX-like shell for embedding in Rust programs
//!
//! Templates interleave literal shell source with host values. Values are
//! passed to commands as opaque arguments and never re-parsed, unless they
//! are explicitly wrapped with [`raw`]. Scripts run as real OS processes
//! connected by pipes, under a cancellation token.
//!
//! ```no_run
//! use embedded_shell::{sh, Shell};
//!
//! # async fn demo() -> Result<(), embedded_shell::ShellError> {
//! let path = "notes/meeting 1.txt";
//! let todos = Shell::new().command(sh!("grep -c TODO {}", path)).nothrow().text().await?;
//! # let _ = todos;
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod config;
pub mod interpreter;
pub mod parser;
pub mod shell;
pub mod template;

pub use config::{ConfigError, ShellConfig};
pub use interpreter::{
    escape, CancellationToken, CancelledError, ExecutionLimits, ExecutionResult, ExpansionError,
    GlobPolicy, PipelineExitPolicy, ShellError, ShellOptions, SpawnError,
};
pub use parser::{parse, LexError, ParseError, SyntaxError};
pub use shell::{braces, Shell, ShellCommand};
pub use template::{raw, HostValue, Template};
