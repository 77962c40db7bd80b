//! Interpreter module
//!
//! Expands and executes parsed sequences: word expansion, builtins, process
//! pipelines, redirections and cancellation.

pub mod builtins;
pub mod cancellation;
pub mod errors;
pub mod execution_engine;
pub mod expansion;
pub mod pipeline_execution;
pub mod process;
pub mod redirections;
pub mod types;

pub use cancellation::{ensure_not_cancelled, CancellationToken};
pub use errors::*;
pub use execution_engine::{CapturedOutput, Interpreter};
pub use expansion::{braces_with_limit, escape};
pub use pipeline_execution::{PipelineState, PreparedCommand};
pub use process::{ProcessHandle, ProcessState};
pub use types::*;

/// Prefix of diagnostics written by the shell itself.
pub const SHELL_NAME: &str = "embedded-shell";
