//! Command Substitution
//!
//! `$( ... )` runs its body in a nested interpreter over a copy of the
//! state. Captured stdout, minus trailing newlines, becomes the substituted
//! text; stderr is appended to the enclosing invocation's stderr.

use tracing::{debug, warn};

use crate::ast::types::SequenceNode;
use crate::interpreter::cancellation::ensure_not_cancelled;
use crate::interpreter::errors::{ExpansionError, ShellError};
use crate::interpreter::execution_engine::{CapturedOutput, Interpreter};
use crate::interpreter::types::ShellState;
use crate::interpreter::SHELL_NAME;

impl Interpreter {
    pub(crate) async fn command_substitution(
        &self,
        state: &ShellState,
        body: &SequenceNode,
        out: &mut CapturedOutput,
    ) -> Result<String, ShellError> {
        ensure_not_cancelled(&self.token)?;

        let limit = self.limits.max_substitution_depth;
        if self.depth + 1 > limit {
            return Err(ExpansionError::SubstitutionDepth { limit }.into());
        }

        let nested = self.nested();
        let mut scratch = state.clone();
        scratch.exit_requested = None;
        let mut captured = CapturedOutput::default();

        let status = nested.execute_sequence(&mut scratch, body, &mut captured).await;
        out.stderr.extend_from_slice(&captured.stderr);

        match status {
            Ok(code) => debug!(depth = nested.depth, exit_code = code, "command substitution finished"),
            Err(ShellError::Expansion(err)) if self.options.continue_on_substitution_error => {
                warn!(error = %err, "command substitution failed, substituting nothing");
                out.stderr
                    .extend_from_slice(format!("{}: {}\n", SHELL_NAME, err).as_bytes());
                return Ok(String::new());
            }
            Err(err) => return Err(err),
        }

        let text = String::from_utf8_lossy(&captured.stdout);
        Ok(text.trim_end_matches('\n').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::{ExecutionLimits, ShellOptions};
    use crate::parser::parser::Parser;
    use tokio_util::sync::CancellationToken;

    fn interpreter(options: ShellOptions, limits: ExecutionLimits) -> Interpreter {
        Interpreter::new(Vec::new(), options, limits, CancellationToken::new())
    }

    async fn expand(interp: &Interpreter, state: &ShellState, text: &str) -> Result<(Vec<String>, CapturedOutput), ShellError> {
        let word = Parser::new(0).parse_word(text, 0)?;
        let mut out = CapturedOutput::default();
        let words = interp.expand_word(state, &word, &mut out).await?;
        Ok((words, out))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_builtin_output_substituted() {
        let interp = interpreter(ShellOptions::default(), ExecutionLimits::default());
        let (words, _) = expand(&interp, &ShellState::default(), "$(echo hello)").await.unwrap();
        assert_eq!(words, vec!["hello"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unquoted_output_is_split() {
        let interp = interpreter(ShellOptions::default(), ExecutionLimits::default());
        let state = ShellState::default();
        let (words, _) = expand(&interp, &state, "$(echo a b)").await.unwrap();
        assert_eq!(words, vec!["a", "b"]);
        let (words, _) = expand(&interp, &state, "\"$(echo a b)\"").await.unwrap();
        assert_eq!(words, vec!["a b"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trailing_newlines_trimmed() {
        let interp = interpreter(ShellOptions::default(), ExecutionLimits::default());
        let state = ShellState::new("/", std::env::vars().collect());
        let (words, _) = expand(&interp, &state, "\"$(printf 'x\\n\\n\\n')\"").await.unwrap();
        assert_eq!(words, vec!["x"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_state_changes_do_not_leak() {
        let interp = interpreter(ShellOptions::default(), ExecutionLimits::default());
        let state = ShellState::default();
        let (words, _) = expand(&interp, &state, "$(A=1; echo $A)").await.unwrap();
        assert_eq!(words, vec!["1"]);
        assert!(state.get_var("A").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stderr_collected() {
        let interp = interpreter(ShellOptions::default(), ExecutionLimits::default());
        let (words, out) = expand(&interp, &ShellState::default(), "$(cd /nonexistent-dir)").await.unwrap();
        assert!(words.is_empty());
        assert!(String::from_utf8_lossy(&out.stderr).contains("cd"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_depth_limit() {
        let limits = ExecutionLimits { max_substitution_depth: 2, ..Default::default() };
        let interp = interpreter(ShellOptions::default(), limits);
        let state = ShellState::default();

        let (words, _) = expand(&interp, &state, "$(echo $(echo ok))").await.unwrap();
        assert_eq!(words, vec!["ok"]);

        let err = expand(&interp, &state, "$(echo $(echo $(echo deep)))").await.unwrap_err();
        assert!(matches!(err, ShellError::Expansion(ExpansionError::SubstitutionDepth { limit: 2 })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_continue_on_substitution_error() {
        let options = ShellOptions {
            strict_variables: true,
            continue_on_substitution_error: true,
            ..Default::default()
        };
        let interp = interpreter(options, ExecutionLimits::default());
        let (words, out) = expand(&interp, &ShellState::default(), "x$(echo $UNSET_NAME)").await.unwrap();
        assert_eq!(words, vec!["x"]);
        assert!(String::from_utf8_lossy(&out.stderr).contains("UNSET_NAME"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_before_substitution() {
        let interp = interpreter(ShellOptions::default(), ExecutionLimits::default());
        interp.token.cancel();
        let err = expand(&interp, &ShellState::default(), "$(echo hi)").await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
