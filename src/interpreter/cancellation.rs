//! Cancellation
//!
//! One [`CancellationToken`] is threaded through expansion and execution of an
//! invocation, including every nested command substitution and background
//! job. Each suspension point runs [`ensure_not_cancelled`] first; waits race
//! against [`CancellationToken::cancelled`].

pub use tokio_util::sync::CancellationToken;

use crate::interpreter::errors::CancelledError;

/// Fail fast when the token has already fired.
pub fn ensure_not_cancelled(token: &CancellationToken) -> Result<(), CancelledError> {
    if token.is_cancelled() {
        tracing::debug!("cancellation observed");
        Err(CancelledError::new())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_not_cancelled() {
        let token = CancellationToken::new();
        assert!(ensure_not_cancelled(&token).is_ok());
        token.cancel();
        let err = ensure_not_cancelled(&token).unwrap_err();
        assert!(err.partial.aborted);
    }

    #[test]
    fn test_child_token_follows_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(ensure_not_cancelled(&child).is_err());
    }
}
