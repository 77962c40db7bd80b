//! Parser Types and Constants
//!
//! Shared error types, limits and the interpolation slot encoding used
//! across the lexer, word parser and parser.

use thiserror::Error;
use crate::parser::lexer::TokenType;

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_INPUT_SIZE: usize = 1_000_000; // 1MB max input
pub const MAX_TOKENS: usize = 100_000; // Max tokens to parse
pub const MAX_PARSE_ITERATIONS: usize = 1_000_000; // Max iterations in parsing loops
pub const MAX_PARSER_DEPTH: usize = 64; // Max nesting of $( ... )

/// Opens an interpolation slot in rendered source text: `\u{FDD0}{<index>}`.
///
/// The marker is followed by `{`, the decimal value index and `}`, so a slot
/// occupies exactly as many characters as its display form `${<index>}`.
/// U+FDD0 is a Unicode noncharacter and is rejected in literal fragments.
pub const SLOT_MARKER: char = '\u{FDD0}';

/// Render the slot for value `index`.
pub fn slot_text(index: usize) -> String {
    format!("{}{{{}}}", SLOT_MARKER, index)
}

/// Check if a token type is a redirection operator
pub fn is_redirection_token(t: TokenType) -> bool {
    matches!(
        t,
        TokenType::Less
            | TokenType::Great
            | TokenType::DGreat
            | TokenType::LessAnd
            | TokenType::GreatAnd
            | TokenType::AndGreat
            | TokenType::AndDGreat
    )
}

/// Malformed source detected while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct LexError {
    pub message: String,
    /// Character offset into the rendered source
    pub offset: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self { message: message.into(), offset }
    }
}

/// Grammar violation detected while building the AST.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self { message: message.into(), offset }
    }
}

/// Either kind of syntax failure; both surface before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl SyntaxError {
    pub fn offset(&self) -> usize {
        match self {
            Self::Lex(e) => e.offset,
            Self::Parse(e) => e.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_text_matches_display_width() {
        for index in [0usize, 7, 42, 1234] {
            let display = format!("${{{}}}", index);
            assert_eq!(slot_text(index).chars().count(), display.chars().count());
        }
    }

    #[test]
    fn test_syntax_error_offset() {
        let err: SyntaxError = LexError::new("unterminated quote", 4).into();
        assert_eq!(err.offset(), 4);
        assert_eq!(err.to_string(), "unterminated quote (at offset 4)");
    }
}
