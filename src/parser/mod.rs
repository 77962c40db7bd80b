//! Parser module for shell templates
//!
//! This module contains the lexer, word parser and sequence parser.

pub mod types;
pub mod lexer;
pub mod word_parser;
pub mod parser;

// Re-exports
pub use types::{LexError, ParseError, SyntaxError, SLOT_MARKER};
pub use lexer::{Lexer, Token, TokenKind, TokenType};
pub use parser::{parse, Parser};
