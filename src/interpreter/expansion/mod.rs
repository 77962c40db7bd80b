//! Word Expansion
//!
//! Brace groups, variables, host values, command substitution, field
//! splitting and pathname expansion.

pub mod brace_expansion;
pub mod command_substitution;
pub mod glob_expansion;
pub mod quoting;
pub mod word_expansion;

pub use brace_expansion::{braces_with_limit, count_brace_words};
pub use glob_expansion::expand_glob_pattern;
pub use quoting::escape;
pub use word_expansion::display_word;
