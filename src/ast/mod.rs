//! Abstract Syntax Tree (AST) Types
//!
//! Architecture:
//!   Template → Lexer → Parser → AST → Expander → Executor → ExecutionResult

pub mod types;
