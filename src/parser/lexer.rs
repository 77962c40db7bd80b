//! Lexer for Shell Templates
//!
//! The lexer tokenizes rendered template source into a stream of tokens that
//! the parser consumes. It handles:
//! - Operators and redirections
//! - Words (with quoting rules, kept verbatim for the word parser)
//! - Command substitutions and `${...}` as part of word text
//! - Interpolation slots
//! - Comments and line continuations

use std::collections::HashMap;

use crate::parser::types::{LexError, SLOT_MARKER};

/// Token types for the shell lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // End of input
    Eof,

    // Newlines and separators
    Newline,
    Semicolon,
    Amp, // &

    // Operators
    Pipe,   // |
    AndAnd, // &&
    OrOr,   // ||

    // Redirections
    Less,      // <
    Great,     // >
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    AndGreat,  // &>
    AndDGreat, // &>>

    // Grouping (recognized only to be rejected)
    LParen,
    RParen,

    // Words
    Word,
    AssignmentWord, // VAR=value
    Number,         // For redirections like 2>&1
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "EOF",
            Self::Newline => "NEWLINE",
            Self::Semicolon => ";",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Less => "<",
            Self::Great => ">",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Word => "WORD",
            Self::AssignmentWord => "ASSIGNMENT_WORD",
            Self::Number => "NUMBER",
        }
    }
}

/// Coarse token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Operator,
    Redirect,
    /// A word consisting of exactly one interpolation slot
    InterpolationSlot,
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    /// Character offsets in the rendered source
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            token_type,
            value: value.into(),
            start,
            end,
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self.token_type {
            TokenType::Word | TokenType::AssignmentWord | TokenType::Number => {
                if is_single_slot(&self.value) {
                    TokenKind::InterpolationSlot
                } else {
                    TokenKind::Word
                }
            }
            t if crate::parser::types::is_redirection_token(t) => TokenKind::Redirect,
            _ => TokenKind::Operator,
        }
    }
}

fn is_single_slot(value: &str) -> bool {
    let mut chars = value.chars();
    if chars.next() != Some(SLOT_MARKER) || chars.next() != Some('{') {
        return false;
    }
    let rest: String = chars.collect();
    match rest.strip_suffix('}') {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

lazy_static::lazy_static! {
    /// Single-character operators
    static ref SINGLE_CHAR_OPS: HashMap<char, TokenType> = {
        let mut m = HashMap::new();
        m.insert('|', TokenType::Pipe);
        m.insert('&', TokenType::Amp);
        m.insert(';', TokenType::Semicolon);
        m.insert('(', TokenType::LParen);
        m.insert(')', TokenType::RParen);
        m.insert('<', TokenType::Less);
        m.insert('>', TokenType::Great);
        m
    };
}

/// Three-character operators
const THREE_CHAR_OPS: &[(&str, TokenType)] = &[("&>>", TokenType::AndDGreat)];

/// Two-character operators
const TWO_CHAR_OPS: &[(&str, TokenType)] = &[
    ("&&", TokenType::AndAnd),
    ("||", TokenType::OrOr),
    (">>", TokenType::DGreat),
    ("<&", TokenType::LessAnd),
    (">&", TokenType::GreatAnd),
    ("&>", TokenType::AndGreat),
];

/// Check if a string is a valid variable name
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Check if a character is a word boundary (ends a word token)
fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

// =============================================================================
// Span scanners (shared with the word parser)
// =============================================================================

/// Given `chars[start] == '\''`, return the index just past the closing quote.
pub fn scan_single_quoted(chars: &[char], start: usize, base: usize) -> Result<usize, LexError> {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '\'' {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(LexError::new("unterminated single quote", base + start))
}

/// Given `chars[start] == '"'`, return the index just past the closing quote.
pub fn scan_double_quoted(chars: &[char], start: usize, base: usize) -> Result<usize, LexError> {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return Ok(i + 1),
            '$' if chars.get(i + 1) == Some(&'(') => i = scan_command_substitution(chars, i, base)?,
            '$' if chars.get(i + 1) == Some(&'{') => i = scan_braced_parameter(chars, i, base)?,
            SLOT_MARKER => i = scan_slot(chars, i, base)?.1,
            _ => i += 1,
        }
    }
    Err(LexError::new("unterminated double quote", base + start))
}

/// Given `chars[start..]` starting with `$(`, return the index just past the
/// matching `)`. Quotes and nested substitutions are skipped as units.
pub fn scan_command_substitution(chars: &[char], start: usize, base: usize) -> Result<usize, LexError> {
    let mut depth = 1;
    let mut i = start + 2;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\'' => i = scan_single_quoted(chars, i, base)?,
            '"' => i = scan_double_quoted(chars, i, base)?,
            SLOT_MARKER => i = scan_slot(chars, i, base)?.1,
            '(' => {
                depth += 1;
                i += 1;
            }
            ')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => i += 1,
        }
    }
    Err(LexError::new("unterminated command substitution", base + start))
}

/// Given `chars[start..]` starting with `${`, return the index just past `}`.
pub fn scan_braced_parameter(chars: &[char], start: usize, base: usize) -> Result<usize, LexError> {
    let mut i = start + 2;
    while i < chars.len() {
        if chars[i] == '}' {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(LexError::new("unterminated parameter expansion", base + start))
}

/// Given `chars[start] == SLOT_MARKER`, decode the slot index and return it
/// with the index just past the slot.
pub fn scan_slot(chars: &[char], start: usize, base: usize) -> Result<(usize, usize), LexError> {
    if chars.get(start + 1) != Some(&'{') {
        return Err(LexError::new("malformed interpolation slot", base + start));
    }
    let mut i = start + 2;
    let mut digits = String::new();
    while let Some(&c) = chars.get(i) {
        if c.is_ascii_digit() {
            digits.push(c);
            i += 1;
        } else {
            break;
        }
    }
    if digits.is_empty() || chars.get(i) != Some(&'}') {
        return Err(LexError::new("malformed interpolation slot", base + start));
    }
    let index = digits
        .parse::<usize>()
        .map_err(|_| LexError::new("malformed interpolation slot", base + start))?;
    Ok((index, i + 1))
}

// =============================================================================
// Lexer
// =============================================================================

/// Lexer over rendered template source
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    /// Offset of `input[0]` in the outermost source (non-zero for `$(...)` bodies)
    base: usize,
    interpolation_count: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str, interpolation_count: usize) -> Self {
        Self::with_offset(input, 0, interpolation_count)
    }

    pub fn with_offset(input: &str, base: usize, interpolation_count: usize) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            base,
            interpolation_count,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let len = self.input.len();

        while self.pos < len {
            self.skip_whitespace();

            if self.pos >= len {
                break;
            }

            if let Some(token) = self.next_token()? {
                self.tokens.push(token);
            }
        }

        let end = self.base + self.pos;
        self.tokens.push(Token::new(TokenType::Eof, "", end, end));

        Ok(self.tokens)
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            match c {
                ' ' | '\t' | '\r' => self.pos += 1,
                '\\' if self.peek(1) == Some('\n') => {
                    // Line continuation
                    self.pos += 2;
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        let start = self.pos;
        let c0 = match self.current() {
            Some(c) => c,
            None => return Ok(None),
        };
        let c1 = self.peek(1);
        let c2 = self.peek(2);

        if c0 == '#' {
            while let Some(c) = self.current() {
                if c == '\n' {
                    break;
                }
                self.pos += 1;
            }
            return Ok(None);
        }

        if c0 == '\n' {
            self.pos += 1;
            return Ok(Some(self.make(TokenType::Newline, "\n", start)));
        }

        for (op_str, token_type) in THREE_CHAR_OPS {
            let chars: Vec<char> = op_str.chars().collect();
            if c0 == chars[0] && c1 == Some(chars[1]) && c2 == Some(chars[2]) {
                self.pos += 3;
                return Ok(Some(self.make(*token_type, *op_str, start)));
            }
        }

        for (op_str, token_type) in TWO_CHAR_OPS {
            let chars: Vec<char> = op_str.chars().collect();
            if c0 == chars[0] && c1 == Some(chars[1]) {
                self.pos += 2;
                return Ok(Some(self.make(*token_type, *op_str, start)));
            }
        }

        if let Some(&token_type) = SINGLE_CHAR_OPS.get(&c0) {
            self.pos += 1;
            return Ok(Some(self.make(token_type, c0.to_string(), start)));
        }

        // io-number: digits immediately followed by < or >
        if c0.is_ascii_digit() {
            let mut end = self.pos;
            while end < self.input.len() && self.input[end].is_ascii_digit() {
                end += 1;
            }
            if matches!(self.input.get(end), Some('<') | Some('>')) {
                let value: String = self.input[self.pos..end].iter().collect();
                self.pos = end;
                return Ok(Some(self.make(TokenType::Number, value, start)));
            }
        }

        self.read_word(start).map(Some)
    }

    fn make(&self, token_type: TokenType, value: impl Into<String>, start: usize) -> Token {
        Token::new(token_type, value, self.base + start, self.base + self.pos)
    }

    fn read_word(&mut self, start: usize) -> Result<Token, LexError> {
        let mut value = String::new();

        while let Some(c) = self.current() {
            if is_word_boundary(c) {
                break;
            }
            let next = match c {
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.pos += 2;
                        continue;
                    }
                    (self.pos + 2).min(self.input.len())
                }
                '\'' => scan_single_quoted(&self.input, self.pos, self.base)?,
                '"' => scan_double_quoted(&self.input, self.pos, self.base)?,
                '$' if self.peek(1) == Some('(') => {
                    scan_command_substitution(&self.input, self.pos, self.base)?
                }
                '$' if self.peek(1) == Some('{') => {
                    scan_braced_parameter(&self.input, self.pos, self.base)?
                }
                SLOT_MARKER => {
                    let (index, end) = scan_slot(&self.input, self.pos, self.base)?;
                    if index >= self.interpolation_count {
                        return Err(LexError::new(
                            format!("interpolation slot {} out of range", index),
                            self.base + self.pos,
                        ));
                    }
                    end
                }
                _ => self.pos + 1,
            };
            value.extend(&self.input[self.pos..next]);
            self.pos = next;
        }

        let token_type = match value.find('=') {
            Some(eq) if is_valid_name(&value[..eq]) => TokenType::AssignmentWord,
            _ => TokenType::Word,
        };
        Ok(self.make(token_type, value, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::slot_text;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input, 4).tokenize().unwrap()
    }

    fn types(input: &str) -> Vec<TokenType> {
        lex(input).iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn test_simple_words() {
        let tokens = lex("echo hello world");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].value, "echo");
        assert_eq!(tokens[2].value, "world");
        assert_eq!(tokens[2].start, 11);
        assert_eq!(tokens[3].token_type, TokenType::Eof);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            types("a | b && c || d ; e &"),
            vec![
                TokenType::Word, TokenType::Pipe, TokenType::Word, TokenType::AndAnd,
                TokenType::Word, TokenType::OrOr, TokenType::Word, TokenType::Semicolon,
                TokenType::Word, TokenType::Amp, TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_redirections() {
        assert_eq!(
            types("cmd > out >> log < in 2>&1 &> all"),
            vec![
                TokenType::Word, TokenType::Great, TokenType::Word, TokenType::DGreat,
                TokenType::Word, TokenType::Less, TokenType::Word, TokenType::Number,
                TokenType::GreatAnd, TokenType::Word, TokenType::AndGreat, TokenType::Word,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_digits_inside_word_are_not_io_number() {
        let tokens = lex("echo a2>f");
        assert_eq!(tokens[1].value, "a2");
        assert_eq!(tokens[1].token_type, TokenType::Word);
        assert_eq!(tokens[2].token_type, TokenType::Great);
    }

    #[test]
    fn test_quotes_kept_verbatim() {
        let tokens = lex("echo 'a b' \"c | d\"");
        assert_eq!(tokens[1].value, "'a b'");
        assert_eq!(tokens[2].value, "\"c | d\"");
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_command_substitution_is_one_word() {
        let tokens = lex("echo x$(ls | wc -l)y");
        assert_eq!(tokens[1].value, "x$(ls | wc -l)y");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_nested_substitution_with_quotes() {
        let tokens = lex("echo $(echo \"$(echo ')')\")");
        assert_eq!(tokens[1].value, "$(echo \"$(echo ')')\")");
    }

    #[test]
    fn test_braces_and_globs_are_word_text() {
        let tokens = lex("ls {a,b}*.rs");
        assert_eq!(tokens[1].value, "{a,b}*.rs");
        assert_eq!(tokens[1].token_type, TokenType::Word);
    }

    #[test]
    fn test_assignment_word() {
        let tokens = lex("FOO=bar env");
        assert_eq!(tokens[0].token_type, TokenType::AssignmentWord);
        assert_eq!(tokens[1].token_type, TokenType::Word);
        assert_eq!(lex("1X=bar")[0].token_type, TokenType::Word);
    }

    #[test]
    fn test_comment_and_newline() {
        assert_eq!(
            types("echo a # trailing\necho b"),
            vec![TokenType::Word, TokenType::Word, TokenType::Newline, TokenType::Word, TokenType::Word, TokenType::Eof]
        );
    }

    #[test]
    fn test_line_continuation() {
        let tokens = lex("echo a \\\n b");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[2].value, "b");
    }

    #[test]
    fn test_interpolation_slot_kind() {
        let source = format!("echo {} x{}", slot_text(0), slot_text(1));
        let tokens = Lexer::new(&source, 2).tokenize().unwrap();
        assert_eq!(tokens[1].kind(), TokenKind::InterpolationSlot);
        assert_eq!(tokens[2].kind(), TokenKind::Word);
        assert_eq!(tokens[0].kind(), TokenKind::Word);
    }

    #[test]
    fn test_operator_and_redirect_kinds() {
        let tokens = lex("a | b > c");
        assert_eq!(tokens[1].kind(), TokenKind::Operator);
        assert_eq!(tokens[3].kind(), TokenKind::Redirect);
    }

    #[test]
    fn test_slot_out_of_range() {
        let source = format!("echo {}", slot_text(3));
        let err = Lexer::new(&source, 1).tokenize().unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn test_unterminated_single_quote() {
        let err = Lexer::new("echo 'abc", 0).tokenize().unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(err.message.contains("single quote"));
    }

    #[test]
    fn test_unterminated_double_quote() {
        let err = Lexer::new("echo ok \"abc", 0).tokenize().unwrap_err();
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn test_unterminated_substitution() {
        let err = Lexer::new("echo $(ls", 0).tokenize().unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(err.message.contains("command substitution"));
    }

    #[test]
    fn test_offsets_with_base() {
        let tokens = Lexer::with_offset("ls -l", 10, 0).tokenize().unwrap();
        assert_eq!(tokens[1].start, 13);
    }
}
