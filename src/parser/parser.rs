//! Recursive Descent Parser for Shell Templates
//!
//! This parser consumes tokens from the lexer and produces an AST.
//!
//! Grammar:
//!   sequence  ::= pipeline (seq_op pipeline)* [';' | '&']
//!   seq_op    ::= ';' | NEWLINE | '&' | '&&' | '||'
//!   pipeline  ::= command ('|' command)*
//!   command   ::= (assignment)* (word | redirection)+
//!
//! Command substitution bodies are parsed by a child parser over their inner
//! text, so nesting depth is bounded by `MAX_PARSER_DEPTH`.

use crate::ast::types::{
    AssignmentNode, CommandNode, PipelineNode, RedirectionNode, RedirectionOperator,
    RedirectionTarget, SequenceItem, SequenceNode, SequenceOperator,
};
use crate::parser::lexer::{Lexer, Token, TokenType};
use crate::parser::types::{
    is_redirection_token, ParseError, SyntaxError, MAX_INPUT_SIZE, MAX_PARSER_DEPTH,
    MAX_PARSE_ITERATIONS, MAX_TOKENS,
};

/// Parse rendered template source with `interpolation_count` host values.
pub fn parse(input: &str, interpolation_count: usize) -> Result<SequenceNode, SyntaxError> {
    Parser::new(interpolation_count).parse(input)
}

/// Main parser struct
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub(crate) depth: usize,
    pub(crate) interpolation_count: usize,
    /// Slot indices in the order they were consumed
    pub(crate) slots: Vec<usize>,
    parse_iterations: usize,
}

impl Parser {
    /// Create a new parser instance
    pub fn new(interpolation_count: usize) -> Self {
        Parser {
            tokens: Vec::new(),
            pos: 0,
            depth: 0,
            interpolation_count,
            slots: Vec::new(),
            parse_iterations: 0,
        }
    }

    /// Parse a complete template source.
    pub fn parse(&mut self, input: &str) -> Result<SequenceNode, SyntaxError> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(ParseError::new(
                format!("input too large: {} bytes exceeds limit of {}", input.len(), MAX_INPUT_SIZE),
                0,
            )
            .into());
        }

        let sequence = self.parse_source(input, 0)?;

        for pair in self.slots.windows(2) {
            if pair[0] >= pair[1] {
                return Err(ParseError::new(
                    format!("interpolation slot {} appears out of order", pair[1]),
                    0,
                )
                .into());
            }
        }
        if self.slots.len() != self.interpolation_count {
            let unused = (0..self.interpolation_count)
                .find(|index| !self.slots.contains(index))
                .unwrap_or(self.interpolation_count);
            return Err(ParseError::new(
                format!("interpolation slot {} is never used (inside a comment?)", unused),
                0,
            )
            .into());
        }

        Ok(sequence)
    }

    /// Parse the body of `$( ... )` starting at `base` in the outer source.
    pub(crate) fn parse_nested(&mut self, input: &str, base: usize) -> Result<SequenceNode, SyntaxError> {
        if self.depth + 1 > MAX_PARSER_DEPTH {
            return Err(ParseError::new(
                format!("command substitution nested deeper than {}", MAX_PARSER_DEPTH),
                base,
            )
            .into());
        }
        let mut child = Parser::new(self.interpolation_count);
        child.depth = self.depth + 1;
        let sequence = child.parse_source(input, base)?;
        self.slots.extend(child.slots);
        Ok(sequence)
    }

    fn parse_source(&mut self, input: &str, base: usize) -> Result<SequenceNode, SyntaxError> {
        self.tokens = Lexer::with_offset(input, base, self.interpolation_count).tokenize()?;
        self.pos = 0;

        if self.tokens.len() > MAX_TOKENS {
            return Err(ParseError::new(
                format!("too many tokens: {} exceeds limit of {}", self.tokens.len(), MAX_TOKENS),
                base,
            )
            .into());
        }

        let sequence = self.parse_sequence()?;
        if !self.at(TokenType::Eof) {
            return Err(self.unexpected().into());
        }
        Ok(sequence)
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn current(&self) -> &Token {
        // The token stream always ends with Eof and the parser never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_type(&self, offset: usize) -> TokenType {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.token_type)
            .unwrap_or(TokenType::Eof)
    }

    fn at(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenType::Newline) {
            self.advance();
        }
    }

    fn check_iteration_limit(&mut self) -> Result<(), ParseError> {
        self.parse_iterations += 1;
        if self.parse_iterations > MAX_PARSE_ITERATIONS {
            return Err(ParseError::new(
                "maximum parse iterations exceeded",
                self.current().start,
            ));
        }
        Ok(())
    }

    fn unexpected(&self) -> ParseError {
        let token = self.current();
        match token.token_type {
            TokenType::Eof => ParseError::new("syntax error: unexpected end of input", token.start),
            TokenType::Newline => ParseError::new("syntax error near unexpected newline", token.start),
            _ => ParseError::new(
                format!("syntax error near unexpected token `{}'", token.value),
                token.start,
            ),
        }
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    fn parse_sequence(&mut self) -> Result<SequenceNode, SyntaxError> {
        let mut items = Vec::new();
        self.skip_newlines();

        while !self.at(TokenType::Eof) {
            self.check_iteration_limit()?;
            let pipeline = self.parse_pipeline()?;

            let operator = match self.current().token_type {
                TokenType::Semicolon | TokenType::Newline => {
                    self.advance();
                    SequenceOperator::Always
                }
                TokenType::Amp => {
                    self.advance();
                    SequenceOperator::Background
                }
                TokenType::AndAnd | TokenType::OrOr => {
                    let op = self.advance();
                    self.skip_newlines();
                    if self.at(TokenType::Eof) {
                        return Err(ParseError::new(
                            format!("syntax error: expected command after `{}'", op.value),
                            op.start,
                        )
                        .into());
                    }
                    if op.token_type == TokenType::AndAnd {
                        SequenceOperator::AndIf
                    } else {
                        SequenceOperator::OrIf
                    }
                }
                TokenType::Eof => SequenceOperator::Always,
                _ => return Err(self.unexpected().into()),
            };

            items.push(SequenceItem { pipeline, operator });
            self.skip_newlines();
        }

        Ok(SequenceNode { items })
    }

    fn parse_pipeline(&mut self) -> Result<PipelineNode, SyntaxError> {
        let offset = self.current().start;
        let mut commands = vec![self.parse_command()?];

        while self.at(TokenType::Pipe) {
            let pipe = self.advance();
            self.skip_newlines();
            if self.at(TokenType::Eof) {
                return Err(ParseError::new("syntax error: expected command after `|'", pipe.start).into());
            }
            commands.push(self.parse_command()?);
        }

        Ok(PipelineNode { commands, offset })
    }

    fn parse_command(&mut self) -> Result<CommandNode, SyntaxError> {
        let mut command = CommandNode {
            offset: self.current().start,
            ..Default::default()
        };

        loop {
            self.check_iteration_limit()?;
            let token = self.current().clone();
            match token.token_type {
                TokenType::AssignmentWord if command.words.is_empty() => {
                    self.advance();
                    command.assignments.push(self.parse_assignment(&token)?);
                }
                TokenType::Word | TokenType::AssignmentWord => {
                    self.advance();
                    command.words.push(self.parse_word(&token.value, token.start)?);
                }
                TokenType::Number if is_redirection_token(self.peek_type(1)) => {
                    self.advance();
                    let fd = parse_fd(&token.value, token.start)?;
                    command.redirections.push(self.parse_redirection(Some(fd))?);
                }
                t if is_redirection_token(t) => {
                    command.redirections.push(self.parse_redirection(None)?);
                }
                TokenType::LParen | TokenType::RParen => {
                    return Err(ParseError::new("subshell syntax is not supported", token.start).into());
                }
                _ => break,
            }
        }

        if command.assignments.is_empty() && command.words.is_empty() && command.redirections.is_empty() {
            return Err(self.unexpected().into());
        }
        Ok(command)
    }

    fn parse_assignment(&mut self, token: &Token) -> Result<AssignmentNode, SyntaxError> {
        // The lexer only emits AssignmentWord when a valid name precedes '='.
        let eq = token.value.find('=').unwrap_or(0);
        let name = token.value[..eq].to_string();
        let value_text = &token.value[eq + 1..];
        let value_offset = token.start + name.chars().count() + 1;
        let value = self.parse_word(value_text, value_offset)?;
        Ok(AssignmentNode { name, value })
    }

    fn parse_redirection(&mut self, fd: Option<u32>) -> Result<RedirectionNode, SyntaxError> {
        let op = self.advance();
        let operator = match op.token_type {
            TokenType::Less => RedirectionOperator::Less,
            TokenType::Great => RedirectionOperator::Great,
            TokenType::DGreat => RedirectionOperator::DGreat,
            TokenType::LessAnd => RedirectionOperator::LessAnd,
            TokenType::GreatAnd => RedirectionOperator::GreatAnd,
            TokenType::AndGreat => RedirectionOperator::AndGreat,
            _ => RedirectionOperator::AndDGreat,
        };

        if fd.is_some() && matches!(operator, RedirectionOperator::AndGreat | RedirectionOperator::AndDGreat) {
            return Err(ParseError::new(
                format!("syntax error near `{}'", op.value),
                op.start,
            )
            .into());
        }

        let target = self.current().clone();
        if !matches!(target.token_type, TokenType::Word | TokenType::AssignmentWord) {
            return Err(ParseError::new(
                format!("syntax error: expected redirection target after `{}'", op.value),
                target.start,
            )
            .into());
        }
        self.advance();

        let target = if operator.is_dup() {
            RedirectionTarget::Fd(parse_fd(&target.value, target.start)?)
        } else {
            RedirectionTarget::Word(self.parse_word(&target.value, target.start)?)
        };

        Ok(RedirectionNode { fd, operator, target })
    }
}

/// Only the three standard descriptors can be redirected.
fn parse_fd(text: &str, offset: usize) -> Result<u32, ParseError> {
    match text.parse::<u32>() {
        Ok(fd) if fd <= 2 => Ok(fd),
        _ => Err(ParseError::new(
            format!("unsupported file descriptor `{}'", text),
            offset,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{WordPart, LiteralPart};
    use crate::parser::types::slot_text;

    fn parse_ok(input: &str) -> SequenceNode {
        parse(input, 0).unwrap()
    }

    fn parse_err(input: &str) -> SyntaxError {
        parse(input, 0).unwrap_err()
    }

    fn literal_words(command: &CommandNode) -> Vec<String> {
        command
            .words
            .iter()
            .map(|w| match &w.parts[..] {
                [WordPart::Literal(LiteralPart { value, .. })] => value.clone(),
                other => panic!("not a literal word: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_simple_command() {
        let seq = parse_ok("echo hello world");
        assert_eq!(seq.items.len(), 1);
        let cmd = &seq.items[0].pipeline.commands[0];
        assert_eq!(literal_words(cmd), vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("  \n\n ").is_empty());
    }

    #[test]
    fn test_pipeline() {
        let seq = parse_ok("cat file | grep x | wc -l");
        assert_eq!(seq.items[0].pipeline.commands.len(), 3);
    }

    #[test]
    fn test_sequence_operators() {
        let seq = parse_ok("a; b && c || d & e");
        let ops: Vec<SequenceOperator> = seq.items.iter().map(|i| i.operator).collect();
        assert_eq!(
            ops,
            vec![
                SequenceOperator::Always,
                SequenceOperator::AndIf,
                SequenceOperator::OrIf,
                SequenceOperator::Background,
                SequenceOperator::Always,
            ]
        );
    }

    #[test]
    fn test_newline_separates_pipelines() {
        let seq = parse_ok("echo a\necho b\n");
        assert_eq!(seq.items.len(), 2);
    }

    #[test]
    fn test_trailing_semicolon_and_amp() {
        assert_eq!(parse_ok("echo a;").items.len(), 1);
        let seq = parse_ok("sleep 1 &");
        assert_eq!(seq.items[0].operator, SequenceOperator::Background);
    }

    #[test]
    fn test_leading_pipe_is_error() {
        let err = parse_err("| echo hi");
        assert_eq!(err.offset(), 0);
        assert!(err.to_string().contains("unexpected token `|'"));
    }

    #[test]
    fn test_trailing_pipe_is_error() {
        let err = parse_err("echo hi |");
        assert_eq!(err.offset(), 8);
        assert!(err.to_string().contains("after `|'"));
    }

    #[test]
    fn test_trailing_and_is_error() {
        let err = parse_err("echo hi &&");
        assert!(err.to_string().contains("after `&&'"));
        assert!(parse(" true ||\n", 0).is_err());
    }

    #[test]
    fn test_double_semicolon_is_error() {
        assert!(parse("echo a;; echo b", 0).is_err());
    }

    #[test]
    fn test_redirections() {
        let seq = parse_ok("cmd < in > out 2>&1 2>> log &> all");
        let cmd = &seq.items[0].pipeline.commands[0];
        assert_eq!(cmd.redirections.len(), 5);
        assert_eq!(cmd.redirections[0].operator, RedirectionOperator::Less);
        assert_eq!(cmd.redirections[1].operator, RedirectionOperator::Great);
        assert_eq!(cmd.redirections[2].fd, Some(2));
        assert_eq!(cmd.redirections[2].target, RedirectionTarget::Fd(1));
        assert_eq!(cmd.redirections[3].source_fd(), 2);
        assert_eq!(cmd.redirections[4].operator, RedirectionOperator::AndGreat);
    }

    #[test]
    fn test_redirection_only_command() {
        let seq = parse_ok("> empty.txt");
        let cmd = &seq.items[0].pipeline.commands[0];
        assert!(cmd.words.is_empty());
        assert_eq!(cmd.redirections.len(), 1);
    }

    #[test]
    fn test_missing_redirection_target() {
        let err = parse_err("echo >");
        assert!(err.to_string().contains("redirection target"));
    }

    #[test]
    fn test_unsupported_fd() {
        assert!(parse("echo 5>&1", 0).is_err());
        assert!(parse("echo 2>&7", 0).is_err());
    }

    #[test]
    fn test_assignments() {
        let seq = parse_ok("A=1 B=two env X=3");
        let cmd = &seq.items[0].pipeline.commands[0];
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[1].name, "B");
        // After the command name an assignment-looking word is an argument
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn test_subshell_rejected() {
        assert!(parse("(echo a)", 0).is_err());
    }

    #[test]
    fn test_nested_substitution_parsed() {
        let seq = parse_ok("echo $(echo $(echo deep))");
        let word = &seq.items[0].pipeline.commands[0].words[1];
        match &word.parts[0] {
            WordPart::CommandSubstitution(sub) => {
                assert_eq!(sub.body.items.len(), 1);
            }
            other => panic!("expected substitution, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_error_offset_is_absolute() {
        let err = parse_err("echo $(echo |)");
        assert_eq!(err.offset(), 12);
    }

    #[test]
    fn test_slots_consumed_in_order() {
        let source = format!("echo {} $(echo {})", slot_text(0), slot_text(1));
        let mut parser = Parser::new(2);
        parser.parse(&source).unwrap();
        assert_eq!(parser.slots, vec![0, 1]);
    }

    #[test]
    fn test_slot_inside_comment_rejected() {
        let source = format!("echo hi # {}", slot_text(0));
        let err = parse(&source, 1).unwrap_err();
        assert!(err.to_string().contains("slot 0 is never used"), "{}", err);
    }

    #[test]
    fn test_slots_out_of_order_rejected() {
        let source = format!("echo {} {}", slot_text(1), slot_text(0));
        assert!(parse(&source, 2).is_err());
    }
}
