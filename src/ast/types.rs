//! Abstract Syntax Tree (AST) Types
//!
//! This module defines the AST produced by the parser for one template
//! invocation. The grammar is deliberately small: sequences of pipelines,
//! pipelines of simple commands, and words made of expandable parts.

use std::fmt;

// =============================================================================
// SEQUENCES & PIPELINES
// =============================================================================

/// Root node: an ordered list of pipelines joined by sequencing operators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceNode {
    pub items: Vec<SequenceItem>,
}

impl SequenceNode {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One pipeline plus the operator that follows it.
///
/// The operator decides how the *next* item runs; the last item of a
/// sequence carries `Always` unless it was terminated with `&`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceItem {
    pub pipeline: PipelineNode,
    pub operator: SequenceOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOperator {
    Always,     // ;
    AndIf,      // &&
    OrIf,       // ||
    Background, // &
}

impl SequenceOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => ";",
            Self::AndIf => "&&",
            Self::OrIf => "||",
            Self::Background => "&",
        }
    }
}

/// A pipeline: cmd1 | cmd2 | cmd3
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineNode {
    pub commands: Vec<CommandNode>,
    /// Source offset of the first token
    pub offset: usize,
}

/// Simple command: assignments, words and redirections in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandNode {
    /// Variable assignments before command: VAR=value cmd
    pub assignments: Vec<AssignmentNode>,
    /// Command name followed by its arguments
    pub words: Vec<WordNode>,
    /// I/O redirections
    pub redirections: Vec<RedirectionNode>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentNode {
    pub name: String,
    pub value: WordNode,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectionNode {
    /// Explicit descriptor (`2>`); `None` means the operator's default
    pub fd: Option<u32>,
    pub operator: RedirectionOperator,
    pub target: RedirectionTarget,
}

impl RedirectionNode {
    /// The descriptor this redirection rewires.
    pub fn source_fd(&self) -> u32 {
        self.fd.unwrap_or(match self.operator {
            RedirectionOperator::Less | RedirectionOperator::LessAnd => 0,
            _ => 1,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionOperator {
    Less,      // <
    Great,     // >
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    AndGreat,  // &>
    AndDGreat, // &>>
}

impl RedirectionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::Great => ">",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::AndGreat => "&>",
            Self::AndDGreat => "&>>",
        }
    }

    pub fn is_dup(&self) -> bool {
        matches!(self, Self::LessAnd | Self::GreatAnd)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectionTarget {
    Word(WordNode),
    Fd(u32),
}

// =============================================================================
// WORDS
// =============================================================================

/// A Word is a sequence of parts that form a single shell word.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordNode {
    pub parts: Vec<WordPart>,
    /// Raw source text, kept for diagnostics
    pub text: String,
    pub offset: usize,
}

impl WordNode {
    /// True when the word has no expandable parts at all.
    pub fn is_plain(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, WordPart::Literal(_)))
    }
}

/// Parts that can make up a word
#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    Literal(LiteralPart),
    Interpolated(InterpolatedPart),
    Variable(VariablePart),
    CommandSubstitution(CommandSubstitutionPart),
    BraceExpansion(BraceExpansionPart),
    Glob(GlobPart),
    Tilde,
}

/// Literal text. Quoted text is never brace- or glob-expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralPart {
    pub value: String,
    pub quoted: bool,
}

/// Reference to the host-supplied value at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolatedPart {
    pub index: usize,
    pub quoted: bool,
}

/// $NAME, ${NAME} or $?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePart {
    pub name: String,
    pub quoted: bool,
}

/// $( ... )
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSubstitutionPart {
    pub body: SequenceNode,
    pub quoted: bool,
}

/// Unquoted text containing `*`, `?` or `[`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPart {
    pub pattern: String,
}

// =============================================================================
// BRACE EXPANSION
// =============================================================================

/// Brace expansion: {a,b,c} or {1..10}
#[derive(Debug, Clone, PartialEq)]
pub enum BraceExpansionPart {
    List(Vec<BraceItem>),
    Range(BraceRange),
}

/// One comma-separated alternative; itself a concatenation of literal text
/// and nested groups, e.g. the `a{b,c}d` in `{x,a{b,c}d}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BraceItem {
    pub fragments: Vec<BraceFragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BraceFragment {
    Literal(String),
    Group(BraceExpansionPart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BraceRange {
    pub start: BraceRangeValue,
    pub end: BraceRangeValue,
    pub step: Option<i64>,
    /// Original endpoint text, used for zero padding ({01..10})
    pub start_str: String,
    pub end_str: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BraceRangeValue {
    Number(i64),
    Char(char),
}

impl fmt::Display for BraceRangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Char(c) => write!(f, "{}", c),
        }
    }
}

/// Renders the group back to shell source, e.g. `{a,b{c,d}}` or `{1..9..2}`.
impl fmt::Display for BraceExpansionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    for fragment in &item.fragments {
                        match fragment {
                            BraceFragment::Literal(text) => write!(f, "{}", text)?,
                            BraceFragment::Group(group) => write!(f, "{}", group)?,
                        }
                    }
                }
                write!(f, "}}")
            }
            Self::Range(range) => {
                write!(f, "{{{}..{}", range.start_str, range.end_str)?;
                if let Some(step) = range.step {
                    write!(f, "..{}", step)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// =============================================================================
// AST BUILDERS
// =============================================================================

/// Convenience constructors, mostly used by the parser and tests.
pub struct AST;

impl AST {
    pub fn literal(value: impl Into<String>) -> WordPart {
        WordPart::Literal(LiteralPart { value: value.into(), quoted: false })
    }

    pub fn quoted(value: impl Into<String>) -> WordPart {
        WordPart::Literal(LiteralPart { value: value.into(), quoted: true })
    }

    pub fn variable(name: impl Into<String>, quoted: bool) -> WordPart {
        WordPart::Variable(VariablePart { name: name.into(), quoted })
    }

    pub fn word(parts: Vec<WordPart>) -> WordNode {
        WordNode { parts, text: String::new(), offset: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirection_default_fds() {
        let target = RedirectionTarget::Word(AST::word(vec![AST::literal("f")]));
        let input = RedirectionNode { fd: None, operator: RedirectionOperator::Less, target: target.clone() };
        let output = RedirectionNode { fd: None, operator: RedirectionOperator::DGreat, target: target.clone() };
        let stderr = RedirectionNode { fd: Some(2), operator: RedirectionOperator::Great, target };
        assert_eq!(input.source_fd(), 0);
        assert_eq!(output.source_fd(), 1);
        assert_eq!(stderr.source_fd(), 2);
    }

    #[test]
    fn test_brace_display() {
        let inner = BraceExpansionPart::List(vec![
            BraceItem { fragments: vec![BraceFragment::Literal("c".into())] },
            BraceItem { fragments: vec![BraceFragment::Literal("d".into())] },
        ]);
        let outer = BraceExpansionPart::List(vec![
            BraceItem { fragments: vec![BraceFragment::Literal("a".into())] },
            BraceItem { fragments: vec![BraceFragment::Literal("b".into()), BraceFragment::Group(inner)] },
        ]);
        assert_eq!(outer.to_string(), "{a,b{c,d}}");

        let range = BraceExpansionPart::Range(BraceRange {
            start: BraceRangeValue::Number(1),
            end: BraceRangeValue::Number(9),
            step: Some(2),
            start_str: "1".into(),
            end_str: "9".into(),
        });
        assert_eq!(range.to_string(), "{1..9..2}");
    }

    #[test]
    fn test_word_is_plain() {
        assert!(AST::word(vec![AST::literal("a"), AST::quoted("b c")]).is_plain());
        assert!(!AST::word(vec![AST::variable("HOME", false)]).is_plain());
    }
}
