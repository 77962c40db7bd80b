//! Word Expansion
//!
//! Resolves one parsed word into zero or more argument strings:
//!
//! 1. brace groups and unquoted list values are multiplied out (leftmost
//!    varies slowest); the total is a checked u64 compared with
//!    `max_expansion_words` before any variant is built
//! 2. each variant resolves tilde, variables, host values and command
//!    substitutions into fields; unquoted substitution output is split
//!    on whitespace
//! 3. fields with active glob characters are matched against the filesystem
//!
//! Host values are opaque: their text is escaped before globbing and never
//! split or re-parsed.

use glob::Pattern;
use tracing::trace;

use crate::ast::types::{
    CommandNode, RedirectionNode, RedirectionOperator, RedirectionTarget, WordNode, WordPart,
};
use crate::interpreter::errors::{ExpansionError, ShellError};
use crate::interpreter::execution_engine::{CapturedOutput, Interpreter};
use crate::interpreter::expansion::brace_expansion::{count_brace_words, expand_brace_group};
use crate::interpreter::expansion::glob_expansion::expand_glob_pattern;
use crate::interpreter::pipeline_execution::PreparedCommand;
use crate::interpreter::redirections::{PreparedRedirect, RedirectAction};
use crate::interpreter::types::ShellState;
use crate::parser::types::SLOT_MARKER;
use crate::parser::word_parser::has_glob_pattern;
use crate::template::HostValue;

/// Word text as shown in diagnostics: slot markers become `${n}`.
pub fn display_word(text: &str) -> String {
    text.replace(SLOT_MARKER, "$")
}

/// A word position after brace/list multiplication.
enum Slot<'a> {
    Part(&'a WordPart),
    /// Alternatives of a brace group: unquoted, glob characters stay active
    Brace(Vec<String>),
    /// Elements of a list value: opaque
    Values(&'a [String]),
}

impl Slot<'_> {
    fn len(&self) -> usize {
        match self {
            Slot::Part(_) => 1,
            Slot::Brace(words) => words.len(),
            Slot::Values(values) => values.len(),
        }
    }
}

#[derive(Clone, Copy)]
enum Piece<'a> {
    Part(&'a WordPart),
    BraceText(&'a str),
    ValueText(&'a str),
}

/// A field under construction.
#[derive(Debug, Default)]
struct FieldBuilder {
    text: String,
    /// `text` with inactive glob characters escaped
    pattern: String,
    has_glob: bool,
    /// Quoted or literal text was seen, so the field survives even if empty
    explicit: bool,
}

impl FieldBuilder {
    fn push_literal(&mut self, text: &str, explicit: bool) {
        self.text.push_str(text);
        self.pattern.push_str(&Pattern::escape(text));
        self.explicit |= explicit;
    }

    fn push_glob(&mut self, text: &str) {
        self.text.push_str(text);
        self.pattern.push_str(text);
        self.has_glob = true;
        self.explicit = true;
    }

    fn is_present(&self) -> bool {
        self.explicit || !self.text.is_empty()
    }

    /// Append unquoted substitution output, starting a new field at every
    /// run of blanks.
    fn push_split(&mut self, text: &str, fields: &mut Vec<FieldBuilder>) {
        let mut run = String::new();
        for c in text.chars() {
            if matches!(c, ' ' | '\t' | '\n') {
                if !run.is_empty() {
                    self.push_literal(&std::mem::take(&mut run), false);
                }
                if self.is_present() {
                    fields.push(std::mem::take(self));
                }
            } else {
                run.push(c);
            }
        }
        if !run.is_empty() {
            self.push_literal(&run, false);
        }
    }
}

impl Interpreter {
    /// Expand a word into arguments.
    pub(crate) async fn expand_word(
        &self,
        state: &ShellState,
        word: &WordNode,
        out: &mut CapturedOutput,
    ) -> Result<Vec<String>, ShellError> {
        let slots = self.multiply_slots(word)?;
        let sizes: Vec<usize> = slots.iter().map(Slot::len).collect();
        if sizes.contains(&0) {
            return Ok(Vec::new());
        }

        let mut words = Vec::new();
        let mut indices = vec![0usize; slots.len()];
        loop {
            let pieces: Vec<Piece<'_>> = slots
                .iter()
                .zip(&indices)
                .map(|(slot, &i)| match slot {
                    Slot::Part(part) => Piece::Part(part),
                    Slot::Brace(alternatives) => Piece::BraceText(&alternatives[i]),
                    Slot::Values(values) => Piece::ValueText(&values[i]),
                })
                .collect();
            self.expand_variant(state, &pieces, out, &mut words).await?;

            // Odometer: the rightmost slot varies fastest
            let mut k = indices.len();
            loop {
                if k == 0 {
                    trace!(word = %display_word(&word.text), count = words.len(), "expanded word");
                    return Ok(words);
                }
                k -= 1;
                indices[k] += 1;
                if indices[k] < sizes[k] {
                    break;
                }
                indices[k] = 0;
            }
        }
    }

    /// Step 1: brace groups and unquoted list values become multi-valued slots.
    fn multiply_slots<'a>(&'a self, word: &'a WordNode) -> Result<Vec<Slot<'a>>, ExpansionError> {
        let limit = self.limits.max_expansion_words;
        let overflow = || ExpansionError::Overflow { word: display_word(&word.text), limit };

        let mut total: u64 = 1;
        for part in &word.parts {
            let count = match part {
                WordPart::BraceExpansion(group) => count_brace_words(group).ok_or_else(overflow)?,
                WordPart::Interpolated(p) if !p.quoted => match self.value(p.index) {
                    Some(HostValue::List(values)) => values.len() as u64,
                    _ => 1,
                },
                _ => 1,
            };
            total = total.checked_mul(count).ok_or_else(overflow)?;
        }
        if total > limit {
            return Err(overflow());
        }

        let mut slots = Vec::with_capacity(word.parts.len());
        for part in &word.parts {
            let slot = match part {
                WordPart::BraceExpansion(group) => Slot::Brace(expand_brace_group(group, &word.text, limit)?),
                WordPart::Interpolated(p) if !p.quoted => match self.value(p.index) {
                    Some(HostValue::List(values)) => Slot::Values(values),
                    _ => Slot::Part(part),
                },
                _ => Slot::Part(part),
            };
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Steps 2 and 3 for one variant; resulting words are appended to `words`.
    async fn expand_variant(
        &self,
        state: &ShellState,
        pieces: &[Piece<'_>],
        out: &mut CapturedOutput,
        words: &mut Vec<String>,
    ) -> Result<(), ShellError> {
        let mut fields = Vec::new();
        let mut current = FieldBuilder::default();

        for piece in pieces {
            match *piece {
                Piece::BraceText(text) if has_glob_pattern(text) => current.push_glob(text),
                Piece::BraceText(text) => current.push_literal(text, false),
                Piece::ValueText(text) => current.push_literal(text, true),
                Piece::Part(part) => match part {
                    WordPart::Literal(literal) => current.push_literal(&literal.value, true),
                    WordPart::Glob(glob) => current.push_glob(&glob.pattern),
                    WordPart::Tilde => current.push_literal(&home_dir(state), true),
                    WordPart::Variable(var) => {
                        let value = self.lookup_variable(state, &var.name)?;
                        current.push_literal(&value, var.quoted);
                    }
                    WordPart::Interpolated(p) => current.push_literal(&self.value_text(p.index), true),
                    WordPart::CommandSubstitution(sub) => {
                        let output = self.command_substitution(state, &sub.body, out).await?;
                        if sub.quoted {
                            current.push_literal(&output, true);
                        } else {
                            current.push_split(&output, &mut fields);
                        }
                    }
                    WordPart::BraceExpansion(group) => current.push_literal(&group.to_string(), true),
                },
            }
        }
        if current.is_present() {
            fields.push(current);
        }

        for field in fields {
            if field.has_glob {
                words.extend(expand_glob_pattern(
                    &field.pattern,
                    &field.text,
                    &state.cwd,
                    self.options.glob_policy,
                )?);
            } else {
                words.push(field.text);
            }
        }
        Ok(())
    }

    /// Expand an assignment value: one string, no brace/glob expansion, no splitting.
    pub(crate) async fn expand_assignment_value(
        &self,
        state: &ShellState,
        word: &WordNode,
        out: &mut CapturedOutput,
    ) -> Result<String, ShellError> {
        let mut value = String::new();
        for part in &word.parts {
            match part {
                WordPart::Literal(literal) => value.push_str(&literal.value),
                WordPart::Glob(glob) => value.push_str(&glob.pattern),
                WordPart::BraceExpansion(group) => value.push_str(&group.to_string()),
                WordPart::Tilde => value.push_str(&home_dir(state)),
                WordPart::Variable(var) => value.push_str(&self.lookup_variable(state, &var.name)?),
                WordPart::Interpolated(p) => value.push_str(&self.value_text(p.index)),
                WordPart::CommandSubstitution(sub) => {
                    value.push_str(&self.command_substitution(state, &sub.body, out).await?)
                }
            }
        }
        Ok(value)
    }

    /// Expand a redirect target; it must produce exactly one word.
    pub(crate) async fn expand_redirection(
        &self,
        state: &ShellState,
        redirection: &RedirectionNode,
        out: &mut CapturedOutput,
    ) -> Result<PreparedRedirect, ShellError> {
        let fd = redirection.source_fd();
        let word = match &redirection.target {
            RedirectionTarget::Fd(target) => {
                return Ok(PreparedRedirect {
                    fd,
                    action: RedirectAction::Duplicate(*target),
                    target: format!("&{}", target),
                })
            }
            RedirectionTarget::Word(word) => word,
        };

        let fields = self.expand_word(state, word, out).await?;
        let target = match fields.as_slice() {
            [single] => single.clone(),
            _ => {
                return Err(ExpansionError::AmbiguousRedirect { word: display_word(&word.text) }.into())
            }
        };
        let path = state.resolve_path(&target);

        let action = match redirection.operator {
            RedirectionOperator::Less | RedirectionOperator::LessAnd => RedirectAction::Read(path),
            RedirectionOperator::Great | RedirectionOperator::GreatAnd => {
                RedirectAction::Write { path, append: false }
            }
            RedirectionOperator::DGreat => RedirectAction::Write { path, append: true },
            RedirectionOperator::AndGreat => RedirectAction::WriteBoth { path, append: false },
            RedirectionOperator::AndDGreat => RedirectAction::WriteBoth { path, append: true },
        };

        Ok(PreparedRedirect { fd, action, target })
    }

    /// Expand every word, assignment and redirect target of a command.
    pub(crate) async fn expand_command(
        &self,
        state: &ShellState,
        command: &CommandNode,
        out: &mut CapturedOutput,
    ) -> Result<PreparedCommand, ShellError> {
        let mut argv = Vec::new();
        for word in &command.words {
            argv.extend(self.expand_word(state, word, out).await?);
        }

        let mut assignments = Vec::with_capacity(command.assignments.len());
        for assignment in &command.assignments {
            let value = self.expand_assignment_value(state, &assignment.value, out).await?;
            assignments.push((assignment.name.clone(), value));
        }

        let mut redirects = Vec::with_capacity(command.redirections.len());
        for redirection in &command.redirections {
            redirects.push(self.expand_redirection(state, redirection, out).await?);
        }

        Ok(PreparedCommand { argv, assignments, redirects })
    }

    fn value(&self, index: usize) -> Option<&HostValue> {
        self.values.get(index)
    }

    /// Text of a host value in a single-word context; list elements are
    /// joined with one space.
    fn value_text(&self, index: usize) -> String {
        match self.value(index) {
            Some(HostValue::Text(text)) | Some(HostValue::Raw(text)) => text.clone(),
            Some(HostValue::List(values)) => values.join(" "),
            None => String::new(),
        }
    }

    fn lookup_variable(&self, state: &ShellState, name: &str) -> Result<String, ExpansionError> {
        if name == "?" {
            return Ok(state.last_exit_code.to_string());
        }
        match state.get_var(name) {
            Some(value) => Ok(value.to_string()),
            None if self.options.strict_variables => {
                Err(ExpansionError::UnboundVariable { name: name.to_string() })
            }
            None => Ok(String::new()),
        }
    }
}

fn home_dir(state: &ShellState) -> String {
    state.get_var("HOME").unwrap_or("~").to_string()
}
