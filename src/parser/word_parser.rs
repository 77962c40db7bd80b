//! Word Parser
//!
//! Turns the raw text of a WORD token into a [`WordNode`]: quoting is resolved,
//! `$NAME`/`${NAME}`/`$?` become variable parts, `$( ... )` bodies are parsed
//! recursively, interpolation slots become opaque parts, and unquoted brace
//! groups and glob metacharacters are recognized structurally.

use crate::ast::types::{
    BraceExpansionPart, BraceFragment, BraceItem, BraceRange, BraceRangeValue,
    CommandSubstitutionPart, GlobPart, InterpolatedPart, LiteralPart, VariablePart, WordNode,
    WordPart,
};
use crate::parser::lexer::{
    is_valid_name, scan_braced_parameter, scan_command_substitution, scan_double_quoted,
    scan_single_quoted, scan_slot,
};
use crate::parser::parser::Parser;
use crate::parser::types::{LexError, ParseError, SyntaxError, SLOT_MARKER};

/// Check if a string contains glob metacharacters.
pub fn has_glob_pattern(value: &str) -> bool {
    value.chars().any(|c| c == '*' || c == '?' || c == '[')
}

impl Parser {
    /// Parse the raw text of one word that starts at `offset` in the source.
    pub(crate) fn parse_word(&mut self, text: &str, offset: usize) -> Result<WordNode, SyntaxError> {
        let chars: Vec<char> = text.chars().collect();
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\\' => {
                    flush_literal(&mut literal, &mut parts);
                    match chars.get(i + 1) {
                        Some(&next) => {
                            parts.push(quoted_literal(next.to_string()));
                            i += 2;
                        }
                        None => {
                            literal.push('\\');
                            i += 1;
                        }
                    }
                }
                '\'' => {
                    flush_literal(&mut literal, &mut parts);
                    let end = scan_single_quoted(&chars, i, offset)?;
                    self.push_single_quoted(&chars[i + 1..end - 1], offset + i + 1, &mut parts)?;
                    i = end;
                }
                '"' => {
                    flush_literal(&mut literal, &mut parts);
                    let end = scan_double_quoted(&chars, i, offset)?;
                    let inner = self.parse_double_quoted(&chars[i + 1..end - 1], offset + i + 1)?;
                    if inner.is_empty() {
                        parts.push(quoted_literal(String::new()));
                    } else {
                        parts.extend(inner);
                    }
                    i = end;
                }
                '$' => {
                    let (part, next) = self.parse_dollar(&chars, i, offset, false)?;
                    match part {
                        Some(part) => {
                            flush_literal(&mut literal, &mut parts);
                            parts.push(part);
                        }
                        None => literal.push('$'),
                    }
                    i = next;
                }
                '`' => {
                    return Err(ParseError::new(
                        "backtick substitution is not supported; use $(...)",
                        offset + i,
                    )
                    .into());
                }
                SLOT_MARKER => {
                    flush_literal(&mut literal, &mut parts);
                    let (index, next) = self.take_slot(&chars, i, offset)?;
                    parts.push(WordPart::Interpolated(InterpolatedPart { index, quoted: false }));
                    i = next;
                }
                '{' => match try_parse_brace_expansion(&chars, i) {
                    Some((brace, next)) => {
                        flush_literal(&mut literal, &mut parts);
                        parts.push(WordPart::BraceExpansion(brace));
                        i = next;
                    }
                    None => {
                        literal.push('{');
                        i += 1;
                    }
                },
                '~' if i == 0 && matches!(chars.get(1), None | Some('/')) => {
                    parts.push(WordPart::Tilde);
                    i += 1;
                }
                _ => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        flush_literal(&mut literal, &mut parts);

        Ok(WordNode {
            parts,
            text: text.to_string(),
            offset,
        })
    }

    /// Decode the slot at `chars[i]`, check it names a supplied value and record it.
    fn take_slot(&mut self, chars: &[char], i: usize, offset: usize) -> Result<(usize, usize), SyntaxError> {
        let (index, next) = scan_slot(chars, i, offset)?;
        if index >= self.interpolation_count {
            return Err(LexError::new(
                format!("interpolation slot {} has no value", index),
                offset + i,
            )
            .into());
        }
        self.slots.push(index);
        Ok((index, next))
    }

    /// Single quotes disable every expansion, but a host value placed inside
    /// them is still substituted as quoted text.
    fn push_single_quoted(
        &mut self,
        chars: &[char],
        offset: usize,
        parts: &mut Vec<WordPart>,
    ) -> Result<(), SyntaxError> {
        let mut buffer = String::new();
        let mut produced = false;
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == SLOT_MARKER {
                if !buffer.is_empty() {
                    parts.push(quoted_literal(std::mem::take(&mut buffer)));
                }
                let (index, next) = self.take_slot(chars, i, offset)?;
                parts.push(WordPart::Interpolated(InterpolatedPart { index, quoted: true }));
                produced = true;
                i = next;
            } else {
                buffer.push(chars[i]);
                i += 1;
            }
        }
        if !buffer.is_empty() || !produced {
            parts.push(quoted_literal(buffer));
        }
        Ok(())
    }

    /// Parse the inside of a double-quoted string. Everything produced is quoted.
    fn parse_double_quoted(&mut self, chars: &[char], offset: usize) -> Result<Vec<WordPart>, SyntaxError> {
        let mut parts = Vec::new();
        let mut buffer = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    match chars.get(i + 1) {
                        Some('\n') => {}
                        Some(&next @ ('$' | '"' | '\\' | '`')) => buffer.push(next),
                        Some(&next) => {
                            buffer.push('\\');
                            buffer.push(next);
                        }
                        None => buffer.push('\\'),
                    }
                    i += 2;
                }
                '$' => {
                    let (part, next) = self.parse_dollar(chars, i, offset, true)?;
                    match part {
                        Some(part) => {
                            if !buffer.is_empty() {
                                parts.push(quoted_literal(std::mem::take(&mut buffer)));
                            }
                            parts.push(part);
                        }
                        None => buffer.push('$'),
                    }
                    i = next;
                }
                SLOT_MARKER => {
                    if !buffer.is_empty() {
                        parts.push(quoted_literal(std::mem::take(&mut buffer)));
                    }
                    let (index, next) = self.take_slot(chars, i, offset)?;
                    parts.push(WordPart::Interpolated(InterpolatedPart { index, quoted: true }));
                    i = next;
                }
                c => {
                    buffer.push(c);
                    i += 1;
                }
            }
        }
        if !buffer.is_empty() {
            parts.push(quoted_literal(buffer));
        }
        Ok(parts)
    }

    /// Parse `$...` at `chars[i]`. Returns `None` when the dollar sign is literal.
    fn parse_dollar(
        &mut self,
        chars: &[char],
        i: usize,
        offset: usize,
        quoted: bool,
    ) -> Result<(Option<WordPart>, usize), SyntaxError> {
        match chars.get(i + 1) {
            Some('(') => {
                if chars.get(i + 2) == Some(&'(') {
                    return Err(ParseError::new("arithmetic expansion is not supported", offset + i).into());
                }
                let end = scan_command_substitution(chars, i, offset)?;
                let inner: String = chars[i + 2..end - 1].iter().collect();
                let body = self.parse_nested(&inner, offset + i + 2)?;
                Ok((
                    Some(WordPart::CommandSubstitution(CommandSubstitutionPart { body, quoted })),
                    end,
                ))
            }
            Some('{') => {
                let end = scan_braced_parameter(chars, i, offset)?;
                let name: String = chars[i + 2..end - 1].iter().collect();
                if name != "?" && !is_valid_name(&name) {
                    return Err(ParseError::new(format!("${{{}}}: bad substitution", name), offset + i).into());
                }
                Ok((Some(WordPart::Variable(VariablePart { name, quoted })), end))
            }
            Some('?') => Ok((
                Some(WordPart::Variable(VariablePart { name: "?".to_string(), quoted })),
                i + 2,
            )),
            Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i + 1;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[i + 1..end].iter().collect();
                Ok((Some(WordPart::Variable(VariablePart { name, quoted })), end))
            }
            _ => Ok((None, i + 1)),
        }
    }
}

fn quoted_literal(value: String) -> WordPart {
    WordPart::Literal(LiteralPart { value, quoted: true })
}

/// Push the pending unquoted run, classifying it as a glob when needed.
fn flush_literal(literal: &mut String, parts: &mut Vec<WordPart>) {
    if literal.is_empty() {
        return;
    }
    let value = std::mem::take(literal);
    if has_glob_pattern(&value) {
        parts.push(WordPart::Glob(GlobPart { pattern: value }));
    } else {
        parts.push(WordPart::Literal(LiteralPart { value, quoted: false }));
    }
}

// =============================================================================
// Brace expansion parsing
// =============================================================================

/// Find the `}` matching the `{` at `start`. Gives up on characters that would
/// make the group ambiguous (quotes, expansions, escapes, slots).
fn find_brace_close(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, &c) in chars.iter().enumerate().skip(start) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            '\'' | '"' | '\\' | '$' | '`' | SLOT_MARKER => return None,
            _ => {}
        }
    }
    None
}

/// Split a brace group's inner content by commas at the top level.
fn split_brace_items(inner: &[char]) -> Vec<Vec<char>> {
    let mut items = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0;

    for &c in inner {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

/// Try to parse a brace group at `chars[start] == '{'`.
///
/// Returns the group and the index just past its `}`; `None` means the brace
/// is literal text (no top-level comma and not a valid range).
pub fn try_parse_brace_expansion(chars: &[char], start: usize) -> Option<(BraceExpansionPart, usize)> {
    let close = find_brace_close(chars, start)?;
    let inner = &chars[start + 1..close];

    let inner_str: String = inner.iter().collect();
    if let Some(range) = try_parse_numeric_range(&inner_str).or_else(|| try_parse_char_range(&inner_str)) {
        return Some((BraceExpansionPart::Range(range), close + 1));
    }

    let raw_items = split_brace_items(inner);
    if raw_items.len() < 2 {
        return None;
    }
    let items = raw_items.iter().map(|raw| parse_brace_item(raw)).collect();
    Some((BraceExpansionPart::List(items), close + 1))
}

/// An item is literal text with nested groups spliced in.
fn parse_brace_item(raw: &[char]) -> BraceItem {
    let mut fragments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == '{' {
            if let Some((group, next)) = try_parse_brace_expansion(raw, i) {
                if !text.is_empty() {
                    fragments.push(BraceFragment::Literal(std::mem::take(&mut text)));
                }
                fragments.push(BraceFragment::Group(group));
                i = next;
                continue;
            }
        }
        text.push(raw[i]);
        i += 1;
    }
    if !text.is_empty() {
        fragments.push(BraceFragment::Literal(text));
    }
    BraceItem { fragments }
}

/// Try to parse a numeric range like {1..10} or {1..10..2}
fn try_parse_numeric_range(inner: &str) -> Option<BraceRange> {
    let parts: Vec<&str> = inner.split("..").collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let start_num: i64 = parts[0].parse().ok()?;
    let end_num: i64 = parts[1].parse().ok()?;
    let step: Option<i64> = if parts.len() == 3 {
        Some(parts[2].parse().ok()?)
    } else {
        None
    };

    Some(BraceRange {
        start: BraceRangeValue::Number(start_num),
        end: BraceRangeValue::Number(end_num),
        step,
        start_str: parts[0].to_string(),
        end_str: parts[1].to_string(),
    })
}

/// Try to parse a character range like {a..z} or {a..z..2}
fn try_parse_char_range(inner: &str) -> Option<BraceRange> {
    let parts: Vec<&str> = inner.split("..").collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    if parts[0].chars().count() != 1 || parts[1].chars().count() != 1 {
        return None;
    }

    let start_char = parts[0].chars().next()?;
    let end_char = parts[1].chars().next()?;

    if !start_char.is_ascii_alphabetic() || !end_char.is_ascii_alphabetic() {
        return None;
    }

    let step: Option<i64> = if parts.len() == 3 {
        Some(parts[2].parse().ok()?)
    } else {
        None
    };

    Some(BraceRange {
        start: BraceRangeValue::Char(start_char),
        end: BraceRangeValue::Char(end_char),
        step,
        start_str: parts[0].to_string(),
        end_str: parts[1].to_string(),
    })
}
