//! Brace Expansion
//!
//! Comma lists `{a,b,c}`, nested groups `{x,a{b,c}}`, numeric `{1..10..2}`
//! and character `{a..e}` ranges.
//!
//! Word counts are computed with checked 64-bit arithmetic before anything
//! is materialized; exceeding the limit is an `ExpansionError::Overflow`,
//! never a wrap-around. Composition order is fixed: the leftmost group
//! varies slowest.

use crate::ast::types::{BraceExpansionPart, BraceFragment, BraceItem, BraceRange, BraceRangeValue};
use crate::interpreter::errors::ExpansionError;
use crate::parser::word_parser::try_parse_brace_expansion;

/// Number of words `part` expands to; `None` if the count does not fit in u64.
pub fn count_brace_words(part: &BraceExpansionPart) -> Option<u64> {
    match part {
        BraceExpansionPart::List(items) => items
            .iter()
            .try_fold(0u64, |total, item| total.checked_add(count_item_words(item)?)),
        BraceExpansionPart::Range(range) => count_range_words(range),
    }
}

fn count_item_words(item: &BraceItem) -> Option<u64> {
    item.fragments.iter().try_fold(1u64, |total, fragment| match fragment {
        BraceFragment::Literal(_) => Some(total),
        BraceFragment::Group(group) => total.checked_mul(count_brace_words(group)?),
    })
}

fn range_step(raw_step: Option<i64>) -> u64 {
    // Step of 0 is treated as 1; the sign is ignored and the natural direction used
    match raw_step.map(i64::unsigned_abs) {
        None | Some(0) => 1,
        Some(step) => step,
    }
}

fn count_range_words(range: &BraceRange) -> Option<u64> {
    let (start, end) = match (range.start, range.end) {
        (BraceRangeValue::Number(s), BraceRangeValue::Number(e)) => (s as i128, e as i128),
        (BraceRangeValue::Char(s), BraceRangeValue::Char(e)) => (s as i128, e as i128),
        _ => return Some(1),
    };
    let span = (end - start).unsigned_abs();
    u64::try_from(span / range_step(range.step) as u128 + 1).ok()
}

/// Expand one group to its words, in source order.
pub fn expand_brace_group(
    part: &BraceExpansionPart,
    word: &str,
    limit: u64,
) -> Result<Vec<String>, ExpansionError> {
    match count_brace_words(part) {
        Some(count) if count <= limit => Ok(materialize_group(part)),
        _ => Err(ExpansionError::Overflow { word: word.to_string(), limit }),
    }
}

fn materialize_group(part: &BraceExpansionPart) -> Vec<String> {
    match part {
        BraceExpansionPart::List(items) => items.iter().flat_map(materialize_item).collect(),
        BraceExpansionPart::Range(range) => expand_range(range),
    }
}

fn materialize_item(item: &BraceItem) -> Vec<String> {
    let mut results = vec![String::new()];
    for fragment in &item.fragments {
        match fragment {
            BraceFragment::Literal(text) => {
                for r in &mut results {
                    r.push_str(text);
                }
            }
            BraceFragment::Group(group) => {
                results = cartesian(&results, &materialize_group(group));
            }
        }
    }
    results
}

/// `prefixes × suffixes`, prefixes varying slowest.
pub fn cartesian(prefixes: &[String], suffixes: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(prefixes.len() * suffixes.len());
    for prefix in prefixes {
        for suffix in suffixes {
            let mut s = String::with_capacity(prefix.len() + suffix.len());
            s.push_str(prefix);
            s.push_str(suffix);
            out.push(s);
        }
    }
    out
}

fn expand_range(range: &BraceRange) -> Vec<String> {
    match (range.start, range.end) {
        (BraceRangeValue::Number(start), BraceRangeValue::Number(end)) => {
            expand_numeric_range(start, end, range.step, &range.start_str, &range.end_str)
        }
        (BraceRangeValue::Char(start), BraceRangeValue::Char(end)) => expand_char_range(start, end, range.step),
        _ => Vec::new(),
    }
}

/// Width for zero padding: the widest endpoint written with a leading zero.
fn pad_width(start_str: &str, end_str: &str) -> usize {
    [start_str, end_str]
        .iter()
        .map(|s| s.trim_start_matches('-'))
        .filter(|digits| digits.len() > 1 && digits.starts_with('0'))
        .map(str::len)
        .max()
        .unwrap_or(0)
}

/// Expand a numeric range with step.
///
/// Bash behavior:
/// - When step is 0, treat it as 1
/// - When step direction is "wrong", use absolute value and go in natural direction
/// - Zero-padding: use the max width of start/end for padding
fn expand_numeric_range(start: i64, end: i64, raw_step: Option<i64>, start_str: &str, end_str: &str) -> Vec<String> {
    let step = range_step(raw_step) as i128;
    let width = pad_width(start_str, end_str);

    let format_num = |n: i128| -> String {
        if width > 0 {
            let abs_str = format!("{:0>width$}", n.unsigned_abs(), width = width);
            if n < 0 {
                format!("-{}", abs_str)
            } else {
                abs_str
            }
        } else {
            n.to_string()
        }
    };

    range_points(start as i128, end as i128, step).map(format_num).collect()
}

/// Expand a character range with step, walking code points.
fn expand_char_range(start: char, end: char, raw_step: Option<i64>) -> Vec<String> {
    let step = range_step(raw_step) as i128;
    range_points(start as i128, end as i128, step)
        .filter_map(|i| u32::try_from(i).ok().and_then(char::from_u32))
        .map(String::from)
        .collect()
}

/// The points of `start..=end` (either direction) `step` apart. Yields
/// exactly as many values as `count_range_words` reports.
fn range_points(start: i128, end: i128, step: i128) -> impl Iterator<Item = i128> {
    let count = (end - start).abs() / step + 1;
    let direction = if start <= end { 1 } else { -1 };
    (0..count).map(move |k| start + direction * k * step)
}

/// Brace-expand a plain string, e.g. `index.{js,jsx}` -> `index.js`, `index.jsx`.
///
/// Only brace groups are interpreted; quotes, `$` and globs are left as
/// written.
pub fn braces_with_limit(pattern: &str, limit: u64) -> Result<Vec<String>, ExpansionError> {
    enum Piece {
        Text(String),
        Group(BraceExpansionPart),
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '{' {
            if let Some((group, next)) = try_parse_brace_expansion(&chars, i) {
                if !text.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                }
                pieces.push(Piece::Group(group));
                i = next;
                continue;
            }
        }
        text.push(chars[i]);
        i += 1;
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }

    // Check the total before materializing anything
    let total = pieces.iter().try_fold(1u64, |total, piece| match piece {
        Piece::Text(_) => Some(total),
        Piece::Group(group) => total.checked_mul(count_brace_words(group)?),
    });
    match total {
        Some(total) if total <= limit => {}
        _ => return Err(ExpansionError::Overflow { word: pattern.to_string(), limit }),
    }

    let mut results = vec![String::new()];
    for piece in &pieces {
        match piece {
            Piece::Text(text) => {
                for r in &mut results {
                    r.push_str(text);
                }
            }
            Piece::Group(group) => results = cartesian(&results, &materialize_group(group)),
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 1 << 20;

    fn parse_group(text: &str) -> BraceExpansionPart {
        let chars: Vec<char> = text.chars().collect();
        try_parse_brace_expansion(&chars, 0).unwrap().0
    }

    fn expand(text: &str) -> Vec<String> {
        expand_brace_group(&parse_group(text), text, LIMIT).unwrap()
    }

    #[test]
    fn test_list() {
        assert_eq!(expand("{a,b,c}"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(expand("{x,a{b,c}d}"), vec!["x", "abd", "acd"]);
        assert_eq!(expand("{a,{b,c}}"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_item() {
        assert_eq!(expand("{a,}"), vec!["a", ""]);
    }

    #[test]
    fn test_ascending_range() {
        assert_eq!(expand("{1..5}"), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_descending_range() {
        assert_eq!(expand("{5..1}"), vec!["5", "4", "3", "2", "1"]);
    }

    #[test]
    fn test_range_with_step() {
        assert_eq!(expand("{1..10..3}"), vec!["1", "4", "7", "10"]);
        assert_eq!(expand("{10..1..-3}"), vec!["10", "7", "4", "1"]);
        assert_eq!(expand("{1..3..0}"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_zero_padding() {
        assert_eq!(expand("{01..03}"), vec!["01", "02", "03"]);
        assert_eq!(expand("{-01..01}"), vec!["-01", "00", "01"]);
    }

    #[test]
    fn test_char_range() {
        assert_eq!(expand("{a..e}"), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(expand("{e..a..2}"), vec!["e", "c", "a"]);
    }

    #[test]
    fn test_counts() {
        assert_eq!(count_brace_words(&parse_group("{a,b{c,d},e}")), Some(4));
        assert_eq!(count_brace_words(&parse_group("{1..100}")), Some(100));
        assert_eq!(count_brace_words(&parse_group("{1..100..10}")), Some(10));
    }

    #[test]
    fn test_huge_range_is_counted_not_built() {
        let group = parse_group("{1..9000000000000000000}");
        assert_eq!(count_brace_words(&group), Some(9_000_000_000_000_000_000));
        let err = expand_brace_group(&group, "{1..9000000000000000000}", LIMIT).unwrap_err();
        assert!(matches!(err, ExpansionError::Overflow { .. }));
    }

    #[test]
    fn test_extreme_range_does_not_overflow_counter() {
        let group = parse_group("{-9223372036854775808..9223372036854775807}");
        assert_eq!(count_brace_words(&group), None);
    }

    #[test]
    fn test_extreme_step_yields_one_word() {
        let text = "{a..c..-9223372036854775808}";
        assert_eq!(count_brace_words(&parse_group(text)), Some(1));
        assert_eq!(expand(text), vec!["a"]);
        assert_eq!(expand("{1..3..-9223372036854775808}"), vec!["1"]);
        assert_eq!(expand("{3..1..9223372036854775807}"), vec!["3"]);
    }

    #[test]
    fn test_range_matches_its_count() {
        for text in ["{1..10..3}", "{10..-10..7}", "{a..z..5}", "{z..a..4}", "{-3..3}"] {
            let group = parse_group(text);
            assert_eq!(count_brace_words(&group), Some(expand(text).len() as u64), "{}", text);
        }
    }

    #[test]
    fn test_every_group_size_up_to_1000() {
        // A single item is not a group and stays literal
        assert_eq!(braces_with_limit("{x0}", LIMIT).unwrap(), vec!["{x0}"]);
        for n in 2..=1000 {
            let items: Vec<String> = (0..n).map(|i| format!("x{}", i)).collect();
            let text = format!("{{{}}}", items.join(","));
            assert_eq!(expand(&text), items, "group of {}", n);
        }
    }

    #[test]
    fn test_group_with_256_items() {
        let items: Vec<String> = (0..256).map(|i| format!("x{}", i)).collect();
        let text = format!("{{{}}}", items.join(","));
        let words = expand(&text);
        assert_eq!(words.len(), 256);
        assert_eq!(words[0], "x0");
        assert_eq!(words[255], "x255");
    }

    #[test]
    fn test_braces_string() {
        assert_eq!(
            braces_with_limit("index.{js,jsx,ts,tsx}", LIMIT).unwrap(),
            vec!["index.js", "index.jsx", "index.ts", "index.tsx"]
        );
        assert_eq!(braces_with_limit("plain", LIMIT).unwrap(), vec!["plain"]);
    }

    #[test]
    fn test_braces_leftmost_varies_slowest() {
        assert_eq!(
            braces_with_limit("{a,b}{c,d}", LIMIT).unwrap(),
            vec!["ac", "ad", "bc", "bd"]
        );
    }

    #[test]
    fn test_braces_sixteen_groups() {
        let pattern = "{a,b}".repeat(16);
        let words = braces_with_limit(&pattern, LIMIT).unwrap();
        assert_eq!(words.len(), 65_536);
        assert_eq!(words[0], "a".repeat(16));
        assert_eq!(words[65_535], "b".repeat(16));
    }

    #[test]
    fn test_braces_limit() {
        let pattern = "{a,b}".repeat(17);
        let err = braces_with_limit(&pattern, 65_536).unwrap_err();
        assert_eq!(err, ExpansionError::Overflow { word: pattern, limit: 65_536 });
    }
}
