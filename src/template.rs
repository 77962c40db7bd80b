//! Templates and Host Values
//!
//! A [`Template`] is the embedding entry point: literal source fragments
//! interleaved with host-supplied values. Rendering turns it into lexer input
//! where every opaque value is replaced by a slot marker, so no value is ever
//! re-read as shell syntax unless it was wrapped with [`raw`].

use std::path::{Path, PathBuf};

use crate::parser::types::{slot_text, LexError, ParseError, SyntaxError, SLOT_MARKER};

/// A value interpolated into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    /// One opaque literal
    Text(String),
    /// Several opaque literals; in a word they compose like a brace group
    List(Vec<String>),
    /// Shell source text, lexed and parsed in place
    Raw(String),
}

/// Opt a string into being parsed as shell source.
pub fn raw(source: impl Into<String>) -> HostValue {
    HostValue::Raw(source.into())
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Text(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Text(value)
    }
}

impl From<&String> for HostValue {
    fn from(value: &String) -> Self {
        HostValue::Text(value.clone())
    }
}

impl From<PathBuf> for HostValue {
    fn from(value: PathBuf) -> Self {
        HostValue::Text(value.to_string_lossy().into_owned())
    }
}

impl From<&Path> for HostValue {
    fn from(value: &Path) -> Self {
        HostValue::Text(value.to_string_lossy().into_owned())
    }
}

impl From<&PathBuf> for HostValue {
    fn from(value: &PathBuf) -> Self {
        HostValue::from(value.as_path())
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Text(value.to_string())
    }
}

macro_rules! host_value_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for HostValue {
                fn from(value: $t) -> Self {
                    HostValue::Text(value.to_string())
                }
            }
        )*
    };
}

host_value_from_display!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char);

impl From<Vec<String>> for HostValue {
    fn from(value: Vec<String>) -> Self {
        HostValue::List(value)
    }
}

impl From<Vec<&str>> for HostValue {
    fn from(value: Vec<&str>) -> Self {
        HostValue::List(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for HostValue {
    fn from(value: &[&str]) -> Self {
        HostValue::List(value.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&[String]> for HostValue {
    fn from(value: &[String]) -> Self {
        HostValue::List(value.to_vec())
    }
}

/// Literal fragments interleaved with values: `fragments[0] values[0] fragments[1] ...`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    fragments: Vec<String>,
    values: Vec<HostValue>,
}

/// Lexer input produced from a template.
#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    /// Source with slot markers for opaque values
    pub source: String,
    /// Opaque values, indexed by slot number
    pub values: Vec<HostValue>,
}

impl Template {
    /// Build from explicit fragments; there must be one more fragment than values.
    pub fn new(fragments: Vec<String>, values: Vec<HostValue>) -> Self {
        Self { fragments, values }
    }

    /// Split `format` at every `{}` and pair the pieces with `values`.
    /// `{{}}` stands for a literal `{}`; any other brace is kept as written.
    pub fn format(format: &str, values: Vec<HostValue>) -> Self {
        let mut fragments = Vec::new();
        let mut current = String::new();
        let mut rest = format;

        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix("{{}}") {
                current.push_str("{}");
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("{}") {
                fragments.push(std::mem::take(&mut current));
                rest = tail;
            } else {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    current.push(c);
                }
                rest = chars.as_str();
            }
        }
        fragments.push(current);

        Self { fragments, values }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn values(&self) -> &[HostValue] {
        &self.values
    }

    /// Source as shown in diagnostics: raw values inline, opaque values as `${n}`.
    ///
    /// Error offsets are character offsets into this string.
    pub fn display_source(&self) -> String {
        let mut out = String::new();
        let mut slot = 0;
        for (i, fragment) in self.fragments.iter().enumerate() {
            out.push_str(fragment);
            match self.values.get(i) {
                Some(HostValue::Raw(source)) => out.push_str(source),
                Some(_) => {
                    out.push_str(&format!("${{{}}}", slot));
                    slot += 1;
                }
                None => {}
            }
        }
        out
    }

    /// Produce lexer input. Raw values are spliced in; every other value
    /// becomes a slot referring to its position in `RenderedTemplate::values`.
    pub fn render(&self) -> Result<RenderedTemplate, SyntaxError> {
        if self.fragments.len() != self.values.len() + 1 {
            return Err(ParseError::new(
                format!(
                    "template has {} placeholders but {} values",
                    self.fragments.len().saturating_sub(1),
                    self.values.len()
                ),
                0,
            )
            .into());
        }

        let mut source = String::new();
        let mut offset = 0;
        let mut values = Vec::new();

        for (i, fragment) in self.fragments.iter().enumerate() {
            check_no_marker(fragment, offset)?;
            source.push_str(fragment);
            offset += fragment.chars().count();

            match self.values.get(i) {
                Some(HostValue::Raw(text)) => {
                    check_no_marker(text, offset)?;
                    source.push_str(text);
                    offset += text.chars().count();
                }
                Some(value) => {
                    let slot = slot_text(values.len());
                    offset += slot.chars().count();
                    source.push_str(&slot);
                    values.push(value.clone());
                }
                None => {}
            }
        }

        Ok(RenderedTemplate { source, values })
    }
}

fn check_no_marker(text: &str, offset: usize) -> Result<(), LexError> {
    match text.chars().position(|c| c == SLOT_MARKER) {
        Some(pos) => Err(LexError::new(
            "reserved character U+FDD0 in template source",
            offset + pos,
        )),
        None => Ok(()),
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Self::new(vec![source.to_string()], Vec::new())
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Self::new(vec![source], Vec::new())
    }
}

impl From<&String> for Template {
    fn from(source: &String) -> Self {
        Self::new(vec![source.clone()], Vec::new())
    }
}

/// Build a [`Template`]: every `{}` in the format string takes the next
/// argument as an opaque value.
///
/// ```
/// use embedded_shell::{sh, raw};
/// let file = "my notes.txt";
/// let t = sh!("wc -c {} {}", file, raw("| tr -d ' '"));
/// assert_eq!(t.display_source(), "wc -c ${0} | tr -d ' '");
/// ```
#[macro_export]
macro_rules! sh {
    ($fmt:expr) => {
        $crate::Template::format($fmt, ::std::vec::Vec::new())
    };
    ($fmt:expr, $($value:expr),+ $(,)?) => {
        $crate::Template::format($fmt, ::std::vec![$($crate::HostValue::from($value)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_splits_on_placeholders() {
        let t = Template::format("echo {} {}", vec!["a".into(), "b".into()]);
        assert_eq!(t.fragments(), &["echo ".to_string(), " ".to_string(), String::new()]);
    }

    #[test]
    fn test_format_keeps_other_braces() {
        let t = Template::format("echo {a,b} {{}} {}", vec!["x".into()]);
        assert_eq!(t.fragments(), &["echo {a,b} {} ".to_string(), String::new()]);
    }

    #[test]
    fn test_render_uses_slots_for_opaque_values() {
        let t = Template::format("echo {}", vec!["; rm -rf /".into()]);
        let rendered = t.render().unwrap();
        assert_eq!(rendered.source, format!("echo {}", slot_text(0)));
        assert_eq!(rendered.values, vec![HostValue::Text("; rm -rf /".into())]);
    }

    #[test]
    fn test_render_splices_raw_values() {
        let t = Template::format("echo {} {}", vec![raw("a | cat"), "b".into()]);
        let rendered = t.render().unwrap();
        assert_eq!(rendered.source, format!("echo a | cat {}", slot_text(0)));
        assert_eq!(rendered.values.len(), 1);
    }

    #[test]
    fn test_display_source_matches_rendered_width() {
        let t = Template::format("cat {} | grep {}", vec!["a".into(), "b".into()]);
        let rendered = t.render().unwrap();
        assert_eq!(t.display_source(), "cat ${0} | grep ${1}");
        assert_eq!(t.display_source().chars().count(), rendered.source.chars().count());
    }

    #[test]
    fn test_mismatched_values() {
        let t = Template::new(vec!["echo ".into()], vec!["a".into()]);
        assert!(t.render().is_err());
    }

    #[test]
    fn test_reserved_marker_rejected() {
        let t = Template::from("echo \u{FDD0}{0}");
        let err = t.render().unwrap_err();
        assert_eq!(err.offset(), 5);
    }

    #[test]
    fn test_sh_macro() {
        let name = String::from("world");
        let t = crate::sh!("echo hello {}", &name);
        assert_eq!(t.values(), &[HostValue::Text("world".into())]);
        let t = crate::sh!("true");
        assert!(t.values().is_empty());
    }

    #[test]
    fn test_host_value_conversions() {
        assert_eq!(HostValue::from(42), HostValue::Text("42".into()));
        assert_eq!(HostValue::from(vec!["a", "b"]), HostValue::List(vec!["a".into(), "b".into()]));
        assert_eq!(HostValue::from(Path::new("/tmp/x")), HostValue::Text("/tmp/x".into()));
    }
}
