//! Regex and glob matching behind `=~`, `=*`, `regx()` and `glob()`.
//!
//! Both kinds of pattern compile to a [`CompiledPattern`]. Compilation never
//! fails from the caller's point of view: an invalid pattern becomes
//! [`CompiledPattern::Never`], which matches nothing.

use regex::{Regex, RegexBuilder};
use tracing::trace;

use crate::value::Value;

/// Upper bound on the compiled size of a single regex.
pub const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Pattern syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// `regex` crate syntax, unanchored search
    Regex,
    /// Shell glob, whole-string match
    Glob,
}

/// Compiled matcher for a regex or glob pattern
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// Glob without wildcards: plain string equality
    Exact(Box<str>),
    Regex(Regex),
    /// Invalid pattern; matches nothing
    Never,
}

impl CompiledPattern {
    pub fn compile(kind: PatternKind, pattern: &str) -> Self {
        match kind {
            PatternKind::Regex => Self::regex(pattern),
            PatternKind::Glob => Self::glob(pattern),
        }
    }

    pub fn regex(pattern: &str) -> Self {
        match build_regex(pattern) {
            Some(re) => CompiledPattern::Regex(re),
            None => CompiledPattern::Never,
        }
    }

    pub fn glob(pattern: &str) -> Self {
        if !pattern.contains(['*', '?', '[', '{', '\\']) {
            return CompiledPattern::Exact(pattern.into());
        }
        match glob_to_regex(pattern).as_deref().and_then(build_regex) {
            Some(re) => CompiledPattern::Regex(re),
            None => CompiledPattern::Never,
        }
    }

    #[inline]
    pub fn is_match(&self, subject: &str) -> bool {
        match self {
            CompiledPattern::Exact(expected) => subject == expected.as_ref(),
            CompiledPattern::Regex(re) => re.is_match(subject),
            CompiledPattern::Never => false,
        }
    }

    /// Match a runtime value; only strings can match.
    #[inline]
    pub fn matches_value(&self, subject: &Value) -> bool {
        subject.as_str().is_some_and(|s| self.is_match(s))
    }
}

fn build_regex(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| trace!(pattern, error = %e, "invalid pattern"))
        .ok()
}

/// Match `subject` against a pattern held in a runtime value.
///
/// False unless both operands are strings and the pattern is valid.
pub fn dynamic_match(kind: PatternKind, subject: &Value, pattern: &Value) -> bool {
    match (subject.as_str(), pattern.as_str()) {
        (Some(s), Some(p)) => CompiledPattern::compile(kind, p).is_match(s),
        _ => false,
    }
}

/// Translate a glob into an anchored regex.
///
/// `*` stops at `/`, `**` does not (and `**/` may match no segment), `?` is one non-`/` character, `[...]`
/// and `[!...]` are character classes, `{a,b}` alternatives may nest and
/// `\` escapes the next character. Returns `None` for unclosed classes or
/// braces.
pub fn glob_to_regex(glob: &str) -> Option<String> {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    let mut brace_depth = 0usize;
    let mut i = 0;

    out.push('^');
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    while chars.get(i + 1) == Some(&'*') {
                        i += 1;
                    }
                    // `**/` also matches zero segments
                    if chars.get(i + 1) == Some(&'/') {
                        i += 1;
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                i = push_class(&chars, i, &mut out)?;
            }
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            ',' if brace_depth > 0 => out.push('|'),
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            '\\' => {
                i += 1;
                let literal = chars.get(i).copied().unwrap_or('\\');
                push_literal(literal, &mut out);
            }
            c => push_literal(c, &mut out),
        }
        i += 1;
    }

    if brace_depth > 0 {
        return None;
    }
    out.push('$');
    Some(out)
}

fn push_literal(c: char, out: &mut String) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Translate the class starting at `chars[start] == '['`; returns the index
/// of the closing `]`.
fn push_class(chars: &[char], start: usize, out: &mut String) -> Option<usize> {
    let mut i = start + 1;
    out.push('[');
    if matches!(chars.get(i), Some('!') | Some('^')) {
        out.push('^');
        i += 1;
    }
    // A `]` right after the opening bracket is a literal member
    let body_start = i;
    loop {
        let c = *chars.get(i)?;
        match c {
            ']' if i > body_start => {
                out.push(']');
                return Some(i);
            }
            '\\' => {
                i += 1;
                push_literal(*chars.get(i)?, out);
            }
            '[' | ']' | '^' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }
}
