//! Route pattern parsing.
//!
//! Patterns are literal text with named placeholders and optional trailing
//! parts:
//!
//! ```text
//! /users/{id}
//! /archive/{year:\d{4}}[/{month:\d{2}}[/{day}]]
//! ```
//!
//! A placeholder without a regex matches `[^/]+`. Optional parts may only
//! close at the very end of the pattern; every prefix they produce becomes a
//! separate segment sequence, least specific first.
//!
//! Placeholder regexes use the `regex` crate syntax. Lookaround and
//! backreferences are not supported; [`validate`] reports such patterns when
//! a route is mapped instead of at the first dispatch.
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PLACEHOLDER_REGEX: &str = "[^/]+";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Static(String),
    Placeholder { name: String, regex: String },
}

/// One fully expanded alternative of a pattern.
pub type RouteData = Vec<Segment>;

/// Parse `pattern` into its alternatives, least specific first.
pub fn parse(pattern: &str) -> Result<Vec<RouteData>> {
    let without_closing = pattern.trim_end_matches(']');
    let optionals = pattern.len() - without_closing.len();

    let parts = split_optionals(without_closing);
    if optionals != parts.len() - 1 {
        let reason = if has_bare_closing_bracket(without_closing) {
            "Optional segments can only occur at the end of a route"
        } else {
            "Number of opening '[' and closing ']' does not match"
        };
        return Err(invalid(pattern, reason));
    }

    let mut current = String::new();
    let mut alternatives = Vec::with_capacity(parts.len());
    for (n, part) in parts.iter().enumerate() {
        if part.is_empty() && n != 0 {
            return Err(invalid(pattern, "Empty optional part"));
        }
        current.push_str(part);
        alternatives.push(parse_placeholders(&current));
    }
    Ok(alternatives)
}

/// Parse `pattern` and compile every placeholder regex.
pub fn validate(pattern: &str) -> Result<()> {
    let alternatives = parse(pattern)?;
    let Some(most_specific) = alternatives.last() else {
        return Ok(());
    };
    for segment in most_specific {
        if let Segment::Placeholder { name, regex } = segment {
            Regex::new(&format!("^(?:{regex})$")).map_err(|e| {
                invalid(pattern, &format!("placeholder '{name}' has an unsupported regex: {e}"))
            })?;
        }
    }
    Ok(())
}

/// Placeholder names in order of appearance in the most specific alternative.
pub fn placeholder_names(data: &[Segment]) -> impl Iterator<Item = &str> {
    data.iter().filter_map(|segment| match segment {
        Segment::Placeholder { name, .. } => Some(name.as_str()),
        Segment::Static(_) => None,
    })
}

fn invalid(pattern: &str, reason: &str) -> Error {
    Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

struct Placeholder<'a> {
    name: &'a str,
    regex: Option<&'a str>,
    end: usize,
}

/// Try to read a placeholder starting at the `{` at byte `start`.
/// Text that does not form a valid placeholder stays literal.
fn placeholder_at(s: &str, start: usize) -> Option<Placeholder<'_>> {
    let bytes = s.as_bytes();
    let skip_ws = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    let mut i = skip_ws(start + 1);
    let name_start = i;
    match bytes.get(i) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => i += 1,
        _ => return None,
    }
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-') {
        i += 1;
    }
    let name = &s[name_start..i];
    i = skip_ws(i);

    match bytes.get(i) {
        Some(b'}') => Some(Placeholder {
            name,
            regex: None,
            end: i + 1,
        }),
        Some(b':') => {
            let regex_start = skip_ws(i + 1);
            let mut depth = 0usize;
            let mut j = regex_start;
            while j < bytes.len() {
                match bytes[j] {
                    b'{' => depth += 1,
                    b'}' if depth == 0 => {
                        return Some(Placeholder {
                            name,
                            regex: Some(s[regex_start..j].trim()),
                            end: j + 1,
                        });
                    }
                    b'}' => depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            None
        }
        _ => None,
    }
}

/// Split on `[` outside of placeholders.
fn split_optionals(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut from = 0;
    let mut i = 0;
    while i < s.len() {
        match s.as_bytes()[i] {
            b'{' => {
                if let Some(placeholder) = placeholder_at(s, i) {
                    i = placeholder.end;
                    continue;
                }
            }
            b'[' => {
                parts.push(&s[from..i]);
                from = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&s[from..]);
    parts
}

fn has_bare_closing_bracket(s: &str) -> bool {
    let mut i = 0;
    while i < s.len() {
        match s.as_bytes()[i] {
            b'{' => {
                if let Some(placeholder) = placeholder_at(s, i) {
                    i = placeholder.end;
                    continue;
                }
            }
            b']' => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

fn parse_placeholders(s: &str) -> RouteData {
    let mut segments = Vec::new();
    let mut literal_from = 0;
    let mut i = 0;
    while i < s.len() {
        if s.as_bytes()[i] == b'{' {
            if let Some(placeholder) = placeholder_at(s, i) {
                if literal_from < i {
                    segments.push(Segment::Static(s[literal_from..i].to_string()));
                }
                segments.push(Segment::Placeholder {
                    name: placeholder.name.to_string(),
                    regex: placeholder
                        .regex
                        .unwrap_or(DEFAULT_PLACEHOLDER_REGEX)
                        .to_string(),
                });
                i = placeholder.end;
                literal_from = i;
                continue;
            }
        }
        i += 1;
    }
    if literal_from < s.len() {
        segments.push(Segment::Static(s[literal_from..].to_string()));
    }
    segments
}
