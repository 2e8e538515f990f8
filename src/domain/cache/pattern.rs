//! Glob-style key patterns
//!
//! Mirrors the subset of Redis `KEYS`/`SCAN MATCH` syntax that invalidation
//! uses: `*`, `?`, `[...]` classes and `\` escapes. Backends that cannot push
//! the pattern down to the store (in-memory, mocks) match keys through
//! [`GlobPattern`].

use regex::Regex;

use crate::domain::DomainError;

/// Characters with special meaning inside a glob pattern
const GLOB_SPECIAL: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Returns true when `key` should be treated as a pattern rather than an exact key
pub fn is_pattern(key: &str) -> bool {
    key.contains('*')
}

/// Escapes glob metacharacters so `value` only matches itself
pub fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        if GLOB_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// A compiled glob pattern matched against whole keys
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob pattern
    pub fn new(pattern: &str) -> Result<Self, DomainError> {
        let regex = Regex::new(&glob_to_regex(pattern)?)
            .map_err(|e| DomainError::validation(format!("Invalid pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns true when the whole key matches
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The original glob text
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn glob_to_regex(pattern: &str) -> Result<String, DomainError> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => {
                    return Err(DomainError::validation(format!(
                        "Invalid pattern '{}': trailing escape",
                        pattern
                    )));
                }
            },
            '[' => {
                let mut class = String::from("[");
                let mut closed = false;

                if let Some(first) = chars.next() {
                    match first {
                        '^' | '!' => class.push('^'),
                        ']' => {
                            closed = true;
                        }
                        other => push_class_char(&mut class, other),
                    }
                }

                if !closed {
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            closed = true;
                            break;
                        }
                        push_class_char(&mut class, inner);
                    }
                }

                if !closed || class.len() == 1 {
                    return Err(DomainError::validation(format!(
                        "Invalid pattern '{}': unterminated character class",
                        pattern
                    )));
                }

                class.push(']');
                out.push_str(&class);
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Ok(out)
}

fn push_class_char(class: &mut String, c: char) {
    match c {
        '-' => class.push('-'),
        '\\' | '[' | ']' | '^' | '&' | '~' => {
            class.push('\\');
            class.push(c);
        }
        other => class.push(other),
    }
}
