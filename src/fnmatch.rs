//! Shell-style wildcard matching for single path components.
//!
//! Supports `*`, `?`, `[seq]` and `[!seq]`. A `[` without a closing `]` is literal.
//! Matching is case-sensitive; callers case-fold both sides beforehand.

use regex::Regex;

use crate::error::PathError;

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self, PathError> {
        let regex = Regex::new(&translate(pattern))
            .map_err(|_| PathError::InvalidPattern(pattern.to_string()))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Translates a wildcard pattern into an anchored regular expression.
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let n = chars.len();
    let mut out = String::from("^(?s:");
    let mut i = 0;

    while i < n {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                while i < n && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }
                if j >= n {
                    out.push_str("\\[");
                    continue;
                }
                let class: Vec<char> = chars[i..j].to_vec();
                i = j + 1;
                out.push('[');
                let mut rest = class.as_slice();
                if let Some(('!', tail)) = rest.split_first().map(|(c, t)| (*c, t)) {
                    out.push('^');
                    rest = tail;
                } else if rest.first() == Some(&'^') {
                    out.push_str("\\^");
                    rest = &rest[1..];
                }
                for &c in rest {
                    match c {
                        '\\' | '[' | ']' | '&' | '~' | '^' => {
                            out.push('\\');
                            out.push(c);
                        }
                        _ => out.push(c),
                    }
                }
                out.push(']');
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    out.push_str(")$");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn matches(pattern: &str, name: &str) -> bool {
        WildcardPattern::new(pattern).unwrap().matches(name)
    }

    #[test]
    fn test_star_and_question_mark() {
        assert!(matches("*.py", "setup.py"));
        assert!(matches("*.py", ".py"));
        assert!(!matches("*.py", "setup.pyc"));
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
        assert!(matches("**", ""));
    }

    #[test]
    fn test_character_classes() {
        assert!(matches("file[0-9].txt", "file7.txt"));
        assert!(!matches("file[0-9].txt", "filex.txt"));
        assert!(matches("file[!0-9].txt", "filex.txt"));
        assert!(matches("[]]", "]"));
        assert!(matches("[!]]", "a"));
        assert!(matches("[^a]", "^"));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        assert!(matches("a[b", "a[b"));
        assert!(!matches("a[b", "ab"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("a+b(c).$", "a+b(c).$"));
        assert!(!matches("a.b", "axb"));
        assert!(matches("[a&&b]", "&"));
    }

    #[test]
    fn test_matches_newlines() {
        assert!(matches("a*b", "a\nb"));
    }

    #[test]
    fn test_invalid_range() -> Result<()> {
        let err = WildcardPattern::new("[z-a]").unwrap_err();
        assert!(matches!(err, PathError::InvalidPattern(_)));
        Ok(())
    }
}
