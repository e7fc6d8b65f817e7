//! Ant-style URL patterns.
//!
//! Patterns are used in three places: selecting a [`SecurityFilterChain`](crate::chain::SecurityFilterChain),
//! looking up a CORS configuration, and matching authorization rules. All three
//! compile their patterns once at startup.
//!
//! | Token | Matches                                   |
//! |-------|-------------------------------------------|
//! | `?`   | exactly one character other than `/`      |
//! | `*`   | zero or more characters within a segment  |
//! | `**`  | zero or more whole segments               |
//!
//! When several patterns match the same path, the most specific one wins:
//! fewer `**` segments first, then fewer single-segment wildcards, then the
//! longer pattern. The catch-all `/**` therefore always loses against anything
//! more precise.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::ConfigError;

/// A compiled Ant-style path pattern
#[derive(Clone)]
pub struct PathPattern {
    raw: Arc<str>,
    regex: Regex,
    double_wildcards: usize,
    single_wildcards: usize,
}

impl PathPattern {
    /// Compile a pattern. Patterns must be absolute (start with `/`).
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        if !pattern.starts_with('/') {
            return Err(ConfigError::InvalidPathPattern {
                pattern: pattern.to_string(),
                reason: "pattern must start with '/'".to_string(),
            });
        }

        let mut expr = String::with_capacity(pattern.len() * 2 + 8);
        expr.push('^');
        let mut double_wildcards = 0;
        let mut single_wildcards = 0;

        for segment in pattern[1..].split('/') {
            if segment == "**" {
                double_wildcards += 1;
                expr.push_str("(?:/.*)?");
                continue;
            }
            if segment.contains("**") {
                return Err(ConfigError::InvalidPathPattern {
                    pattern: pattern.to_string(),
                    reason: "'**' must occupy a whole path segment".to_string(),
                });
            }
            expr.push('/');
            for c in segment.chars() {
                match c {
                    '*' => {
                        single_wildcards += 1;
                        expr.push_str("[^/]*");
                    }
                    '?' => {
                        single_wildcards += 1;
                        expr.push_str("[^/]");
                    }
                    other => {
                        let mut buf = [0u8; 4];
                        expr.push_str(&regex::escape(other.encode_utf8(&mut buf)));
                    }
                }
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| ConfigError::InvalidPathPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: Arc::from(pattern),
            regex,
            double_wildcards,
            single_wildcards,
        })
    }

    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Sort key where smaller means more specific
    pub fn specificity(&self) -> (usize, usize, Reverse<usize>) {
        (
            self.double_wildcards,
            self.single_wildcards,
            Reverse(self.raw.len()),
        )
    }

    /// Pick the entry whose pattern matches `path` most specifically.
    ///
    /// Ties keep the earliest registered entry.
    pub fn most_specific<'a, T, I>(entries: I, path: &str) -> Option<&'a T>
    where
        I: IntoIterator<Item = (&'a PathPattern, &'a T)>,
        T: 'a,
    {
        let mut best: Option<(&PathPattern, &T)> = None;
        for (pattern, value) in entries {
            if !pattern.matches(path) {
                continue;
            }
            match best {
                Some((current, _)) if current.specificity() <= pattern.specificity() => {}
                _ => best = Some((pattern, value)),
            }
        }
        best.map(|(_, v)| v)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.raw).finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PathPattern {}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathPattern {
        PathPattern::parse(s).unwrap()
    }

    #[test]
    fn test_catch_all_matches_root_and_nested() {
        let all = p("/**");
        assert!(all.matches("/"));
        assert!(all.matches("/a/b/c"));
        assert!(all.matches("/a?x=1"));
    }

    #[test]
    fn test_prefix_double_wildcard() {
        let api = p("/api/**");
        assert!(api.matches("/api"));
        assert!(api.matches("/api/users/1"));
        assert!(!api.matches("/apix"));
        assert!(!api.matches("/other/api"));
    }

    #[test]
    fn test_single_wildcards_stay_in_segment() {
        let users = p("/users/*");
        assert!(users.matches("/users/42"));
        assert!(!users.matches("/users/42/posts"));
        let q = p("/v?/items");
        assert!(q.matches("/v1/items"));
        assert!(!q.matches("/v10/items"));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let dotted = p("/files/a.txt");
        assert!(dotted.matches("/files/a.txt"));
        assert!(!dotted.matches("/files/abtxt"));
    }

    #[test]
    fn test_rejects_relative_and_embedded_double_wildcard() {
        assert!(PathPattern::parse("api/**").is_err());
        assert!(PathPattern::parse("/api/x**").is_err());
    }

    #[test]
    fn test_most_specific_wins() {
        let entries = vec![(p("/**"), "all"), (p("/api/**"), "api"), (p("/api/users/*"), "users")];
        let pick = |path: &str| {
            PathPattern::most_specific(entries.iter().map(|(k, v)| (k, v)), path).copied()
        };
        assert_eq!(pick("/"), Some("all"));
        assert_eq!(pick("/api/orders"), Some("api"));
        assert_eq!(pick("/api/users/7"), Some("users"));
    }

    #[test]
    fn test_exact_beats_catch_all() {
        let entries = vec![(p("/**"), 1), (p("/"), 2)];
        let got = PathPattern::most_specific(entries.iter().map(|(k, v)| (k, v)), "/");
        assert_eq!(got, Some(&2));
    }
}
