//! Dot-separated paths and the wildcard grammar that matches them.
//!
//! # Grammar
//!
//! A pattern is a `.`-separated list of tokens:
//!
//! | Token | Matches |
//! |-------|---------|
//! | `name` | exactly the segment `name` |
//! | `{regex}` | one segment matching the regex (anchored) |
//! | `?` | zero or one segment |
//! | `+` | exactly one segment |
//! | `N++` | exactly `N` segments (`N >= 1`) |
//! | `++` | one or more segments (greedy) |
//! | `??` or `*` | zero or more segments (greedy) |
//!
//! At most one greedy token (`++`, `??`, `*`) may appear in a pattern.
//! Dots inside `{...}` belong to the regex.
//!
//! ```text
//! pattern  conduit . plugin . ?? . {read|write}
//! path     conduit . plugin . acme . tool . read      -> match
//! path     conduit . plugin . read                    -> match (?? takes zero)
//! path     conduit . read                             -> no match
//! ```

use crate::{AuthError, Matcher};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A dot-separated identifier such as `conduit.plugin.install`.
///
/// The empty string is the empty path. Segments are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentPath {
    segments: Vec<String>,
}

impl SegmentPath {
    /// Parses `path`.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidPath`] if any segment is empty.
    pub fn parse(path: &str) -> Result<Self, AuthError> {
        if path.is_empty() {
            return Ok(Self::default());
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(AuthError::InvalidPath {
                path: path.to_string(),
                reason: "empty segment".to_string(),
            });
        }
        Ok(Self { segments })
    }

    /// Builds a path from already split segments.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidPath`] if a segment is empty or contains a dot.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(bad) = segments.iter().find(|s| s.is_empty() || s.contains('.')) {
            return Err(AuthError::InvalidPath {
                path: segments.join("."),
                reason: format!("segment '{bad}' is empty or contains '.'"),
            });
        }
        Ok(Self { segments })
    }

    /// The segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Appends a segment.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidPath`] if `segment` is empty or contains a dot.
    pub fn child(&self, segment: &str) -> Result<Self, AuthError> {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self::from_segments(segments)
    }
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for SegmentPath {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SegmentPath {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SegmentPath> for String {
    fn from(path: SegmentPath) -> Self {
        path.to_string()
    }
}

#[derive(Debug, Clone)]
enum Token {
    Literal(String),
    Pattern(Regex),
    Optional,
    One,
    Exactly(usize),
    Greedy { min: usize },
}

impl Token {
    fn is_greedy(&self) -> bool {
        matches!(self, Self::Greedy { .. })
    }

    fn accepts(&self, segment: &str) -> bool {
        match self {
            Self::Literal(text) => text == segment,
            Self::Pattern(re) => re.is_match(segment),
            _ => true,
        }
    }
}

/// Compiled segment pattern.
///
/// Serializes as its source text and compiles again on deserialization.
///
/// # Example
///
/// ```
/// use conduit_auth::SegmentMatcher;
///
/// let m = SegmentMatcher::compile("conduit.plugin.??.{read|write}").unwrap();
/// assert!(m.matches_str("conduit.plugin.acme.tool.read"));
/// assert!(m.matches_str("conduit.plugin.write"));
/// assert!(!m.matches_str("conduit.read"));
///
/// assert!(SegmentMatcher::compile("a.++.b.??").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SegmentMatcher {
    source: String,
    tokens: Vec<Token>,
    min_len: usize,
    max_len: Option<usize>,
}

impl SegmentMatcher {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidPattern`] for empty segments, unbalanced braces,
    ///   a bad `N++` count or counts that overflow when summed.
    /// - [`AuthError::InvalidRegex`] for a `{regex}` that does not compile.
    /// - [`AuthError::MultipleGreedy`] for a second greedy wildcard.
    pub fn compile(pattern: &str) -> Result<Self, AuthError> {
        let mut tokens = Vec::new();
        for segment in split_pattern(pattern)? {
            let token = parse_token(pattern, segment)?;
            if token.is_greedy() && tokens.iter().any(Token::is_greedy) {
                return Err(AuthError::MultipleGreedy {
                    pattern: pattern.to_string(),
                });
            }
            tokens.push(token);
        }

        let too_long = || AuthError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "segment counts overflow".to_string(),
        };
        let mut min_len = 0usize;
        let mut max_len = Some(0usize);
        for token in &tokens {
            let (lo, hi) = match token {
                Token::Optional => (0, Some(1)),
                Token::Exactly(n) => (*n, Some(*n)),
                Token::Greedy { min } => (*min, None),
                _ => (1, Some(1)),
            };
            min_len = min_len.checked_add(lo).ok_or_else(too_long)?;
            max_len = match (max_len, hi) {
                (Some(a), Some(b)) => Some(a.checked_add(b).ok_or_else(too_long)?),
                _ => None,
            };
        }

        Ok(Self {
            source: pattern.to_string(),
            tokens,
            min_len,
            max_len,
        })
    }

    /// Pattern source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains a greedy wildcard.
    #[must_use]
    pub fn is_greedy(&self) -> bool {
        self.tokens.iter().any(Token::is_greedy)
    }

    /// Matches split segments.
    #[must_use]
    pub fn matches_segments<S: AsRef<str>>(&self, segments: &[S]) -> bool {
        let n = segments.len();
        if n < self.min_len || self.max_len.is_some_and(|max| n > max) {
            return false;
        }

        // reach[j]: the tokens consumed so far can cover exactly segments[..j].
        let mut reach = vec![false; n + 1];
        reach[0] = true;
        for token in &self.tokens {
            let mut next = vec![false; n + 1];
            for j in (0..=n).filter(|&j| reach[j]) {
                match token {
                    Token::Optional => {
                        next[j] = true;
                        if j < n {
                            next[j + 1] = true;
                        }
                    }
                    Token::Exactly(k) => {
                        if let Some(end) = j.checked_add(*k).filter(|&end| end <= n) {
                            next[end] = true;
                        }
                    }
                    Token::Greedy { min } => {
                        for slot in next.iter_mut().skip(j.saturating_add(*min)) {
                            *slot = true;
                        }
                    }
                    single => {
                        if j < n && single.accepts(segments[j].as_ref()) {
                            next[j + 1] = true;
                        }
                    }
                }
            }
            if !next.contains(&true) {
                return false;
            }
            reach = next;
        }
        reach[n]
    }

    /// Matches a dot-separated path given as text.
    #[must_use]
    pub fn matches_str(&self, path: &str) -> bool {
        if path.is_empty() {
            return self.matches_segments::<&str>(&[]);
        }
        let segments: Vec<&str> = path.split('.').collect();
        self.matches_segments(&segments)
    }
}

impl Matcher<SegmentPath> for SegmentMatcher {
    fn matches(&self, candidate: &SegmentPath) -> bool {
        self.matches_segments(candidate.segments())
    }
}

impl Matcher<str> for SegmentMatcher {
    fn matches(&self, candidate: &str) -> bool {
        self.matches_str(candidate)
    }
}

impl PartialEq for SegmentMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for SegmentMatcher {}

impl fmt::Display for SegmentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for SegmentMatcher {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl TryFrom<String> for SegmentMatcher {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::compile(&value)
    }
}

impl From<SegmentMatcher> for String {
    fn from(matcher: SegmentMatcher) -> Self {
        matcher.source
    }
}

fn split_pattern(pattern: &str) -> Result<Vec<&str>, AuthError> {
    let invalid = |reason: &str| AuthError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in pattern.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| invalid("unbalanced '}'"))?;
            }
            '.' if depth == 0 => {
                segments.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid("unbalanced '{'"));
    }
    segments.push(&pattern[start..]);

    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid("empty segment"));
    }
    Ok(segments)
}

fn parse_token(pattern: &str, segment: &str) -> Result<Token, AuthError> {
    let invalid = |reason: String| AuthError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    match segment {
        "?" => return Ok(Token::Optional),
        "+" => return Ok(Token::One),
        "++" => return Ok(Token::Greedy { min: 1 }),
        "??" | "*" => return Ok(Token::Greedy { min: 0 }),
        _ => {}
    }

    if let Some(body) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if body.is_empty() {
            return Err(invalid("empty regex segment '{}'".to_string()));
        }
        return Regex::new(&format!("^(?:{body})$"))
            .map(Token::Pattern)
            .map_err(|source| AuthError::InvalidRegex {
                pattern: pattern.to_string(),
                segment: body.to_string(),
                source,
            });
    }

    if let Some(count) = segment.strip_suffix("++") {
        if !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit()) {
            return match count.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Token::Exactly(n)),
                _ => Err(invalid(format!("'{segment}' needs a positive count"))),
            };
        }
    }

    if segment.contains(|c| c == '{' || c == '}') {
        return Err(invalid(format!(
            "segment '{segment}' mixes braces with literal text"
        )));
    }
    Ok(Token::Literal(segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str) -> SegmentMatcher {
        SegmentMatcher::compile(pattern).unwrap()
    }

    #[test]
    fn literal_matches_exactly() {
        let p = m("conduit.plugin.install");
        assert!(p.matches_str("conduit.plugin.install"));
        assert!(!p.matches_str("conduit.plugin"));
        assert!(!p.matches_str("conduit.plugin.install.extra"));
    }

    #[test]
    fn optional_one() {
        let p = m("a.?.c");
        assert!(p.matches_str("a.c"));
        assert!(p.matches_str("a.b.c"));
        assert!(!p.matches_str("a.b.b.c"));
    }

    #[test]
    fn optional_before_literal_backtracks() {
        let p = m("a.?.?.b");
        assert!(p.matches_str("a.b"));
        assert!(p.matches_str("a.x.b"));
        assert!(p.matches_str("a.b.b"));
        assert!(p.matches_str("a.x.y.b"));
        assert!(!p.matches_str("a.x.y.z.b"));
    }

    #[test]
    fn required_one() {
        let p = m("a.+");
        assert!(p.matches_str("a.b"));
        assert!(!p.matches_str("a"));
        assert!(!p.matches_str("a.b.c"));
    }

    #[test]
    fn greedy_required() {
        let p = m("a.++");
        assert!(!p.matches_str("a"));
        assert!(p.matches_str("a.b"));
        assert!(p.matches_str("a.b.c.d"));
    }

    #[test]
    fn greedy_optional_consumes_zero() {
        for pattern in ["a.??", "a.*"] {
            let p = m(pattern);
            assert!(p.matches_str("a"), "{pattern}");
            assert!(p.matches_str("a.b.c"), "{pattern}");
            assert!(!p.matches_str("b"), "{pattern}");
        }
    }

    #[test]
    fn greedy_in_the_middle() {
        let p = m("a.++.z");
        assert!(p.matches_str("a.b.z"));
        assert!(p.matches_str("a.b.c.z"));
        assert!(!p.matches_str("a.z"));
        assert!(!p.matches_str("a.b.c"));
    }

    #[test]
    fn fixed_count() {
        let p = m("a.2++");
        assert!(p.matches_str("a.b.c"));
        assert!(!p.matches_str("a.b"));
        assert!(!p.matches_str("a.b.c.d"));
        assert!(!p.is_greedy());
    }

    #[test]
    fn fixed_count_is_not_greedy() {
        assert!(SegmentMatcher::compile("2++.a.??").is_ok());
    }

    #[test]
    fn regex_segment() {
        let p = m("a.{v[0-9]+}.b");
        assert!(p.matches_str("a.v12.b"));
        assert!(!p.matches_str("a.v.b"));
        assert!(!p.matches_str("a.xv1.b"), "regex is anchored");
    }

    #[test]
    fn regex_with_dots_and_braces() {
        let p = m("{a.c}.{x{2}}");
        assert!(p.matches_str("abc.xx"));
        assert!(!p.matches_str("abc.x"));
    }

    #[test]
    fn shorter_than_prefix() {
        assert!(!m("a.b.c.??").matches_str("a.b"));
        assert!(!m("a.b.c.??").matches_str(""));
    }

    #[test]
    fn empty_pattern_matches_empty_path() {
        let p = m("");
        assert!(p.matches_str(""));
        assert!(!p.matches_str("a"));
        assert!(m("??").matches_str(""));
    }

    #[test]
    fn second_greedy_rejected() {
        for pattern in ["++.++", "??.a.++", "*.??", "a.*.b.*"] {
            assert!(
                matches!(
                    SegmentMatcher::compile(pattern),
                    Err(AuthError::MultipleGreedy { .. })
                ),
                "{pattern}"
            );
        }
    }

    #[test]
    fn malformed_patterns() {
        for pattern in ["a..b", ".a", "a.", "{a", "a}", "{}", "0++", "x{a}"] {
            assert!(
                matches!(
                    SegmentMatcher::compile(pattern),
                    Err(AuthError::InvalidPattern { .. })
                ),
                "{pattern}"
            );
        }
        assert!(matches!(
            SegmentMatcher::compile("{(}"),
            Err(AuthError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn huge_counts_are_rejected() {
        let max = usize::MAX;
        for pattern in [format!("{max}++.1++"), format!("a.{max}++"), format!("{max}++.?")] {
            assert!(
                matches!(
                    SegmentMatcher::compile(&pattern),
                    Err(AuthError::InvalidPattern { .. })
                ),
                "{pattern}"
            );
        }

        let p = m(&format!("{max}++"));
        assert!(!p.matches_str("a.b"));
        let p = m(&format!("a.{}++", max - 1));
        assert!(!p.matches_str("a.b.c"));
    }

    #[test]
    fn matcher_serializes_as_source() {
        let p = m("a.{b|c}.??");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#""a.{b|c}.??""#);
        let back: SegmentMatcher = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<SegmentMatcher>(r#""a..b""#).is_err());
    }

    #[test]
    fn path_parsing() {
        let path: SegmentPath = "a.b.c".parse().unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "a.b.c");
        assert!(SegmentPath::parse("").unwrap().is_empty());
        assert!(SegmentPath::parse("a..b").is_err());
        assert!(path.child("d").is_ok());
        assert!(path.child("d.e").is_err());
    }

    #[test]
    fn matcher_trait_on_path() {
        let path: SegmentPath = "conduit.permission.check".parse().unwrap();
        assert!(Matcher::<SegmentPath>::matches(&m("conduit.++"), &path));
        assert!(Matcher::<str>::matches(&m("conduit.+.check"), "conduit.permission.check"));
    }
}
