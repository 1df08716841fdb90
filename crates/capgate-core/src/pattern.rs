//! Case-insensitive wildcard patterns.
//!
//! Used for allow/deny tool-name lists and for the string-like scope classes
//! (`env`, `secret`, `model`, `sandbox`, `proc`, and network hosts). The kind
//! of a pattern is worked out once when it is parsed, so matching never
//! re-inspects the pattern text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use capgate_contracts::error::GateError;

/// The shape of a wildcard pattern, with its literal parts lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    /// `*` on its own.
    Universal,
    /// No wildcard at all.
    Exact(String),
    /// `prefix*`
    Prefix(String),
    /// `*suffix`
    Suffix(String),
    /// `*substring*`
    Substring(String),
    /// Any other placement of `*`, e.g. `api.*.example.*`. Holds the literal
    /// pieces between the stars, including empty leading/trailing pieces.
    Segments(Vec<String>),
}

/// A compiled wildcard pattern.
///
/// Serializes as its original (trimmed) text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Pattern {
    source: String,
    kind: PatternKind,
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        let source = pattern.trim().to_string();
        let lowered = source.to_ascii_lowercase();
        let kind = classify(&lowered);
        Self { source, kind }
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Return true if `value` matches, ignoring ASCII case.
    pub fn matches(&self, value: &str) -> bool {
        let value = value.trim().to_ascii_lowercase();
        match &self.kind {
            PatternKind::Universal => true,
            PatternKind::Exact(s) => value == *s,
            PatternKind::Prefix(p) => value.starts_with(p.as_str()),
            PatternKind::Suffix(s) => value.ends_with(s.as_str()),
            PatternKind::Substring(s) => value.contains(s.as_str()),
            PatternKind::Segments(parts) => segments_match(parts, &value),
        }
    }
}

fn classify(p: &str) -> PatternKind {
    if p == "*" {
        return PatternKind::Universal;
    }
    let stars = p.matches('*').count();
    if stars == 0 {
        return PatternKind::Exact(p.to_string());
    }

    let leading = p.starts_with('*');
    let trailing = p.ends_with('*');
    let inner = p.trim_matches('*');

    if !inner.contains('*') && !inner.is_empty() {
        match (leading, trailing) {
            (true, true) if p.len() - inner.len() == 2 => {
                return PatternKind::Substring(inner.to_string())
            }
            (true, false) if stars == 1 => return PatternKind::Suffix(inner.to_string()),
            (false, true) if stars == 1 => return PatternKind::Prefix(inner.to_string()),
            _ => {}
        }
    }

    if inner.is_empty() {
        // `**`, `***`, ... behave like `*`.
        return PatternKind::Universal;
    }

    PatternKind::Segments(p.split('*').map(str::to_string).collect())
}

/// Split-and-scan match: the first piece anchors the start, the last piece
/// anchors the end, and the middle pieces must appear in order between them.
fn segments_match(parts: &[String], value: &str) -> bool {
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return value.is_empty(),
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return value == first,
    };

    if !value.starts_with(first.as_str()) {
        return false;
    }
    let mut cursor = first.len();
    for part in middle {
        match value[cursor..].find(part.as_str()) {
            Some(idx) => cursor += idx + part.len(),
            None => return false,
        }
    }
    value.len() - cursor >= last.len() && value[cursor..].ends_with(last.as_str())
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Pattern {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<Pattern> for String {
    fn from(p: Pattern) -> Self {
        p.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_pattern_kinds() {
        assert_eq!(Pattern::new("*").kind(), &PatternKind::Universal);
        assert_eq!(Pattern::new("**").kind(), &PatternKind::Universal);
        assert_eq!(
            Pattern::new("Tool.X").kind(),
            &PatternKind::Exact("tool.x".to_string())
        );
        assert_eq!(
            Pattern::new("tool.fs.*").kind(),
            &PatternKind::Prefix("tool.fs.".to_string())
        );
        assert_eq!(
            Pattern::new("*.read").kind(),
            &PatternKind::Suffix(".read".to_string())
        );
        assert_eq!(
            Pattern::new("*secret*").kind(),
            &PatternKind::Substring("secret".to_string())
        );
        assert!(matches!(
            Pattern::new("api.*.example.*").kind(),
            PatternKind::Segments(_)
        ));
    }

    #[test]
    fn matching_ignores_case() {
        assert!(Pattern::new("TOOL.fs.*").matches("tool.FS.Read"));
        assert!(Pattern::new("*KEY").matches("api_key"));
        assert!(Pattern::new("*Token*").matches("GITHUB_TOKEN_RO"));
        assert!(Pattern::new("home").matches("HOME"));
        assert!(!Pattern::new("home").matches("homedir"));
    }

    #[test]
    fn segments_scan_in_order() {
        let p = Pattern::new("api.*.example.*");
        assert!(p.matches("api.eu.example.com"));
        assert!(!p.matches("web.eu.example.com"));
        assert!(!p.matches("api.eu.sample.com"));

        let p = Pattern::new("a*b*c");
        assert!(p.matches("abc"));
        assert!(p.matches("axxbyyc"));
        assert!(!p.matches("acb"));
        // The last piece must not overlap the consumed prefix.
        assert!(!Pattern::new("ab*b").matches("ab"));
    }

    #[test]
    fn leading_and_trailing_multi_star() {
        let p = Pattern::new("*a*b*");
        assert!(p.matches("xaxbx"));
        assert!(p.matches("ab"));
        assert!(!p.matches("ba"));
    }

    #[test]
    fn serializes_as_source_text() {
        let p: Pattern = "tool.fs.*".parse().unwrap();
        assert_eq!(String::from(p.clone()), "tool.fs.*");
        assert_eq!(p.to_string(), "tool.fs.*");
    }
}
