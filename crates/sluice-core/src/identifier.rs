//! Hierarchical composition identifiers.
//!
//! Every running (sub)composition is named by a `/`-joined path such as
//! `Top/Sub/Inner`. Telemetry records and port lookups are scoped by this path,
//! so a subscriber to `Top/Sub` observes `Top/Sub` and everything nested below
//! it, but nothing from `Top` itself or from sibling subcompositions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path segment separator.
pub const SEPARATOR: char = '/';

/// Name given to the outermost composition when none is specified.
pub const TOP_LEVEL: &str = "Top";

/// Error returned when parsing a malformed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The identifier string was empty.
    #[error("composition identifier is empty")]
    Empty,
    /// One of the `/`-separated segments was empty (e.g. `Top//Sub`).
    #[error("composition identifier `{0}` contains an empty segment")]
    EmptySegment(String),
}

/// A `/`-joined path identifying one composition instance in a hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompositionIdentifier {
    segments: Vec<String>,
}

impl CompositionIdentifier {
    /// Identifier of the default top-level composition, `Top`.
    pub fn top() -> Self {
        Self {
            segments: vec![TOP_LEVEL.to_string()],
        }
    }

    /// Creates a single-segment identifier.
    ///
    /// Separators inside `name` are replaced with `_` so the result always has
    /// exactly one segment.
    pub fn root(name: &str) -> Self {
        Self {
            segments: vec![sanitize(name)],
        }
    }

    /// Identifier of the subcomposition instantiated as node `name` inside this
    /// composition.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(sanitize(name));
        Self { segments }
    }

    /// Identifier of the enclosing composition, or `None` at the top level.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns `true` if this identifier equals `scope` or is nested below it.
    ///
    /// Matching is segment-wise: `Top/Subway` is not within `Top/Sub`.
    pub fn is_within(&self, scope: &CompositionIdentifier) -> bool {
        self.segments.len() >= scope.segments.len()
            && self.segments[..scope.segments.len()] == scope.segments[..]
    }

    /// Number of segments (1 for a top-level composition).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last path segment.
    pub fn leaf(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// All path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl Default for CompositionIdentifier {
    fn default() -> Self {
        Self::top()
    }
}

impl fmt::Display for CompositionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for CompositionIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdentifierError::Empty);
        }
        let segments: Vec<String> = s.split(SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(IdentifierError::EmptySegment(s.to_string()));
        }
        Ok(Self { segments })
    }
}

impl TryFrom<String> for CompositionIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CompositionIdentifier> for String {
    fn from(value: CompositionIdentifier) -> Self {
        value.to_string()
    }
}

fn sanitize(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    name.replace(SEPARATOR, "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: CompositionIdentifier = "Top/Sub/Inner".parse().unwrap();
        assert_eq!(id.depth(), 3);
        assert_eq!(id.leaf(), "Inner");
        assert_eq!(id.to_string(), "Top/Sub/Inner");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert_eq!(
            "".parse::<CompositionIdentifier>(),
            Err(IdentifierError::Empty)
        );
        assert!(matches!(
            "Top//Sub".parse::<CompositionIdentifier>(),
            Err(IdentifierError::EmptySegment(_))
        ));
        assert!("Top/".parse::<CompositionIdentifier>().is_err());
    }

    #[test]
    fn test_child_and_parent() {
        let top = CompositionIdentifier::top();
        let sub = top.child("Sub");
        assert_eq!(sub.to_string(), "Top/Sub");
        assert_eq!(sub.parent(), Some(top.clone()));
        assert_eq!(top.parent(), None);
    }

    #[test]
    fn test_child_sanitizes_separator() {
        let id = CompositionIdentifier::top().child("a/b");
        assert_eq!(id.depth(), 2);
        assert_eq!(id.leaf(), "a_b");
    }

    #[test]
    fn test_is_within_is_segment_wise() {
        let sub: CompositionIdentifier = "Top/Sub".parse().unwrap();
        let inner: CompositionIdentifier = "Top/Sub/Inner".parse().unwrap();
        let subway: CompositionIdentifier = "Top/Subway".parse().unwrap();

        assert!(inner.is_within(&sub));
        assert!(sub.is_within(&sub));
        assert!(!subway.is_within(&sub));
        assert!(!sub.is_within(&inner));
        assert!(inner.is_within(&CompositionIdentifier::top()));
    }

    #[test]
    fn test_serde_as_string() {
        let id: CompositionIdentifier = "Top/Sub".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Top/Sub\"");
        let back: CompositionIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<CompositionIdentifier>("\"\"").is_err());
    }
}
