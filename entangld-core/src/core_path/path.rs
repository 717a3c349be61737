/*
    Path - dotted addresses into a store's namespace

    A path is a sequence of non-empty segments joined by `.`, e.g. `other.sensors.temp`.
    The empty string is the root of the namespace.

    Attachment routing needs three things from a path:
    - prefix test on whole segments (`other` covers `other.x`, never `otherwise.x`)
    - stripping a prefix to get the path relative to a peer
    - rendering back to the dotted form for the wire
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment separator used on the wire and in the public API
pub const SEPARATOR: char = '.';

/// Errors raised while parsing a dotted path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty segment in path '{0}'")]
    EmptySegment(String),

    #[error("path must name a leaf, got the root")]
    Root,
}

/// A parsed dotted path
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The root of the namespace
    pub fn root() -> Self {
        Path::default()
    }

    /// Parse a dotted string. The empty string parses to the root.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Ok(Path::root());
        }

        let mut segments = Vec::new();
        for part in input.split(SEPARATOR) {
            if part.is_empty() {
                return Err(PathError::EmptySegment(input.to_string()));
            }
            segments.push(part.to_string());
        }

        Ok(Path { segments })
    }

    /// Parse a path that must name something below the root
    pub fn parse_leaf(input: &str) -> Result<Self, PathError> {
        let path = Path::parse(input)?;
        if path.is_root() {
            return Err(PathError::Root);
        }
        Ok(path)
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment(segments.join(".")));
        }
        Ok(Path { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `prefix` matches the leading segments of this path
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// True if this path lies strictly below `prefix`
    pub fn is_under(&self, prefix: &Path) -> bool {
        self.segments.len() > prefix.segments.len() && self.starts_with(prefix)
    }

    /// Remove `prefix` from the front of this path.
    ///
    /// Returns `None` when the path does not start with `prefix`.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Path {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }

    /// Drop the first `n` segments
    pub fn skip(&self, n: usize) -> Path {
        Path {
            segments: self.segments.iter().skip(n).cloned().collect(),
        }
    }

    /// Append `other` to this path
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Path { segments }
    }

    /// Append a single segment
    pub fn child(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Path { segments }
    }

    /// Render back to the dotted form
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Path::parse(&value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_dotted()
    }
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}
