//! Repository paths.
//!
//! The repository addresses files by a list of name segments. Callers may hand
//! those over either as a single string (segments separated by `/` or `:`) or
//! as an explicit list. On the wire the segments are joined with `:`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between path components in the string form.
pub const SEPARATOR: char = '/';

/// Separator between path components on the wire.
pub const WIRE_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoPath {
    /// `/home/admin` or `:home:admin`.
    Text(String),
    /// `["home", "admin"]`.
    Segments(Vec<String>),
}

impl RepoPath {
    /// The `:`-joined wire form, not yet percent-encoded.
    ///
    /// A string path has every `/` replaced by `:`; a segment list is joined
    /// with `:` as is.
    pub fn escaped(&self) -> String {
        match self {
            RepoPath::Text(text) => text.replace(SEPARATOR, ":"),
            RepoPath::Segments(segments) => segments.join(":"),
        }
    }

    /// Non-empty segments, whatever the input form.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            RepoPath::Text(text) => text
                .split([SEPARATOR, WIRE_SEPARATOR])
                .filter(|s| !s.is_empty())
                .collect(),
            RepoPath::Segments(segments) => segments
                .iter()
                .map(String::as_str)
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RepoPath::Text(text) => text.is_empty(),
            RepoPath::Segments(segments) => segments.iter().all(String::is_empty),
        }
    }

    /// The last segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments().pop()
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments().join("/"))
    }
}

impl From<&str> for RepoPath {
    fn from(text: &str) -> Self {
        RepoPath::Text(text.to_string())
    }
}

impl From<String> for RepoPath {
    fn from(text: String) -> Self {
        RepoPath::Text(text)
    }
}

impl From<&String> for RepoPath {
    fn from(text: &String) -> Self {
        RepoPath::Text(text.clone())
    }
}

impl From<Vec<String>> for RepoPath {
    fn from(segments: Vec<String>) -> Self {
        RepoPath::Segments(segments)
    }
}

impl From<&[&str]> for RepoPath {
    fn from(segments: &[&str]) -> Self {
        RepoPath::Segments(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RepoPath {
    fn from(segments: [&str; N]) -> Self {
        RepoPath::Segments(segments.iter().map(|s| s.to_string()).collect())
    }
}
