//! Store Paths
//!
//! A [`Path`] addresses a value inside a [`Store`](super::Store) using
//! JSON-pointer syntax (RFC 6901): `""` is the root, `/todos/0/done` walks
//! the `todos` key, then index `0`, then the `done` key. Inside a segment,
//! `~1` stands for `/` and `~0` for `~`.
//!
//! When writing, the segment `-` on an array means "one past the end".

use std::fmt;
use std::str::FromStr;

use crate::error::{ReactiveError, Result};

/// Segment that appends to an array.
pub const APPEND: &str = "-";

/// Location of a value inside a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    /// Append an object key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(key.into());
        self
    }

    /// Append an array index.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(index.to_string());
        self
    }

    /// Append the array end marker, for writes that push.
    pub fn append(mut self) -> Self {
        self.segments.push(APPEND.to_string());
        self
    }

    /// Parse a JSON pointer.
    pub fn parse(pointer: &str) -> Result<Self> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(invalid(pointer, "a non-empty path must start with '/'"));
        };

        let segments = rest
            .split('/')
            .map(|raw| unescape(raw).ok_or_else(|| invalid(pointer, "'~' must be followed by '0' or '1'")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
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

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// The parent path and the last segment, or `None` for the root.
    pub fn split_last(&self) -> Option<(Path, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            Path {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// The first `len` segments.
    pub(crate) fn prefix(&self, len: usize) -> Path {
        Path {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }
}

impl FromStr for Path {
    type Err = ReactiveError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

/// Parse an array index segment. Leading zeros are not indices.
pub(crate) fn parse_index(segment: &str) -> Option<usize> {
    let canonical = segment == "0"
        || (!segment.is_empty()
            && !segment.starts_with('0')
            && segment.bytes().all(|b| b.is_ascii_digit()));
    if canonical {
        segment.parse().ok()
    } else {
        None
    }
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn invalid(path: &str, reason: &str) -> ReactiveError {
    ReactiveError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
