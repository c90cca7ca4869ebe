//! # Repository Identifiers and Tenancy Depth
//!
//! A server instance is configured with a fixed [`Depth`]: the number of
//! leading request-path segments that name a logical repository. The
//! segments are joined into a [`RepositoryId`], which is also the storage
//! key prefix for everything the repository owns.
//!
//! ## Validation
//!
//! Segments are validated at construction time. Empty segments, `.` and
//! `..` are rejected, which keeps every derived storage key inside the
//! repository's own namespace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of leading path segments that form the repository namespace.
///
/// Depth 0 serves a single global repository. Depth N serves one repository
/// per distinct N-segment prefix, discovered at runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Depth(u8);

impl Depth {
    /// The single-repository depth.
    pub const ROOT: Depth = Depth(0);

    /// Create a depth from a segment count.
    pub fn new(segments: u8) -> Self {
        Self(segments)
    }

    /// Number of namespace segments as a `usize`.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Depth {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u8>().map(Self)
    }
}

/// Validate one namespace or filename segment.
///
/// Rejects empty strings, `.`, `..`, and anything containing `/` or `\`.
pub fn validate_segment(segment: &str) -> Result<(), ValidationError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(ValidationError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

/// Identifier of one logical repository.
///
/// The inner string is the namespace segments joined with `/`. The root
/// repository (depth 0) has the empty identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// The single global repository served at depth 0.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Build an identifier from already-split namespace segments.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, ValidationError> {
        let mut id = String::new();
        for (i, segment) in segments.iter().enumerate() {
            let segment = segment.as_ref();
            validate_segment(segment)?;
            if i > 0 {
                id.push('/');
            }
            id.push_str(segment);
        }
        Ok(Self(id))
    }

    /// Parse a `/`-joined namespace such as `org1/team1/repo1`.
    ///
    /// Leading and trailing slashes are ignored; the empty string is the
    /// root repository.
    pub fn parse(namespace: &str) -> Result<Self, ValidationError> {
        let trimmed = namespace.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        Self::from_segments(&segments)
    }

    /// The joined namespace, empty for the root repository.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the depth-0 repository.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of namespace segments.
    pub fn segment_count(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.split('/').count()
        }
    }

    /// Storage key prefix for objects owned by this repository.
    ///
    /// `""` for the root repository, `"{id}/"` otherwise.
    pub fn storage_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Storage key of `filename` inside this repository.
    pub fn object_key(&self, filename: &str) -> String {
        format!("{}{}", self.storage_prefix(), filename)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RepositoryId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
