//! # Error Types
//!
//! Validation errors raised when constructing core types from untrusted
//! input (request paths, uploaded metadata).

use thiserror::Error;

/// Input failed validation while constructing a core type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A path segment is empty, `.`, `..`, or contains a separator.
    #[error("invalid path segment: {0:?}")]
    InvalidSegment(String),

    /// The number of namespace segments does not match the configured depth.
    #[error("expected {expected} namespace segments, got {actual}")]
    SegmentCount {
        /// Configured tenancy depth.
        expected: usize,
        /// Number of segments supplied.
        actual: usize,
    },

    /// Chart metadata is missing a required field.
    #[error("chart metadata missing required field: {0}")]
    MissingField(&'static str),

    /// Chart name or version contains characters that cannot appear in a filename.
    #[error("invalid chart {field}: {value:?}")]
    InvalidChartField {
        /// Field name (`name` or `version`).
        field: &'static str,
        /// Offending value.
        value: String,
    },
}
