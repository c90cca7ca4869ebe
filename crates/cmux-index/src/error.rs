//! # Index Errors
//!
//! Everything the cache and the artifact operations can fail with. The API
//! crate maps each variant to an HTTP status.

use std::time::Duration;

use cmux_chart::ExtractError;
use cmux_core::{RepositoryId, ValidationError};
use cmux_storage::StorageError;
use thiserror::Error;

/// Errors from index reads, rebuilds and artifact mutations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Storage I/O failed. Nothing partial is cached.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An uploaded artifact could not be parsed. Nothing was stored.
    #[error("chart could not be read: {0}")]
    Extraction(#[from] ExtractError),

    /// The chart version is already stored and overwriting is disabled.
    #[error("{name}-{version} already exists")]
    VersionConflict {
        /// Chart name.
        name: String,
        /// Chart version.
        version: String,
    },

    /// No stored artifact with this filename.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// The uploaded provenance file names a different chart version.
    #[error("provenance file is for {provenance}, archive is {archive}")]
    ProvenanceMismatch {
        /// `name-version` of the archive.
        archive: String,
        /// `name-version` named by the provenance file.
        provenance: String,
    },

    /// A chart name or version in the request is not usable as a key.
    #[error("invalid chart reference: {0}")]
    InvalidReference(#[from] ValidationError),

    /// The caller's deadline expired before the index was available.
    #[error("index for {repo} not available after {waited:?}")]
    RebuildCancelled {
        /// Repository being read.
        repo: RepositoryId,
        /// How long the caller waited.
        waited: Duration,
    },
}
