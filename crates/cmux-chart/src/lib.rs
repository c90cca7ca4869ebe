//! # cmux-chart — Archive Metadata Extraction
//!
//! Turns raw uploaded or stored bytes into [`ChartMetadata`]. Extraction is
//! pure and deterministic: the same bytes always produce the same metadata
//! or the same error, and nothing is read from or written to storage.
//!
//! - [`ChartArchiveExtractor::extract`] reads `<chart>/Chart.yaml` from a
//!   gzipped tar archive.
//! - [`ChartArchiveExtractor::extract_provenance`] reads the chart identity
//!   from the signed YAML block of a `.prov` file.
//!
//! The index cache consumes extraction through the [`Extractor`] trait so
//! tests can substitute their own.

pub mod archive;
pub mod provenance;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::fmt;

use cmux_core::{ChartMetadata, ValidationError};
use thiserror::Error;

pub use archive::ChartArchiveExtractor;

/// Extraction failed; the bytes are not a usable chart artifact.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The gzip or tar layer could not be read.
    #[error("unreadable chart archive: {0}")]
    Archive(#[source] std::io::Error),

    /// No `<chart>/Chart.yaml` entry in the archive.
    #[error("chart archive does not contain Chart.yaml")]
    MissingChartYaml,

    /// `Chart.yaml` exceeds the size limit.
    #[error("Chart.yaml exceeds {limit} bytes")]
    ChartYamlTooLarge {
        /// Limit in bytes.
        limit: u64,
    },

    /// `Chart.yaml` is not valid YAML for chart metadata.
    #[error("invalid Chart.yaml: {0}")]
    InvalidChartYaml(#[source] serde_yaml::Error),

    /// The parsed metadata cannot name a stored artifact.
    #[error("invalid chart metadata: {0}")]
    InvalidMetadata(#[from] ValidationError),

    /// The provenance file has no readable signed metadata block.
    #[error("invalid provenance file: {0}")]
    InvalidProvenance(String),
}

/// Parses artifact bytes into chart metadata.
pub trait Extractor: Send + Sync + fmt::Debug {
    /// Extract metadata from a chart archive.
    fn extract(&self, archive: &[u8]) -> Result<ChartMetadata, ExtractError>;

    /// Extract chart name and version from a provenance file.
    fn extract_provenance(&self, provenance: &[u8]) -> Result<ChartMetadata, ExtractError>;
}
