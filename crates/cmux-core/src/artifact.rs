//! # Artifact Classification
//!
//! Every filename requested under `{namespace}/charts/` is classified here.
//! A filename either names a chart archive, a detached provenance file, or
//! nothing the server knows how to serve.

use serde::{Deserialize, Serialize};

const CHART_ARCHIVE_SUFFIX: &str = ".tgz";
const PROVENANCE_SUFFIX: &str = ".tgz.prov";

/// The kinds of stored artifacts a repository serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A gzipped tar chart package (`name-version.tgz`).
    ChartArchive,
    /// A detached provenance file (`name-version.tgz.prov`).
    Provenance,
}

impl ArtifactKind {
    /// Classify a filename by its extension.
    ///
    /// Returns `None` for any extension the server does not recognize.
    pub fn classify(filename: &str) -> Option<Self> {
        if has_stem(filename, PROVENANCE_SUFFIX) {
            Some(Self::Provenance)
        } else if has_stem(filename, CHART_ARCHIVE_SUFFIX) {
            Some(Self::ChartArchive)
        } else {
            None
        }
    }

    /// HTTP content type used when serving this artifact.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::ChartArchive => "application/x-tar",
            Self::Provenance => "application/pgp-signature",
        }
    }

    /// Return the string representation of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChartArchive => "chart_archive",
            Self::Provenance => "provenance",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_stem(filename: &str, suffix: &str) -> bool {
    filename.len() > suffix.len() && filename.ends_with(suffix)
}

/// Archive filename for a chart version.
pub fn chart_filename(name: &str, version: &str) -> String {
    format!("{name}-{version}{CHART_ARCHIVE_SUFFIX}")
}

/// Provenance filename for a chart version.
pub fn provenance_filename(name: &str, version: &str) -> String {
    format!("{name}-{version}{PROVENANCE_SUFFIX}")
}

/// Archive filename a provenance file belongs to (`x.tgz.prov` → `x.tgz`).
pub fn archive_for_provenance(filename: &str) -> Option<&str> {
    if has_stem(filename, PROVENANCE_SUFFIX) {
        filename.strip_suffix(".prov")
    } else {
        None
    }
}
