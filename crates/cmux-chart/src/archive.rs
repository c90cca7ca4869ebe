//! # Chart Archive Reader
//!
//! A chart package is a gzipped tar whose top-level directory is the chart
//! name. The metadata lives at `<chart>/Chart.yaml`; nested charts under
//! `<chart>/charts/` carry their own `Chart.yaml` and are ignored.

use std::io::Read;
use std::path::Component;

use cmux_core::ChartMetadata;
use flate2::read::GzDecoder;

use crate::{provenance, ExtractError, Extractor};

/// Upper bound on the size of `Chart.yaml`.
pub const MAX_CHART_YAML_BYTES: u64 = 1024 * 1024;

/// Extractor for gzipped tar chart packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartArchiveExtractor;

impl ChartArchiveExtractor {
    /// Create an extractor.
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ChartArchiveExtractor {
    fn extract(&self, archive: &[u8]) -> Result<ChartMetadata, ExtractError> {
        let mut tar = tar::Archive::new(GzDecoder::new(archive));
        let entries = tar.entries().map_err(ExtractError::Archive)?;

        for entry in entries {
            let entry = entry.map_err(ExtractError::Archive)?;
            let is_chart_yaml = {
                let path = entry.path().map_err(ExtractError::Archive)?;
                let parts: Vec<Component<'_>> = path
                    .components()
                    .filter(|c| !matches!(c, Component::CurDir))
                    .collect();
                parts.len() == 2
                    && matches!(parts[0], Component::Normal(_))
                    && parts[1].as_os_str() == "Chart.yaml"
            };
            if !is_chart_yaml {
                continue;
            }

            if entry.header().size().map_err(ExtractError::Archive)? > MAX_CHART_YAML_BYTES {
                return Err(ExtractError::ChartYamlTooLarge {
                    limit: MAX_CHART_YAML_BYTES,
                });
            }
            let mut raw = String::new();
            entry
                .take(MAX_CHART_YAML_BYTES)
                .read_to_string(&mut raw)
                .map_err(ExtractError::Archive)?;
            let metadata: ChartMetadata =
                serde_yaml::from_str(&raw).map_err(ExtractError::InvalidChartYaml)?;
            metadata.validate()?;
            return Ok(metadata);
        }

        Err(ExtractError::MissingChartYaml)
    }

    fn extract_provenance(&self, provenance: &[u8]) -> Result<ChartMetadata, ExtractError> {
        provenance::parse(provenance)
    }
}
