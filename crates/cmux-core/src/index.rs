//! # Repository Index Documents
//!
//! The index is the document package-manager clients fetch first: a map
//! from chart name to every available version of that chart, each with
//! its download URLs and archive digest. It is serialized as YAML in the
//! layout Helm clients expect (`apiVersion`, `entries`, `generated`).
//!
//! Indexes are derived data. They are built from storage by the index
//! cache and replaced wholesale on every rebuild.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::artifact::chart_filename;
use crate::error::ValidationError;
use crate::repository::validate_segment;

/// `apiVersion` written into every index document.
pub const INDEX_API_VERSION: &str = "v1";

/// A chart maintainer as listed in `Chart.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChartMaintainer {
    /// Maintainer name.
    #[serde(default)]
    pub name: String,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Package metadata extracted from a chart's `Chart.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (`v1` or `v2`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Chart name.
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: String,
    /// Chart version (SemVer 2 in well-formed charts).
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version of the packaged application.
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_version: Option<String>,
    /// Compatible Kubernetes versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,
    /// Chart type (`application` or `library`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    /// Project home page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Search keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Source code URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// Maintainers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<ChartMaintainer>,
    /// Whether the chart is deprecated.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accept YAML numbers as strings: `version: 1.0` is common in the wild.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    optional_scalar_string(deserializer).map(Option::unwrap_or_default)
}

fn optional_scalar_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        serde_yaml::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, got {other:?}"
        ))),
    }
}

impl ChartMetadata {
    /// Create metadata with just a name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            api_version: Some("v2".to_string()),
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Check the fields that storage keys are derived from.
    ///
    /// Name and version must be present and usable inside a filename.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.version.trim().is_empty() {
            return Err(ValidationError::MissingField("version"));
        }
        for (field, value) in [("name", &self.name), ("version", &self.version)] {
            if validate_segment(value).is_err() || value.chars().any(char::is_whitespace) {
                return Err(ValidationError::InvalidChartField {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Archive filename for this chart version.
    pub fn archive_filename(&self) -> String {
        chart_filename(&self.name, &self.version)
    }
}

/// One chart version listed in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Metadata copied from `Chart.yaml`.
    #[serde(flatten)]
    pub metadata: ChartMetadata,
    /// Download URLs, relative to the repository unless a chart URL base is configured.
    pub urls: Vec<String>,
    /// Last-modified time of the stored archive.
    pub created: DateTime<Utc>,
    /// SHA-256 hex digest of the archive bytes.
    pub digest: String,
    /// URL of the detached provenance file, when one was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl IndexEntry {
    /// Chart name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Chart version.
    pub fn version(&self) -> &str {
        &self.metadata.version
    }
}

/// Order two chart versions newest first.
///
/// SemVer versions compare by precedence and sort ahead of non-SemVer
/// versions; non-SemVer versions compare as strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| semver::Version::parse(v.trim_start_matches('v')).ok();
    match (parse(a), parse(b)) {
        (Some(va), Some(vb)) => vb.cmp(&va).then_with(|| b.cmp(a)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}

/// The derived index of one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    /// Always [`INDEX_API_VERSION`].
    pub api_version: String,
    /// Chart name → versions, newest first.
    pub entries: BTreeMap<String, Vec<IndexEntry>>,
    /// When this index was built.
    pub generated: DateTime<Utc>,
    /// Cache generation this index was built at. Not serialized.
    #[serde(skip)]
    generation: u64,
}

impl RepositoryIndex {
    /// An index with no charts.
    pub fn empty(generation: u64, generated: DateTime<Utc>) -> Self {
        Self {
            api_version: INDEX_API_VERSION.to_string(),
            entries: BTreeMap::new(),
            generated,
            generation,
        }
    }

    /// Group entries by chart name and sort each group newest first.
    ///
    /// When two entries share a name and version, the most recently
    /// created one is kept.
    pub fn from_entries(
        entries: impl IntoIterator<Item = IndexEntry>,
        generation: u64,
        generated: DateTime<Utc>,
    ) -> Self {
        let mut index = Self::empty(generation, generated);
        for entry in entries {
            index
                .entries
                .entry(entry.name().to_string())
                .or_default()
                .push(entry);
        }
        for versions in index.entries.values_mut() {
            versions.sort_by(|a, b| {
                compare_versions(a.version(), b.version()).then_with(|| b.created.cmp(&a.created))
            });
            versions.dedup_by(|later, earlier| later.version() == earlier.version());
        }
        index
    }

    /// Cache generation this index was built at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All versions of `name`, newest first.
    pub fn versions(&self, name: &str) -> Option<&[IndexEntry]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// A single chart version.
    pub fn find(&self, name: &str, version: &str) -> Option<&IndexEntry> {
        self.versions(name)?.iter().find(|e| e.version() == version)
    }

    /// Whether any entry was built from the archive `filename`.
    pub fn contains_archive(&self, filename: &str) -> bool {
        self.entries
            .values()
            .flatten()
            .any(|e| e.metadata.archive_filename() == filename)
    }

    /// Total number of chart versions.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether the index lists no charts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as the YAML document served at `index.yaml`.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn entry(name: &str, version: &str, created: i64) -> IndexEntry {
        IndexEntry {
            metadata: ChartMetadata::new(name, version),
            urls: vec![format!("charts/{}", chart_filename(name, version))],
            created: ts(created),
            digest: "00".repeat(32),
            provenance: None,
        }
    }

    #[test]
    fn entries_grouped_and_sorted_newest_first() {
        let index = RepositoryIndex::from_entries(
            vec![
                entry("mychart", "0.1.0", 1),
                entry("mychart", "0.10.0", 2),
                entry("mychart", "0.2.0", 3),
                entry("other", "1.0.0", 4),
            ],
            7,
            ts(10),
        );
        let versions: Vec<_> = index
            .versions("mychart")
            .unwrap()
            .iter()
            .map(IndexEntry::version)
            .collect();
        assert_eq!(versions, vec!["0.10.0", "0.2.0", "0.1.0"]);
        assert_eq!(index.len(), 4);
        assert_eq!(index.generation(), 7);
        let names: Vec<_> = index.entries.keys().cloned().collect();
        assert_eq!(names, vec!["mychart", "other"]);
    }

    #[test]
    fn duplicate_versions_keep_newest_object() {
        let index = RepositoryIndex::from_entries(
            vec![entry("a", "1.0.0", 1), entry("a", "1.0.0", 5)],
            0,
            ts(10),
        );
        let versions = index.versions("a").unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].created, ts(5));
    }

    #[test]
    fn non_semver_versions_sort_after_semver() {
        assert_eq!(compare_versions("1.0.0", "latest"), Ordering::Less);
        assert_eq!(compare_versions("latest", "1.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("v2.0.0", "1.9.9"), Ordering::Less);
    }

    #[test]
    fn yaml_uses_helm_field_names() {
        let mut e = entry("mychart", "0.1.0", 1);
        e.metadata.app_version = Some("1.16.0".to_string());
        e.provenance = Some("charts/mychart-0.1.0.tgz.prov".to_string());
        let index = RepositoryIndex::from_entries(vec![e], 0, ts(10));
        let yaml = index.to_yaml().unwrap();
        assert!(yaml.contains("apiVersion: v1"));
        assert!(yaml.contains("appVersion: 1.16.0"));
        assert!(yaml.contains("- charts/mychart-0.1.0.tgz"));
        assert!(yaml.contains("provenance: charts/mychart-0.1.0.tgz.prov"));
        assert!(yaml.contains("generated:"));
        assert!(!yaml.contains("generation"));
    }

    #[test]
    fn index_parses_back_from_yaml() {
        let index = RepositoryIndex::from_entries(vec![entry("a", "1.0.0", 1)], 3, ts(10));
        let yaml = index.to_yaml().unwrap();
        let parsed: RepositoryIndex = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.find("a", "1.0.0").unwrap().digest, "00".repeat(32));
        assert_eq!(parsed.generation(), 0);
    }

    #[test]
    fn numeric_versions_accepted_in_chart_yaml() {
        let meta: ChartMetadata =
            serde_yaml::from_str("name: legacy\nversion: 10\nappVersion: 2\n").unwrap();
        assert_eq!(meta.version, "10");
        assert_eq!(meta.app_version.as_deref(), Some("2"));
    }

    #[test]
    fn validate_rejects_missing_and_path_like_fields() {
        assert_eq!(
            ChartMetadata::new("", "1.0.0").validate(),
            Err(ValidationError::MissingField("name"))
        );
        assert_eq!(
            ChartMetadata::new("a", " ").validate(),
            Err(ValidationError::MissingField("version"))
        );
        assert!(ChartMetadata::new("../etc", "1.0.0").validate().is_err());
        assert!(ChartMetadata::new("a b", "1.0.0").validate().is_err());
        assert!(ChartMetadata::new("mychart", "0.1.0").validate().is_ok());
    }

    #[test]
    fn contains_archive_matches_filename() {
        let index = RepositoryIndex::from_entries(vec![entry("a", "1.0.0", 1)], 0, ts(1));
        assert!(index.contains_archive("a-1.0.0.tgz"));
        assert!(!index.contains_archive("a-2.0.0.tgz"));
    }
}
