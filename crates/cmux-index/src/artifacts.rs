//! # Artifact Operations
//!
//! Reads and writes of stored archives and provenance files for one
//! repository. Every write follows the same order:
//!
//! 1. Parse the uploaded bytes. Unparsable uploads are rejected before
//!    anything reaches storage.
//! 2. Take the repository's write lock, then check for conflicts and
//!    commit to storage. Concurrent uploads of one version cannot both
//!    pass the conflict check.
//! 3. Invalidate the repository's cached index, even if a later step of the
//!    request fails.

use cmux_core::{
    chart_filename, provenance_filename, ArtifactKind, ChartMetadata, RepositoryId,
};
use cmux_storage::Object;

use crate::cache::IndexCache;
use crate::error::IndexError;

impl IndexCache {
    /// Fetch a stored artifact by filename.
    ///
    /// Archives and provenance files are independent lookups: a missing
    /// provenance file is reported on its own, whatever the state of the
    /// archive it belongs to.
    pub async fn fetch_artifact(
        &self,
        repo: &RepositoryId,
        filename: &str,
        kind: ArtifactKind,
    ) -> Result<Object, IndexError> {
        let key = repo.object_key(filename);
        match self.backend.get_object(&key).await {
            Ok(object) => {
                tracing::debug!(repo = %repo, filename, kind = %kind, "serving artifact");
                Ok(object)
            }
            Err(err) if err.is_not_found() => Err(IndexError::ArtifactNotFound(filename.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Store a chart archive and, optionally, its provenance file.
    ///
    /// Returns the archive's metadata. Fails with
    /// [`IndexError::Extraction`] (nothing stored) if the archive cannot be
    /// parsed, and with [`IndexError::VersionConflict`] if the version
    /// exists and overwriting is disabled.
    pub async fn put_chart(
        &self,
        repo: &RepositoryId,
        archive: &[u8],
        provenance: Option<&[u8]>,
    ) -> Result<ChartMetadata, IndexError> {
        let metadata = self.extractor.extract(archive)?;
        if let Some(prov) = provenance {
            let signed = self.extractor.extract_provenance(prov)?;
            if signed.name != metadata.name || signed.version != metadata.version {
                return Err(IndexError::ProvenanceMismatch {
                    archive: format!("{}-{}", metadata.name, metadata.version),
                    provenance: format!("{}-{}", signed.name, signed.version),
                });
            }
        }

        let filename = metadata.archive_filename();
        let _writing = self.lock_writes(repo).await;
        self.ensure_writable(repo, &filename, &metadata).await?;
        self.backend
            .put_object(&repo.object_key(&filename), archive)
            .await?;

        // The archive is committed; whatever happens next, the index is stale.
        let provenance_result = match provenance {
            Some(prov) => {
                let prov_key = repo.object_key(&provenance_filename(&metadata.name, &metadata.version));
                self.backend.put_object(&prov_key, prov).await
            }
            None => Ok(()),
        };
        self.invalidate(repo);
        provenance_result?;

        tracing::info!(
            repo = %repo,
            chart = %metadata.name,
            version = %metadata.version,
            with_provenance = provenance.is_some(),
            "stored chart"
        );
        Ok(metadata)
    }

    /// Store a provenance file on its own, named after the chart it signs.
    pub async fn put_provenance(
        &self,
        repo: &RepositoryId,
        provenance: &[u8],
    ) -> Result<ChartMetadata, IndexError> {
        let metadata = self.extractor.extract_provenance(provenance)?;
        let filename = provenance_filename(&metadata.name, &metadata.version);
        let _writing = self.lock_writes(repo).await;
        self.ensure_writable(repo, &filename, &metadata).await?;
        self.backend
            .put_object(&repo.object_key(&filename), provenance)
            .await?;
        self.invalidate(repo);

        tracing::info!(
            repo = %repo,
            chart = %metadata.name,
            version = %metadata.version,
            "stored provenance file"
        );
        Ok(metadata)
    }

    /// Delete a chart version's archive and, best-effort, its provenance file.
    pub async fn delete_chart(
        &self,
        repo: &RepositoryId,
        name: &str,
        version: &str,
    ) -> Result<(), IndexError> {
        ChartMetadata::new(name, version).validate()?;

        let filename = chart_filename(name, version);
        let _writing = self.lock_writes(repo).await;
        match self.backend.delete_object(&repo.object_key(&filename)).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Err(IndexError::ArtifactNotFound(filename)),
            Err(err) => return Err(err.into()),
        }

        let prov_key = repo.object_key(&provenance_filename(name, version));
        let provenance_result = self.backend.delete_object(&prov_key).await;
        self.invalidate(repo);
        match provenance_result {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                tracing::warn!(repo = %repo, object = %prov_key, error = %err, "failed to delete provenance file");
            }
        }

        tracing::info!(repo = %repo, chart = name, version, "deleted chart");
        Ok(())
    }

    /// Reject the write if `filename` exists and overwriting is disabled.
    async fn ensure_writable(
        &self,
        repo: &RepositoryId,
        filename: &str,
        metadata: &ChartMetadata,
    ) -> Result<(), IndexError> {
        if self.config.allow_overwrite {
            return Ok(());
        }
        match self.backend.get_object(&repo.object_key(filename)).await {
            Ok(_) => Err(IndexError::VersionConflict {
                name: metadata.name.clone(),
                version: metadata.version.clone(),
            }),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cmux_chart::testing::{package_chart, provenance_for};
    use cmux_chart::ChartArchiveExtractor;
    use cmux_storage::{Backend, MemoryBackend};

    use super::*;
    use crate::cache::IndexCacheConfig;

    fn setup(allow_overwrite: bool) -> (Arc<MemoryBackend>, IndexCache) {
        let backend = Arc::new(MemoryBackend::new());
        let cache = IndexCache::new(
            Arc::clone(&backend) as _,
            Arc::new(ChartArchiveExtractor::new()),
            IndexCacheConfig {
                allow_overwrite,
                ..IndexCacheConfig::default()
            },
        );
        (backend, cache)
    }

    fn org1() -> RepositoryId {
        RepositoryId::parse("org1").unwrap()
    }

    #[tokio::test]
    async fn upload_appears_in_next_index() {
        let (_, cache) = setup(false);
        let repo = org1();
        assert!(cache.get(&repo).await.unwrap().is_empty());

        let archive = package_chart(&ChartMetadata::new("mychart", "0.1.0"));
        cache.put_chart(&repo, &archive, None).await.unwrap();

        let index = cache.get(&repo).await.unwrap();
        assert!(index.find("mychart", "0.1.0").is_some());
        let stored = cache
            .fetch_artifact(&repo, "mychart-0.1.0.tgz", ArtifactKind::ChartArchive)
            .await
            .unwrap();
        assert_eq!(stored.content, archive);
    }

    #[tokio::test]
    async fn garbage_upload_stores_nothing() {
        let (backend, cache) = setup(false);
        let err = cache
            .put_chart(&org1(), b"not a chart", None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Extraction(_)), "got {err:?}");
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn duplicate_upload_conflicts_unless_overwrite_allowed() {
        let archive = package_chart(&ChartMetadata::new("mychart", "0.1.0"));

        let (_, strict) = setup(false);
        strict.put_chart(&org1(), &archive, None).await.unwrap();
        let err = strict.put_chart(&org1(), &archive, None).await.unwrap_err();
        assert!(matches!(err, IndexError::VersionConflict { .. }), "got {err:?}");

        let (_, lenient) = setup(true);
        lenient.put_chart(&org1(), &archive, None).await.unwrap();
        lenient.put_chart(&org1(), &archive, None).await.unwrap();
    }

    #[tokio::test]
    async fn upload_with_provenance_stores_both() {
        let (backend, cache) = setup(false);
        let meta = ChartMetadata::new("mychart", "0.1.0");
        let archive = package_chart(&meta);
        let prov = provenance_for(&meta, &archive);

        cache.put_chart(&org1(), &archive, Some(&prov)).await.unwrap();
        assert_eq!(
            backend.get_object("org1/mychart-0.1.0.tgz.prov").await.unwrap().content,
            prov
        );
        let index = cache.get(&org1()).await.unwrap();
        assert!(index.find("mychart", "0.1.0").unwrap().provenance.is_some());
    }

    #[tokio::test]
    async fn mismatched_provenance_rejected_before_storing() {
        let (backend, cache) = setup(false);
        let archive = package_chart(&ChartMetadata::new("mychart", "0.1.0"));
        let prov = provenance_for(&ChartMetadata::new("mychart", "0.2.0"), &archive);

        let err = cache
            .put_chart(&org1(), &archive, Some(&prov))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ProvenanceMismatch { .. }), "got {err:?}");
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn standalone_provenance_upload() {
        let (backend, cache) = setup(false);
        let meta = ChartMetadata::new("mychart", "0.1.0");
        let prov = provenance_for(&meta, b"archive");
        let stored = cache.put_provenance(&org1(), &prov).await.unwrap();
        assert_eq!(stored.name, "mychart");
        assert!(backend.get_object("org1/mychart-0.1.0.tgz.prov").await.is_ok());

        let err = cache.put_provenance(&org1(), &prov).await.unwrap_err();
        assert!(matches!(err, IndexError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn delete_removes_archive_and_provenance() {
        let (backend, cache) = setup(false);
        let meta = ChartMetadata::new("mychart", "0.1.0");
        let archive = package_chart(&meta);
        let prov = provenance_for(&meta, &archive);
        cache.put_chart(&org1(), &archive, Some(&prov)).await.unwrap();
        assert_eq!(cache.get(&org1()).await.unwrap().len(), 1);

        cache.delete_chart(&org1(), "mychart", "0.1.0").await.unwrap();
        assert!(backend.is_empty());
        assert!(cache.get(&org1()).await.unwrap().is_empty());
        let err = cache
            .fetch_artifact(&org1(), "mychart-0.1.0.tgz", ArtifactKind::ChartArchive)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ArtifactNotFound(_)));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_, cache) = setup(false);
        let err = cache
            .delete_chart(&org1(), "mychart", "9.9.9")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ArtifactNotFound(_)));
    }

    #[tokio::test]
    async fn delete_rejects_path_like_names() {
        let (_, cache) = setup(false);
        let err = cache.delete_chart(&org1(), "..", "1.0.0").await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn uploads_are_isolated_per_namespace() {
        let (_, cache) = setup(false);
        let archive = package_chart(&ChartMetadata::new("mychart", "0.1.0"));
        let team1 = RepositoryId::parse("org1/team1").unwrap();
        cache.put_chart(&team1, &archive, None).await.unwrap();

        assert!(cache.get(&org1()).await.unwrap().is_empty());
        assert!(cache.get(&RepositoryId::root()).await.unwrap().is_empty());
        assert_eq!(cache.get(&team1).await.unwrap().len(), 1);
    }
}
