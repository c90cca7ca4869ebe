//! # Index Cache
//!
//! One [`CacheEntry`] per observed repository. Entries are created lazily
//! on first access and live until process exit, or until the optional
//! bound evicts an idle one. Eviction drops only the cached index; the
//! next access rebuilds it from storage.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use cmux_chart::Extractor;
use cmux_core::{sha256_hex, ArtifactKind, IndexEntry, RepositoryId, RepositoryIndex};
use cmux_storage::DynBackend;
use parking_lot::Mutex;

use crate::error::IndexError;

/// Lifecycle phase of a repository's cached index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPhase {
    /// Never accessed (or evicted).
    Unknown,
    /// A rebuild is in flight.
    Building,
    /// The cached index matches the latest invalidation generation.
    Ready,
    /// A mutation, failure or cancellation made the cached index stale.
    Invalidated,
}

impl EntryPhase {
    /// Return the string representation of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Building => "BUILDING",
            Self::Ready => "READY",
            Self::Invalidated => "INVALIDATED",
        }
    }
}

impl std::fmt::Display for EntryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index cache configuration.
#[derive(Debug, Clone, Default)]
pub struct IndexCacheConfig {
    /// Absolute base URL for chart downloads. When unset, index entries use
    /// URLs relative to the repository (`charts/x.tgz`).
    pub chart_url: Option<String>,
    /// Whether uploads may replace an existing chart version.
    pub allow_overwrite: bool,
    /// Upper bound on cached repositories. Unbounded when `None`.
    pub max_repositories: Option<NonZeroUsize>,
}

#[derive(Debug)]
struct EntryState {
    index: Option<Arc<RepositoryIndex>>,
    /// Bumped by every invalidation.
    generation: u64,
    /// Generation `index` was built at.
    built_generation: Option<u64>,
    phase: EntryPhase,
}

impl EntryState {
    fn fresh(&self) -> Option<Arc<RepositoryIndex>> {
        match (&self.index, self.built_generation) {
            (Some(index), Some(built)) if built == self.generation => Some(Arc::clone(index)),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    /// Held across storage I/O; serializes rebuilds of this repository.
    rebuild_lock: tokio::sync::Mutex<()>,
    /// Held from the conflict check through the last storage write of a
    /// mutation.
    write_lock: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<EntryState>,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            rebuild_lock: tokio::sync::Mutex::new(()),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            state: Mutex::new(EntryState {
                index: None,
                generation: 0,
                built_generation: None,
                phase: EntryPhase::Unknown,
            }),
        }
    }
}

/// Reverts a `Building` entry to `Invalidated` if the rebuild future is
/// dropped before it publishes a result.
struct BuildingGuard<'a> {
    entry: &'a CacheEntry,
    armed: bool,
}

impl Drop for BuildingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.entry.state.lock().phase = EntryPhase::Invalidated;
        }
    }
}

/// Exclusive right to mutate one repository's stored artifacts.
///
/// Holds the entry as well as its lock, so the entry cannot be evicted and
/// replaced by one with a fresh lock while a mutation is in flight.
pub(crate) struct WriteGuard {
    _lock: tokio::sync::OwnedMutexGuard<()>,
    _entry: Arc<CacheEntry>,
}

#[derive(Debug)]
struct Slot {
    entry: Arc<CacheEntry>,
    last_used: u64,
}

/// Per-repository cache of derived indexes.
#[derive(Debug)]
pub struct IndexCache {
    pub(crate) backend: DynBackend,
    pub(crate) extractor: Arc<dyn Extractor>,
    pub(crate) config: IndexCacheConfig,
    entries: Mutex<HashMap<RepositoryId, Slot>>,
    clock: AtomicU64,
    rebuilds: AtomicU64,
}

impl IndexCache {
    /// Create an empty cache over `backend`.
    pub fn new(
        backend: DynBackend,
        extractor: Arc<dyn Extractor>,
        config: IndexCacheConfig,
    ) -> Self {
        Self {
            backend,
            extractor,
            config,
            entries: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// The storage backend this cache reads from.
    pub fn backend(&self) -> &DynBackend {
        &self.backend
    }

    /// Cache configuration.
    pub fn config(&self) -> &IndexCacheConfig {
        &self.config
    }

    /// Look up or create the entry for `repo`, evicting an idle entry if the
    /// bound is reached.
    fn entry(&self, repo: &RepositoryId) -> Arc<CacheEntry> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get_mut(repo) {
            slot.last_used = tick;
            return Arc::clone(&slot.entry);
        }

        if let Some(max) = self.config.max_repositories {
            if entries.len() >= max.get() {
                evict_idle(&mut entries);
            }
        }

        let entry = Arc::new(CacheEntry::new());
        entries.insert(
            repo.clone(),
            Slot {
                entry: Arc::clone(&entry),
                last_used: tick,
            },
        );
        entry
    }

    fn existing_entry(&self, repo: &RepositoryId) -> Option<Arc<CacheEntry>> {
        self.entries
            .lock()
            .get(repo)
            .map(|slot| Arc::clone(&slot.entry))
    }

    /// Serialize mutations of `repo`. Readers are not blocked.
    pub(crate) async fn lock_writes(&self, repo: &RepositoryId) -> WriteGuard {
        let entry = self.entry(repo);
        let lock = Arc::clone(&entry.write_lock).lock_owned().await;
        WriteGuard {
            _lock: lock,
            _entry: entry,
        }
    }

    /// Current index of `repo`, rebuilding from storage if it is missing or
    /// stale.
    ///
    /// At most one rebuild per repository runs at a time. Callers arriving
    /// while one is in flight wait for it and return its result.
    pub async fn get(&self, repo: &RepositoryId) -> Result<Arc<RepositoryIndex>, IndexError> {
        let entry = self.entry(repo);

        let cached = entry.state.lock().fresh();
        if let Some(index) = cached {
            tracing::debug!(repo = %repo, generation = index.generation(), "index cache hit");
            return Ok(index);
        }

        let _rebuilding = entry.rebuild_lock.lock().await;

        let target = {
            let mut state = entry.state.lock();
            if let Some(index) = state.fresh() {
                return Ok(index);
            }
            state.phase = EntryPhase::Building;
            state.generation
        };

        let mut guard = BuildingGuard {
            entry: &entry,
            armed: true,
        };
        let result = self.rebuild(repo, target).await;

        let mut state = entry.state.lock();
        guard.armed = false;
        match result {
            Ok(index) => {
                let index = Arc::new(index);
                state.index = Some(Arc::clone(&index));
                state.built_generation = Some(target);
                state.phase = if state.generation == target {
                    EntryPhase::Ready
                } else {
                    EntryPhase::Invalidated
                };
                Ok(index)
            }
            Err(err) => {
                state.phase = EntryPhase::Invalidated;
                tracing::warn!(repo = %repo, error = %err, "index rebuild failed");
                Err(err)
            }
        }
    }

    /// [`get`](Self::get) bounded by `timeout`.
    ///
    /// On expiry the caller gets [`IndexError::RebuildCancelled`]; a rebuild
    /// this caller was running is abandoned and the entry reverts to
    /// `Invalidated`, so the next caller retries.
    pub async fn get_with_deadline(
        &self,
        repo: &RepositoryId,
        timeout: Duration,
    ) -> Result<Arc<RepositoryIndex>, IndexError> {
        tokio::time::timeout(timeout, self.get(repo))
            .await
            .map_err(|_| IndexError::RebuildCancelled {
                repo: repo.clone(),
                waited: timeout,
            })?
    }

    /// Mark the cached index of `repo` stale. Never blocks on a rebuild.
    ///
    /// Repositories that were never accessed have nothing to invalidate.
    pub fn invalidate(&self, repo: &RepositoryId) {
        let Some(entry) = self.existing_entry(repo) else {
            return;
        };
        let mut state = entry.state.lock();
        state.generation += 1;
        if state.phase == EntryPhase::Ready {
            state.phase = EntryPhase::Invalidated;
        }
        tracing::debug!(repo = %repo, generation = state.generation, "index invalidated");
    }

    /// Phase of `repo`'s entry; `Unknown` if it has none.
    pub fn phase(&self, repo: &RepositoryId) -> EntryPhase {
        self.existing_entry(repo)
            .map(|entry| entry.state.lock().phase)
            .unwrap_or(EntryPhase::Unknown)
    }

    /// Repositories that currently have a cache entry, sorted.
    pub fn cached_repositories(&self) -> Vec<RepositoryId> {
        let mut repos: Vec<_> = self.entries.lock().keys().cloned().collect();
        repos.sort();
        repos
    }

    /// Number of rebuilds started since creation.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Download URL written into index entries for `filename`.
    pub(crate) fn download_url(&self, repo: &RepositoryId, filename: &str) -> String {
        match &self.config.chart_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                if repo.is_root() {
                    format!("{base}/charts/{filename}")
                } else {
                    format!("{base}/{}/charts/{filename}", repo.as_str())
                }
            }
            None => format!("charts/{filename}"),
        }
    }

    /// Derive a fresh index for `repo` from storage.
    ///
    /// Archives that vanish or fail extraction are skipped with a warning;
    /// any other storage failure aborts the rebuild.
    async fn rebuild(
        &self,
        repo: &RepositoryId,
        generation: u64,
    ) -> Result<RepositoryIndex, IndexError> {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let objects = self.backend.list_objects(&repo.storage_prefix()).await?;
        let names: HashSet<&str> = objects.iter().map(|o| o.name()).collect();

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for info in &objects {
            let filename = info.name();
            if ArtifactKind::classify(filename) != Some(ArtifactKind::ChartArchive) {
                continue;
            }

            let object = match self.backend.get_object(&info.key).await {
                Ok(object) => object,
                Err(err) if err.is_not_found() => {
                    tracing::warn!(repo = %repo, object = %info.key, "chart archive vanished during rebuild");
                    skipped += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            // Gunzip and untar off the async workers.
            let extractor = Arc::clone(&self.extractor);
            let content = object.content;
            let extracted = tokio::task::spawn_blocking(move || {
                extractor
                    .extract(&content)
                    .map(|metadata| (metadata, sha256_hex(&content)))
                    .map_err(|err| err.to_string())
            })
            .await
            .unwrap_or_else(|join| Err(format!("extraction task failed: {join}")));

            let (metadata, digest) = match extracted {
                Ok(extracted) => extracted,
                Err(err) => {
                    tracing::warn!(
                        repo = %repo,
                        object = %info.key,
                        error = %err,
                        "skipping unreadable chart archive"
                    );
                    skipped += 1;
                    continue;
                }
            };

            let provenance_name = format!("{filename}.prov");
            let provenance = names
                .contains(provenance_name.as_str())
                .then(|| self.download_url(repo, &provenance_name));

            entries.push(IndexEntry {
                metadata,
                urls: vec![self.download_url(repo, filename)],
                created: object.last_modified,
                digest,
                provenance,
            });
        }

        let index = RepositoryIndex::from_entries(entries, generation, Utc::now());
        tracing::info!(
            repo = %repo,
            generation,
            charts = index.entries.len(),
            versions = index.len(),
            skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rebuilt repository index"
        );
        Ok(index)
    }
}

/// Drop the least recently used entry that nobody is holding.
///
/// Entries held by an in-flight `get` are skipped, so a repository never
/// has two live entries. If every entry is busy the map briefly exceeds
/// its bound.
fn evict_idle(entries: &mut HashMap<RepositoryId, Slot>) {
    let victim = entries
        .iter()
        .filter(|(_, slot)| Arc::strong_count(&slot.entry) == 1)
        .min_by_key(|(_, slot)| slot.last_used)
        .map(|(repo, _)| repo.clone());
    if let Some(repo) = victim {
        entries.remove(&repo);
        tracing::debug!(repo = %repo, "evicted idle repository index");
    }
}
