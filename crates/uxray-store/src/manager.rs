//! Artifact Cache Manager
//!
//! The single writer for derived artifacts. Every key moves through
//!
//! ```text
//! Absent ──get_or_compute──▶ Computing ──persist──▶ Persisted
//!    ▲                            │                     │
//!    └──────── compute error ─────┘      invalidate / corrupt read
//!                                                       ▼
//!                                                   Computing
//! ```
//!
//! Reads try the fast-lookup cache, then the file on disk. Invalidation
//! drops cached entries for a subject and marks the subject stale, so the
//! superseded file is not served until a fresh artifact replaces it.
//!
//! Each invalidation also bumps a per-subject generation. A compute that
//! started before the bump still persists and returns its result, but does
//! not clear the stale mark or populate the cache; the next caller
//! recomputes from the new evidence.

use crate::cache::SummaryCache;
use crate::error::{StoreError, StoreResult};
use crate::store::{ArtifactStore, ListedChart};
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uxray_artifact::{Artifact, ArtifactKey, ArtifactKind, SubjectId, TenantId};

/// Lazily computed, persisted and reused artifacts
#[derive(Debug)]
pub struct ArtifactCacheManager {
    store: ArtifactStore,
    cache: SummaryCache,
    locks: DashMap<ArtifactKey, Arc<Mutex<()>>>,
    stale: DashSet<(SubjectId, ArtifactKind)>,
    generations: DashMap<SubjectId, u64>,
}

impl ArtifactCacheManager {
    /// Create manager over a store root with the given fast-lookup capacity
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, cache_capacity: u64) -> Self {
        Self::with_parts(ArtifactStore::new(root), SummaryCache::new(cache_capacity))
    }

    /// Create manager from explicit parts
    #[must_use]
    pub fn with_parts(store: ArtifactStore, cache: SummaryCache) -> Self {
        Self {
            store,
            cache,
            locks: DashMap::new(),
            stale: DashSet::new(),
            generations: DashMap::new(),
        }
    }

    /// Underlying file store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Whether artifacts of `kind` for `subject` await recomputation
    #[must_use]
    pub fn is_stale(&self, subject: &SubjectId, kind: ArtifactKind) -> bool {
        self.stale.contains(&(subject.clone(), kind))
    }

    fn generation(&self, subject: &SubjectId) -> u64 {
        self.generations.get(subject).map_or(0, |g| *g)
    }

    /// Look up a persisted artifact
    ///
    /// Unreadable or corrupt files are logged and treated as absent.
    pub async fn get(&self, key: &ArtifactKey) -> Option<Artifact> {
        if self.is_stale(key.subject(), key.kind()) {
            tracing::debug!(%key, "subject is stale, ignoring stored artifact");
            return None;
        }

        if let Some(hit) = self.cache.get(key).await {
            tracing::debug!(%key, "fast-lookup hit");
            return Some(hit);
        }

        match self.store.read(key).await {
            Ok(Some(payload)) => {
                let artifact = Artifact::new(key.clone(), payload, self.store.path_for(key));
                self.cache.insert(artifact.clone()).await;
                tracing::debug!(%key, "loaded artifact from disk");
                Some(artifact)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "treating unreadable artifact as absent");
                None
            }
        }
    }

    /// Return the artifact for `key`, computing and persisting it on a miss
    ///
    /// Concurrent callers for the same key wait on a per-key lock; only the
    /// first runs `compute`. A failed compute leaves nothing behind.
    ///
    /// # Errors
    /// Propagates the compute error, or a [`StoreError`] from persisting.
    pub async fn get_or_compute<F, Fut, E>(&self, key: ArtifactKey, compute: F) -> Result<Artifact, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: From<StoreError>,
    {
        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let lock = self.locks.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            let generation = self.generation(key.subject());
            if let Some(hit) = self.get(&key).await {
                Ok(hit)
            } else {
                tracing::info!(
                    tenant = %key.tenant(),
                    subject = %key.subject(),
                    kind = %key.kind(),
                    "computing artifact"
                );
                match compute().await {
                    Ok(payload) => self
                        .persist(key.clone(), payload, Some(generation))
                        .await
                        .map_err(E::from),
                    Err(e) => {
                        tracing::error!(%key, "artifact compute failed");
                        Err(e)
                    }
                }
            }
        };

        drop(lock);
        self.locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    /// Persist `payload` under `key` unconditionally
    ///
    /// # Errors
    /// Returns [`StoreError`] if the file cannot be written.
    pub async fn put(&self, key: ArtifactKey, payload: Value) -> StoreResult<Artifact> {
        self.persist(key, payload, None).await
    }

    /// Write the artifact; publish it only if `started_at` is still the
    /// subject's generation (`None` always publishes)
    async fn persist(
        &self,
        key: ArtifactKey,
        payload: Value,
        started_at: Option<u64>,
    ) -> StoreResult<Artifact> {
        let path = self.store.path_for(&key);
        let artifact = Artifact::new(key, payload, path);
        self.store.write(artifact.key(), &artifact.to_bytes()).await?;

        let subject = artifact.key().subject();
        let current = {
            // Held across the check and the stale-mark removal so a
            // concurrent `invalidate` lands either before or after both.
            let generation = self.generations.entry(subject.clone()).or_default();
            let current = started_at.map_or(true, |started| started == *generation);
            if current {
                self.stale.remove(&(subject.clone(), artifact.kind()));
            }
            current
        };

        if !current {
            tracing::warn!(
                key = %artifact.key(),
                "subject invalidated during compute, result not published"
            );
            return Ok(artifact);
        }
        self.cache.insert(artifact.clone()).await;

        tracing::info!(
            tenant = %artifact.key().tenant(),
            subject = %subject,
            kind = %artifact.kind(),
            hash = %artifact.hash().short(),
            "persisted artifact"
        );
        Ok(artifact)
    }

    /// Drop every cached artifact of `subject` and mark it stale
    ///
    /// Files on disk are left in place; the next compute overwrites them.
    ///
    /// # Errors
    /// Returns [`StoreError::Cache`] if the cache refuses the invalidation.
    pub fn invalidate(&self, subject: &SubjectId) -> StoreResult<()> {
        let generation = {
            let mut generation = self.generations.entry(subject.clone()).or_default();
            *generation += 1;
            for kind in ArtifactKind::ALL {
                self.stale.insert((subject.clone(), kind));
            }
            *generation
        };
        self.cache.invalidate_subject(subject)?;
        tracing::info!(
            %subject,
            generation,
            cached = self.cache.stats().entry_count,
            "invalidated artifacts"
        );
        Ok(())
    }

    /// List chart specs persisted for a subject, sorted by slug
    ///
    /// A stale subject lists as empty.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the chart directory cannot be read.
    pub async fn list_chart_specs(
        &self,
        tenant: &TenantId,
        subject: &SubjectId,
    ) -> StoreResult<Vec<ListedChart>> {
        if self.is_stale(subject, ArtifactKind::ChartSpec) {
            return Ok(Vec::new());
        }
        self.store.list(ArtifactKind::ChartSpec, tenant, subject).await
    }

    /// Delete chart specs of a subject whose slug is not in `keep`
    ///
    /// Returns the number of files removed.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the directory cannot be listed or a file
    /// cannot be removed.
    pub async fn retain_chart_specs(
        &self,
        tenant: &TenantId,
        subject: &SubjectId,
        keep: &[String],
    ) -> StoreResult<usize> {
        let listed = self.store.list(ArtifactKind::ChartSpec, tenant, subject).await?;
        let mut removed = 0;
        for chart in listed.into_iter().filter(|c| !keep.contains(&c.slug)) {
            let key = ArtifactKey::chart_spec(tenant.clone(), subject.clone(), chart.slug)?;
            self.cache.invalidate(&key).await;
            if self.store.remove(&key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(%tenant, %subject, removed, "removed superseded chart specs");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    fn manager(dir: &TempDir) -> ArtifactCacheManager {
        ArtifactCacheManager::new(dir.path(), 100)
    }

    fn ui_key(subject: &str) -> ArtifactKey {
        ArtifactKey::singleton(
            TenantId::new("17").unwrap(),
            SubjectId::new(subject).unwrap(),
            ArtifactKind::UiReport,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn second_call_reuses_persisted_artifact() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StoreError>(json!({"structure_report": "ok"}))
        };

        let first = manager.get_or_compute(ui_key("1"), compute).await.unwrap();
        let second = manager.get_or_compute(ui_key("1"), compute).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.to_bytes(), second.to_bytes());
        assert!(first.path().exists());
    }

    #[tokio::test]
    async fn restart_serves_from_disk() {
        let dir = TempDir::new().unwrap();
        manager(&dir)
            .get_or_compute(ui_key("1"), || async { Ok::<_, StoreError>(json!({"v": 1})) })
            .await
            .unwrap();

        let fresh = manager(&dir);
        let hit = fresh
            .get_or_compute(ui_key("1"), || async {
                Err::<Value, _>(StoreError::Cache("must not compute".into()))
            })
            .await
            .unwrap();
        assert_eq!(hit.payload(), &json!({"v": 1}));
    }

    #[tokio::test]
    async fn compute_error_leaves_key_absent() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let err = manager
            .get_or_compute(ui_key("1"), || async {
                Err::<Value, _>(StoreError::Cache("upstream down".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Cache(_)));
        assert!(manager.get(&ui_key("1")).await.is_none());
        assert!(!manager.store().path_for(&ui_key("1")).exists());
    }

    #[tokio::test]
    async fn invalidation_forces_recompute() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let subject = SubjectId::new("1").unwrap();

        manager
            .get_or_compute(ui_key("1"), || async { Ok::<_, StoreError>(json!({"v": 1})) })
            .await
            .unwrap();
        manager.invalidate(&subject).unwrap();

        assert!(manager.get(&ui_key("1")).await.is_none());
        assert!(manager.is_stale(&subject, ArtifactKind::UiReport));

        let recomputed = manager
            .get_or_compute(ui_key("1"), || async { Ok::<_, StoreError>(json!({"v": 2})) })
            .await
            .unwrap();
        assert_eq!(recomputed.payload(), &json!({"v": 2}));
        assert!(!manager.is_stale(&subject, ArtifactKind::UiReport));
        assert_eq!(manager.get(&ui_key("1")).await.unwrap().payload(), &json!({"v": 2}));
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_subject() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.put(ui_key("1"), json!({"v": 1})).await.unwrap();
        manager.put(ui_key("2"), json!({"v": 2})).await.unwrap();

        manager.invalidate(&SubjectId::new("1").unwrap()).unwrap();

        assert!(manager.get(&ui_key("1")).await.is_none());
        assert!(manager.get(&ui_key("2")).await.is_some());
    }

    #[tokio::test]
    async fn corrupt_file_is_recomputed() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let key = ui_key("1");
        manager.store().write(&key, b"{truncated").await.unwrap();

        let artifact = manager
            .get_or_compute(key, || async { Ok::<_, StoreError>(json!({"v": 3})) })
            .await
            .unwrap();
        assert_eq!(artifact.payload(), &json!({"v": 3}));
    }

    #[tokio::test]
    async fn concurrent_callers_compute_once() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(manager(&dir));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    manager
                        .get_or_compute(ui_key("1"), || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            Ok::<_, StoreError>(json!({"v": 1}))
                        })
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chart_listing_hides_stale_subject() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let tenant = TenantId::new("17").unwrap();
        let subject = SubjectId::new("upload-9").unwrap();
        let key = ArtifactKey::chart_spec(tenant.clone(), subject.clone(), "slow-page").unwrap();

        manager.put(key, json!({"type": "bar"})).await.unwrap();
        assert_eq!(manager.list_chart_specs(&tenant, &subject).await.unwrap().len(), 1);

        manager.invalidate(&subject).unwrap();
        assert!(manager.list_chart_specs(&tenant, &subject).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalidation_during_compute_is_not_lost() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(manager(&dir));
        let subject = SubjectId::new("1").unwrap();
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let task = {
            let manager = Arc::clone(&manager);
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                manager
                    .get_or_compute(ui_key("1"), move || async move {
                        started.notify_one();
                        release.notified().await;
                        Ok::<_, StoreError>(json!({"v": "old evidence"}))
                    })
                    .await
            })
        };

        started.notified().await;
        manager.invalidate(&subject).unwrap();
        release.notify_one();

        let returned = task.await.unwrap().unwrap();
        assert_eq!(returned.payload(), &json!({"v": "old evidence"}));
        assert!(manager.is_stale(&subject, ArtifactKind::UiReport));
        assert!(manager.get(&ui_key("1")).await.is_none());

        let fresh = manager
            .get_or_compute(ui_key("1"), || async { Ok::<_, StoreError>(json!({"v": "new"})) })
            .await
            .unwrap();
        assert_eq!(fresh.payload(), &json!({"v": "new"}));
        assert!(!manager.is_stale(&subject, ArtifactKind::UiReport));
        assert_eq!(manager.get(&ui_key("1")).await.unwrap().payload(), &json!({"v": "new"}));
    }

    #[tokio::test]
    async fn retain_drops_superseded_charts() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let tenant = TenantId::new("17").unwrap();
        let subject = SubjectId::new("upload-9").unwrap();
        for slug in ["a-old", "b-kept"] {
            let key = ArtifactKey::chart_spec(tenant.clone(), subject.clone(), slug).unwrap();
            manager.put(key, json!({"slug": slug})).await.unwrap();
        }

        let removed = manager
            .retain_chart_specs(&tenant, &subject, &["b-kept".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let slugs: Vec<_> = manager
            .list_chart_specs(&tenant, &subject)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.slug)
            .collect();
        assert_eq!(slugs, vec!["b-kept".to_string()]);
        let old = ArtifactKey::chart_spec(tenant, subject, "a-old").unwrap();
        assert!(manager.get(&old).await.is_none());
    }
}
