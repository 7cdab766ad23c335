//! Fast-lookup artifact cache using moka
//!
//! Holds recently persisted or read artifacts keyed by [`ArtifactKey`] so
//! repeated reads skip the filesystem. Entries are evicted by capacity and
//! dropped in bulk per subject on invalidation.

use crate::error::{StoreError, StoreResult};
use moka::future::Cache;
use uxray_artifact::{Artifact, ArtifactKey, SubjectId};

/// Default capacity of the fast-lookup cache
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Key-addressed artifact cache
#[derive(Debug, Clone)]
pub struct SummaryCache {
    inner: Cache<ArtifactKey, Artifact>,
}

impl SummaryCache {
    /// Create new cache with max capacity
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Insert artifact under its own key
    #[inline]
    pub async fn insert(&self, artifact: Artifact) {
        self.inner.insert(artifact.key().clone(), artifact).await;
    }

    /// Get artifact from cache
    #[inline]
    pub async fn get(&self, key: &ArtifactKey) -> Option<Artifact> {
        self.inner.get(key).await
    }

    /// Invalidate a single entry
    #[inline]
    pub async fn invalidate(&self, key: &ArtifactKey) {
        self.inner.invalidate(key).await;
    }

    /// Invalidate every entry derived from `subject`
    ///
    /// Applies to entries inserted before this call; later inserts are kept.
    ///
    /// # Errors
    /// Returns [`StoreError::Cache`] if the predicate cannot be registered.
    pub fn invalidate_subject(&self, subject: &SubjectId) -> StoreResult<()> {
        let subject = subject.clone();
        self.inner
            .invalidate_entries_if(move |key, _| key.subject() == &subject)
            .map(|_| ())
            .map_err(|e| StoreError::Cache(e.to_string()))
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for SummaryCache {
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uxray_artifact::{ArtifactKind, TenantId};

    fn artifact(subject: &str, kind: ArtifactKind) -> Artifact {
        let key = ArtifactKey::singleton(
            TenantId::new("7").unwrap(),
            SubjectId::new(subject).unwrap(),
            kind,
        )
        .unwrap();
        Artifact::new(key, json!({"subject": subject}), "/unused")
    }

    #[tokio::test]
    async fn insert_and_get() {
        let cache = SummaryCache::new(100);
        let a = artifact("1", ArtifactKind::UiReport);

        cache.insert(a.clone()).await;
        assert_eq!(cache.get(a.key()).await, Some(a));
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let cache = SummaryCache::default();
        let a = artifact("1", ArtifactKind::UiReport);
        assert!(cache.get(a.key()).await.is_none());
    }

    #[tokio::test]
    async fn single_invalidation() {
        let cache = SummaryCache::new(100);
        let a = artifact("1", ArtifactKind::Formulation);

        cache.insert(a.clone()).await;
        assert!(cache.get(a.key()).await.is_some());

        cache.invalidate(a.key()).await;
        assert!(cache.get(a.key()).await.is_none());
    }

    #[tokio::test]
    async fn subject_invalidation_spares_other_subjects() {
        let cache = SummaryCache::new(100);
        let ui = artifact("1", ArtifactKind::UiReport);
        let uba = artifact("1", ArtifactKind::BehaviorReport);
        let other = artifact("2", ArtifactKind::UiReport);
        for a in [&ui, &uba, &other] {
            cache.insert(a.clone()).await;
        }

        cache.invalidate_subject(ui.key().subject()).unwrap();
        cache.inner.run_pending_tasks().await;

        assert!(cache.get(ui.key()).await.is_none());
        assert!(cache.get(uba.key()).await.is_none());
        assert!(cache.get(other.key()).await.is_some());
    }

    #[tokio::test]
    async fn stats_count_entries() {
        let cache = SummaryCache::new(100);
        for i in 0..5 {
            cache.insert(artifact(&i.to_string(), ArtifactKind::UiReport)).await;
        }
        cache.inner.run_pending_tasks().await;
        assert_eq!(cache.stats().entry_count, 5);
    }
}
