//! UX-Ray Artifact Store
//!
//! Persistence for derived artifacts: a file-backed [`ArtifactStore`], a
//! concurrent fast-lookup [`SummaryCache`] and the [`ArtifactCacheManager`]
//! that ties them together as the single writer.
//!
//! # Guarantees
//!
//! - One compute per key while the artifact stays valid
//! - Whole-file writes (temp file + rename)
//! - Corrupt or unreadable files behave like missing ones
//! - After `invalidate(subject)` no pre-invalidation value is served
//!
//! # Example
//!
//! ```rust,ignore
//! use uxray_store::ArtifactCacheManager;
//!
//! let manager = ArtifactCacheManager::new("/var/lib/uxray/records", 10_000);
//! let report = manager
//!     .get_or_compute(key, || async { analyse_page().await })
//!     .await?;
//! ```

#![warn(unreachable_pub)]

mod cache;
mod error;
mod manager;
mod store;

pub use cache::{CacheStats, SummaryCache, DEFAULT_CAPACITY};
pub use error::{StoreError, StoreResult};
pub use manager::ArtifactCacheManager;
pub use store::{ArtifactStore, ListedChart};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use uxray_artifact::{ArtifactKey, SubjectId, TenantId};

    #[tokio::test]
    async fn charts_persist_and_list_in_slug_order() {
        let dir = TempDir::new().unwrap();
        let manager = ArtifactCacheManager::new(dir.path(), DEFAULT_CAPACITY);
        let tenant = TenantId::new("3").unwrap();
        let subject = SubjectId::new("upload-1").unwrap();

        for slug in ["slow-page-load", "drop-off-at-checkout"] {
            let key = ArtifactKey::chart_spec(tenant.clone(), subject.clone(), slug).unwrap();
            manager.put(key, json!({"title": slug})).await.unwrap();
        }

        let slugs: Vec<String> = manager
            .list_chart_specs(&tenant, &subject)
            .await
            .unwrap()
            .into_iter()
            .map(|chart| chart.slug)
            .collect();
        assert_eq!(slugs, vec!["drop-off-at-checkout", "slow-page-load"]);
    }
}
