//! File-backed artifact store
//!
//! Layout: `<root>/<kind>/<tenant>/<subject>/<name>`. Writes go to a hidden
//! temp file in the target directory and are renamed into place, so a
//! reader sees either the old file or the new one.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uxray_artifact::{subject_dir, ArtifactKey, ArtifactKind, SubjectId, TenantId, ARTIFACT_EXTENSION};

const TEMP_SUFFIX: &str = "tmp";

/// A chart spec found by directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedChart {
    /// File stem
    pub slug: String,
    /// Parsed chart configuration
    pub payload: Value,
}

/// Filesystem persistence for artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create store rooted at `root`; directories are created lazily
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path for a key
    #[must_use]
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Read and parse the file for `key`
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// - [`StoreError::Io`] if the file exists but cannot be read
    /// - [`StoreError::Corrupt`] if it does not hold valid JSON
    pub async fn read(&self, key: &ArtifactKey) -> StoreResult<Option<Value>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io_error(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::corrupt(path, e.to_string()))
    }

    /// Persist `bytes` for `key`, overwriting any previous file
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the directory, temp file or rename fails.
    pub async fn write(&self, key: &ArtifactKey, bytes: &[u8]) -> StoreResult<PathBuf> {
        let path = self.path_for(key);
        let dir = path
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io_error(&dir, e))?;

        let temp = dir.join(format!(
            ".{}.{}.{TEMP_SUFFIX}",
            key.file_name(),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| StoreError::io_error(&temp, e))?;

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::io_error(path, e));
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
        Ok(path)
    }

    /// Delete the file for `key`
    ///
    /// Returns whether a file was removed; a missing file is not an error.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the file exists but cannot be removed.
    pub async fn remove(&self, key: &ArtifactKey) -> StoreResult<bool> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed artifact");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    /// List every parsable artifact file under a subject directory, sorted by stem
    ///
    /// A missing directory yields an empty list. Temp files and files that
    /// fail to parse are skipped.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the directory exists but cannot be read.
    pub async fn list(
        &self,
        kind: ArtifactKind,
        tenant: &TenantId,
        subject: &SubjectId,
    ) -> StoreResult<Vec<ListedChart>> {
        let dir = self.root.join(subject_dir(kind, tenant, subject));
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io_error(dir, e)),
        };

        let mut listed = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io_error(&dir, e))?
        {
            let path = entry.path();
            let Some(slug) = listable_stem(&path) else {
                continue;
            };
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                    Ok(payload) => listed.push(ListedChart { slug, payload }),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unparsable artifact");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable artifact");
                }
            }
        }

        listed.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(listed)
    }
}

/// Stem of a visible `*.json` file
fn listable_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    let stem = name.strip_suffix(ARTIFACT_EXTENSION)?.strip_suffix('.')?;
    (!stem.is_empty()).then(|| stem.to_string())
}
