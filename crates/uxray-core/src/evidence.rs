//! Evidence inputs and their lifecycle
//!
//! - [`RawEvidence`]: tabular analytics text behind behaviour reports and charts
//! - [`PageSnapshot`]: HTML, CSS and screenshot of an onboarded page, each
//!   gathered best-effort and tagged with [`SubStep`]
//! - [`EvidenceTracker`]: turns evidence changes into artifact invalidation

use crate::backend::PayloadPart;
use crate::error::{EvidenceError, PipelineResult};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use uxray_artifact::SubjectId;
use uxray_store::ArtifactCacheManager;

/// Format of raw evidence text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceFormat {
    /// Comma-separated values
    Csv,
    /// JSON document
    Json,
    /// Anything else, passed through as text
    Text,
}

impl EvidenceFormat {
    /// Infer format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Self::Csv,
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl Display for EvidenceFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw analytics evidence, held fully in memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvidence {
    format: EvidenceFormat,
    text: String,
}

impl RawEvidence {
    /// Wrap evidence text
    #[must_use]
    pub fn new(format: EvidenceFormat, text: impl Into<String>) -> Self {
        Self {
            format,
            text: text.into(),
        }
    }

    /// CSV evidence
    #[must_use]
    pub fn csv(text: impl Into<String>) -> Self {
        Self::new(EvidenceFormat::Csv, text)
    }

    /// Read a whole evidence file
    ///
    /// # Errors
    /// - [`EvidenceError::TooLarge`] if the file exceeds `max_bytes`
    /// - [`EvidenceError::NotText`] if it is not UTF-8
    /// - [`EvidenceError::InvalidJson`] if a `.json` file does not parse
    /// - [`EvidenceError::Io`] on read failure
    pub async fn load(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, EvidenceError> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| EvidenceError::io_error(path, e))?
            .len();
        if size > max_bytes {
            return Err(EvidenceError::TooLarge {
                path: path.to_path_buf(),
                size,
                max: max_bytes,
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EvidenceError::io_error(path, e))?;
        let text = String::from_utf8(bytes).map_err(|_| EvidenceError::NotText(path.to_path_buf()))?;

        let format = EvidenceFormat::from_path(path);
        if format == EvidenceFormat::Json {
            serde_json::from_str::<Value>(&text).map_err(|e| EvidenceError::InvalidJson {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        tracing::debug!(path = %path.display(), %format, bytes = size, "loaded evidence");
        Ok(Self { format, text })
    }

    /// Evidence format
    #[inline]
    #[must_use]
    pub fn format(&self) -> EvidenceFormat {
        self.format
    }

    /// Evidence text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Payload part embedding this evidence
    #[must_use]
    pub fn to_payload_part(&self) -> PayloadPart {
        PayloadPart::text(format!("Raw evidence ({}):\n{}", self.format, self.text))
    }
}

/// Outcome of a best-effort enrichment step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum SubStep<T> {
    /// Step produced a value
    Success(T),
    /// Step was skipped or failed; carries the reason
    Skipped(String),
}

impl<T> SubStep<T> {
    /// Tag a fallible step
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Skipped(e.to_string()),
        }
    }

    /// Value, if the step succeeded
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Skipped(_) => None,
        }
    }

    /// Whether the step succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Scraped page evidence for UI reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// HTML outline as JSON
    pub html: SubStep<Value>,
    /// CSS rules as JSON
    pub css: SubStep<Value>,
    /// Base64 PNG screenshot
    pub screenshot: SubStep<String>,
}

impl PageSnapshot {
    /// Assemble from tagged steps
    #[must_use]
    pub fn from_steps(html: SubStep<Value>, css: SubStep<Value>, screenshot: SubStep<String>) -> Self {
        Self {
            html,
            css,
            screenshot,
        }
    }

    /// Load each part best-effort; failures become [`SubStep::Skipped`]
    pub async fn load(html: impl AsRef<Path>, css: impl AsRef<Path>, screenshot: impl AsRef<Path>) -> Self {
        Self::from_steps(
            load_json(html.as_ref()).await,
            load_json(css.as_ref()).await,
            SubStep::from_result(
                tokio::fs::read(screenshot.as_ref())
                    .await
                    .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
            ),
        )
    }

    /// Whether no step produced anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.html.is_success() && !self.css.is_success() && !self.screenshot.is_success()
    }

    /// User payload for an analysis prompt; skipped steps become notes
    #[must_use]
    pub fn payload(&self, prompt: &str) -> Vec<PayloadPart> {
        let mut parts = vec![PayloadPart::text(prompt)];
        match &self.screenshot {
            SubStep::Success(data) => parts.push(PayloadPart::png(data.clone())),
            SubStep::Skipped(reason) => {
                parts.push(PayloadPart::text(format!("Screenshot unavailable: {reason}")));
            }
        }
        for (label, step) in [("HTML", &self.html), ("CSS", &self.css)] {
            parts.push(match step {
                SubStep::Success(value) => PayloadPart::text(value.to_string()),
                SubStep::Skipped(reason) => PayloadPart::text(format!("{label} unavailable: {reason}")),
            });
        }
        parts
    }
}

async fn load_json(path: &Path) -> SubStep<Value> {
    match tokio::fs::read(path).await {
        Ok(bytes) => SubStep::from_result(serde_json::from_slice(&bytes)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "snapshot step skipped");
            SubStep::Skipped(e.to_string())
        }
    }
}

/// Change to a subject's evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "subject", rename_all = "snake_case")]
pub enum EvidenceEvent {
    /// Evidence uploaded
    Created(SubjectId),
    /// Evidence replaced
    Updated(SubjectId),
    /// Evidence removed
    Deleted(SubjectId),
}

impl EvidenceEvent {
    /// Subject the event concerns
    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        match self {
            Self::Created(s) | Self::Updated(s) | Self::Deleted(s) => s,
        }
    }
}

/// Invalidates derived artifacts when evidence changes
#[derive(Debug, Clone)]
pub struct EvidenceTracker {
    manager: Arc<ArtifactCacheManager>,
}

impl EvidenceTracker {
    /// Create tracker over a manager
    #[must_use]
    pub fn new(manager: Arc<ArtifactCacheManager>) -> Self {
        Self { manager }
    }

    /// Record an evidence change
    ///
    /// # Errors
    /// Returns [`crate::PipelineError::Persistence`] if invalidation fails.
    pub fn record(&self, event: &EvidenceEvent) -> PipelineResult<()> {
        tracing::info!(subject = %event.subject(), ?event, "evidence changed");
        self.manager.invalidate(event.subject())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn format_from_extension() {
        assert_eq!(EvidenceFormat::from_path(Path::new("a/b.CSV")), EvidenceFormat::Csv);
        assert_eq!(EvidenceFormat::from_path(Path::new("events.json")), EvidenceFormat::Json);
        assert_eq!(EvidenceFormat::from_path(Path::new("notes")), EvidenceFormat::Text);
    }

    #[tokio::test]
    async fn load_reads_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.csv");
        std::fs::write(&path, "step,users\ncart,120\ncheckout,40\n").unwrap();

        let evidence = RawEvidence::load(&path, 1024).await.unwrap();
        assert_eq!(evidence.format(), EvidenceFormat::Csv);
        assert!(evidence.text().contains("checkout,40"));
    }

    #[tokio::test]
    async fn load_rejects_oversize_and_bad_json() {
        let dir = TempDir::new().unwrap();
        let big = dir.path().join("big.csv");
        std::fs::write(&big, "x".repeat(64)).unwrap();
        assert!(matches!(
            RawEvidence::load(&big, 10).await,
            Err(EvidenceError::TooLarge { size: 64, max: 10, .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{oops").unwrap();
        assert!(matches!(
            RawEvidence::load(&bad, 1024).await,
            Err(EvidenceError::InvalidJson { .. })
        ));

        assert!(matches!(
            RawEvidence::load(dir.path().join("missing.csv"), 1024).await,
            Err(EvidenceError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn snapshot_keeps_skip_reasons() {
        let dir = TempDir::new().unwrap();
        let html = dir.path().join("html.json");
        std::fs::write(&html, r#"{"tag":"body"}"#).unwrap();
        std::fs::write(dir.path().join("shot.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let snapshot =
            PageSnapshot::load(&html, dir.path().join("missing.json"), dir.path().join("shot.png")).await;

        assert_eq!(snapshot.html, SubStep::Success(json!({"tag": "body"})));
        assert!(matches!(snapshot.css, SubStep::Skipped(_)));
        assert_eq!(snapshot.screenshot.value().map(String::as_str), Some("iVBORw=="));
        assert!(!snapshot.is_empty());

        let parts = snapshot.payload("describe");
        assert_eq!(parts.len(), 4);
        assert!(matches!(parts[1], PayloadPart::Image { .. }));
        assert!(parts[3].as_text().unwrap().starts_with("CSS unavailable:"));
    }

    #[test]
    fn all_skipped_snapshot_is_empty() {
        let snapshot = PageSnapshot::from_steps(
            SubStep::Skipped("timeout".into()),
            SubStep::Skipped("timeout".into()),
            SubStep::Skipped("browser crashed".into()),
        );
        assert!(snapshot.is_empty());
    }

    #[test]
    fn sub_step_serializes_with_status_tag() {
        let json = serde_json::to_value(SubStep::<Value>::Skipped("no css".into())).unwrap();
        assert_eq!(json, json!({"status": "skipped", "value": "no css"}));
    }

    #[tokio::test]
    async fn tracker_invalidates_subject() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(ArtifactCacheManager::new(dir.path(), 16));
        let tracker = EvidenceTracker::new(Arc::clone(&manager));
        let subject = SubjectId::new("upload-3").unwrap();

        tracker.record(&EvidenceEvent::Updated(subject.clone())).unwrap();
        assert!(manager.is_stale(&subject, uxray_artifact::ArtifactKind::BehaviorReport));
    }
}
