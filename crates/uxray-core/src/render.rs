//! Chart rendering gate
//!
//! The renderer is a black box (chart config in, image bytes out). Configs
//! are checked here first so the renderer never sees text that is not a
//! JSON object.

use crate::error::{BackendError, PipelineError, PipelineResult, Stage};
use serde_json::Value;

/// Chart rendering service
#[async_trait::async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Render a chart configuration to image bytes
    ///
    /// # Errors
    /// Returns [`BackendError`] when the service fails.
    async fn render(&self, config: &Value) -> Result<Vec<u8>, BackendError>;
}

/// Validate `config_text` and render it
///
/// # Errors
/// - [`PipelineError::Validation`] if the text is blank, not JSON or not an object
/// - [`PipelineError::UpstreamUnavailable`] if the renderer fails
pub async fn render_chart(renderer: &dyn ChartRenderer, config_text: &str) -> PipelineResult<Vec<u8>> {
    if config_text.trim().is_empty() {
        return Err(PipelineError::validation("missing chart config"));
    }
    let config: Value = serde_json::from_str(config_text)
        .map_err(|e| PipelineError::validation(format!("invalid JSON in chart config: {e}")))?;
    if !config.is_object() {
        return Err(PipelineError::validation("chart config must be a JSON object"));
    }

    renderer
        .render(&config)
        .await
        .map_err(|e| PipelineError::upstream(Stage::Render, e))
}
