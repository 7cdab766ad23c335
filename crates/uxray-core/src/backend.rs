//! Generative backend seam
//!
//! The text-generation service is a black box: system instructions plus a
//! user payload in, free text out. Implement [`GenerativeBackend`] to plug
//! in a real client; tests use scripted doubles.

use crate::error::BackendError;
use serde::{Deserialize, Serialize};

/// One element of a user payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadPart {
    /// Plain text
    Text {
        /// Text content
        text: String,
    },
    /// Base64-encoded image
    Image {
        /// MIME type, e.g. `image/png`
        media_type: String,
        /// Base64 data without the `data:` prefix
        data: String,
    },
}

impl PayloadPart {
    /// Text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// PNG image part from base64 data
    pub fn png(data: impl Into<String>) -> Self {
        Self::Image {
            media_type: "image/png".to_string(),
            data: data.into(),
        }
    }

    /// Text content, if this is a text part
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Generative text backend
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Run one completion
    ///
    /// # Errors
    /// Returns [`BackendError`] when the service is unreachable or refuses.
    async fn invoke(&self, system: &str, payload: &[PayloadPart]) -> Result<String, BackendError>;
}

/// Fixed system instructions and prompts
pub mod prompts {
    /// Structure analysis instructions
    pub const STRUCTURE_SYSTEM: &str = "You are an expert website structure analyst. You will receive a screenshot \
(base64 PNG), the HTML structure as JSON, and the CSS structure as JSON. \
Describe only the components and their hierarchy; do not mention styling.";

    /// Structure analysis request
    pub const STRUCTURE_PROMPT: &str =
        "Generate a comprehensive structural report for the provided webpage.";

    /// Styling analysis instructions
    pub const STYLING_SYSTEM: &str = "You are an expert in website design and UI/UX styling. You will receive a \
screenshot (base64 PNG), the HTML structure as JSON, and the CSS structure as JSON. \
Describe the styling and visual identity of the webpage: layout, colors, fonts, spacing \
and alignment. Avoid describing the component hierarchy.";

    /// Styling analysis request
    pub const STYLING_PROMPT: &str =
        "Provide a detailed report on the visual styling and design identity of the webpage.";

    /// Behaviour analytics critique instructions
    pub const BEHAVIOR_SYSTEM: &str = "You are a user behaviour analyst. You will receive raw analytics evidence \
exported from a web page. Start your answer with the line `findings:` and list every \
finding as a numbered item (`1. ...`). Put private reasoning between `##` markers.";

    /// Behaviour analytics request
    pub const BEHAVIOR_PROMPT: &str =
        "Critique the user behaviour captured in this evidence and list your findings.";

    /// Recommendation formulation instructions
    pub const FORMULATOR_SYSTEM: &str = "You are a senior UX consultant. You will receive a JSON evaluation of a web \
page. Turn it into concrete, prioritised recommendations.";

    /// Recommendation formulation request
    pub const FORMULATOR_PROMPT: &str = "Formulate actionable recommendations from this evaluation.";

    /// Chart synthesis instructions
    pub const CHART_SYSTEM: &str = "You turn numbered UX findings into chart configurations. Emit exactly one \
line per finding, in the same order as the findings. Each line starts with `$` followed \
either by a single-line JSON chart configuration object, or by \
`ERROR: finding <n> - <reason>` when finding <n> cannot be charted. Emit nothing else \
on lines starting with `$`.";

    /// Chart synthesis request
    pub const CHART_PROMPT: &str =
        "Create one chart configuration per finding using the raw evidence below.";
}
