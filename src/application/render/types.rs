use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Class carried by every diagram placeholder.
pub const DIAGRAM_CLASS: &str = "mermaid";
/// Class modifier added to placeholders whose diagram failed to render.
pub const DIAGRAM_ERROR_CLASS: &str = "mermaid-error";
/// Attribute holding the percent-encoded diagram source.
pub const DIAGRAM_SOURCE_ATTR: &str = "data-mermaid-code";
/// Marker set once a placeholder has been hydrated, successfully or not.
pub const DIAGRAM_PROCESSED_ATTR: &str = "data-processed";
/// Marker set on placeholders that hold an error panel.
pub const DIAGRAM_ERROR_ATTR: &str = "data-error";
/// Source-line anchor stamped on block-level elements.
pub const LINE_ATTR: &str = "data-line";

/// Deterministic rendering result returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RenderOutput {
    /// Sanitised HTML ready to be inserted into a preview container.
    pub html: String,
    /// Indicates whether the document contains highlighted code blocks.
    pub contains_code: bool,
    /// Number of diagram placeholders emitted. Zero means hydration can be skipped.
    pub diagram_count: u32,
}

impl RenderOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains_diagrams(&self) -> bool {
        self.diagram_count > 0
    }
}

/// Structured errors surfaced by the rendering pipeline. The public string
/// contract swallows these; the typed service surfaces them for diagnostics.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown formatting failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
}

/// Trait exposed by the rendering pipeline. Implementations must be pure and
/// deterministic: given the same input, they return identical outputs or errors.
pub trait RenderService: Send + Sync {
    fn render(&self, markdown: &str) -> Result<RenderOutput, RenderError>;
}
