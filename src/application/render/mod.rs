//! Markdown-to-HTML preview rendering.
//!
//! The rendering pipeline is pure: it accepts markdown input, produces
//! deterministic, sanitised HTML with `data-line` anchors, and swaps diagram
//! fences for placeholders that the diagram hydrator fills in later.

mod service;
mod types;

pub use service::{HIGHLIGHT_CSS, MarkdownRenderService, render_markdown_to_html, render_service};
pub(crate) use service::METRIC_RENDER_MS;
pub use types::{
    DIAGRAM_CLASS, DIAGRAM_ERROR_ATTR, DIAGRAM_ERROR_CLASS, DIAGRAM_PROCESSED_ATTR,
    DIAGRAM_SOURCE_ATTR, LINE_ATTR, RenderError, RenderOutput, RenderService,
};
