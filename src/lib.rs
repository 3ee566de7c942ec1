//! Markdown preview core.
//!
//! [`render_markdown_to_html`] turns markdown into sanitised HTML whose block
//! elements carry `data-line` source anchors and whose `mermaid` fences are
//! left as placeholders. [`DiagramHydrator`] later walks a live container and
//! swaps those placeholders for rendered diagrams.

pub mod application;
pub mod config;
pub mod infra;
pub mod util;

pub use application::diagram::{
    DiagramContainer, DiagramHydrator, DiagramRenderError, DiagramRenderer, HtmlContainer,
    HydrateOptions, HydrationReport, RenderGeneration, RenderedDiagram,
};
pub use application::render::{
    RenderError, RenderOutput, RenderService, render_markdown_to_html, render_service,
};
