mod blocks;
mod config;
mod highlight;

use std::{sync::Arc, time::Instant};

use comrak::{Arena, parse_document};
use metrics::histogram;
use once_cell::sync::Lazy;
use syntect::{dumps::from_uncompressed_data, html::ClassStyle, parsing::SyntaxSet};
use tracing::{debug, warn};

use crate::application::render::types::{RenderError, RenderOutput, RenderService};

use blocks::{BlockOutcome, write_document};
use config::{build_sanitizer, default_options};

pub(crate) const METRIC_RENDER_MS: &str = "markdownlite_render_ms";

pub(crate) const HIGHLIGHT_CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hljs-" };

/// Stylesheet matching the classes emitted for highlighted code.
pub const HIGHLIGHT_CSS: &str = include_str!(env!("HIGHLIGHT_CSS_FILE"));

pub(crate) fn load_syntax_set() -> SyntaxSet {
    let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
    from_uncompressed_data(syntax_bytes).expect("syntax pack must be valid")
}

/// Comrak-based preview pipeline: line-anchored block emission, Syntect
/// highlighting and Ammonia sanitisation.
pub struct MarkdownRenderService {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
    sanitizer: ammonia::Builder<'static>,
}

impl MarkdownRenderService {
    fn new() -> Self {
        Self {
            options: default_options(),
            syntax_set: load_syntax_set(),
            class_style: HIGHLIGHT_CLASS_STYLE,
            sanitizer: build_sanitizer(),
        }
    }
}

static RENDER_SERVICE: Lazy<Arc<MarkdownRenderService>> =
    Lazy::new(|| Arc::new(MarkdownRenderService::new()));

/// Access the shared render service instance, initialised on first use.
pub fn render_service() -> Arc<MarkdownRenderService> {
    Arc::clone(&RENDER_SERVICE)
}

impl Default for MarkdownRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderService for MarkdownRenderService {
    fn render(&self, markdown: &str) -> Result<RenderOutput, RenderError> {
        if markdown.trim().is_empty() {
            return Ok(RenderOutput::empty());
        }

        let started_at = Instant::now();
        let outcome = self.write_stage(markdown)?;
        let html = sanitize_stage(&outcome.html, &self.sanitizer);

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        histogram!(METRIC_RENDER_MS).record(elapsed_ms as f64);
        debug!(
            target = "application::render",
            op = "render::markdown",
            result = "ok",
            elapsed_ms,
            input_bytes = markdown.len(),
            html_bytes = html.len(),
            diagram_count = outcome.diagram_count,
            "Markdown rendered"
        );

        Ok(RenderOutput {
            html,
            contains_code: outcome.contains_code,
            diagram_count: outcome.diagram_count,
        })
    }
}

impl MarkdownRenderService {
    /// Render markdown into HTML while skipping the sanitisation stage. This is
    /// intended for diagnostics when refining sanitizer rules.
    pub fn render_unsanitized(&self, markdown: &str) -> Result<String, RenderError> {
        if markdown.trim().is_empty() {
            return Ok(String::new());
        }
        Ok(self.write_stage(markdown)?.html)
    }

    fn write_stage(&self, markdown: &str) -> Result<BlockOutcome, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        write_document(root, &self.options, &self.syntax_set, &self.class_style)
    }
}

fn sanitize_stage(html: &str, sanitizer: &ammonia::Builder<'static>) -> String {
    sanitizer.clean(html).to_string()
}

/// Render markdown into sanitised, line-anchored HTML. Never fails: blank input
/// yields an empty string, and an internal formatting error is logged and
/// also yields an empty string.
pub fn render_markdown_to_html(markdown: &str) -> String {
    match render_service().render(markdown) {
        Ok(output) => output.html,
        Err(err) => {
            warn!(
                target = "application::render",
                op = "render::markdown",
                result = "error",
                error = %err,
                "Markdown rendering failed; returning empty preview"
            );
            String::new()
        }
    }
}
