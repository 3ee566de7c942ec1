use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    application::render::{DIAGRAM_CLASS, DIAGRAM_ERROR_CLASS},
    util::encoding::{decode_uri_component, escape_html, unescape_entities},
};

use super::{
    container::{DiagramContainer, PlaceholderUpdate},
    types::DiagramRenderer,
};

pub(crate) const METRIC_DIAGRAM_RENDERED: &str = "markdownlite_diagram_rendered_total";
pub(crate) const METRIC_DIAGRAM_FAILED: &str = "markdownlite_diagram_failed_total";
pub(crate) const METRIC_HYDRATION_ABANDONED: &str = "markdownlite_hydration_abandoned_total";
pub(crate) const METRIC_HYDRATION_MS: &str = "markdownlite_hydration_ms";

const ERROR_TITLE: &str = "Mermaid rendering error";

/// Per-pass parameters. Both fields are optional.
#[derive(Clone, Copy, Default)]
pub struct HydrateOptions<'a> {
    /// Monotonic id of the render cycle this pass belongs to.
    pub render_id: Option<u64>,
    /// Polled before each placeholder and after each render call; `true`
    /// abandons the pass.
    pub is_stale: Option<&'a (dyn Fn() -> bool + Send + Sync)>,
}

impl<'a> HydrateOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_render_id(mut self, render_id: u64) -> Self {
        self.render_id = Some(render_id);
        self
    }

    pub fn with_staleness(mut self, is_stale: &'a (dyn Fn() -> bool + Send + Sync)) -> Self {
        self.is_stale = Some(is_stale);
        self
    }

    fn stale(&self) -> bool {
        self.is_stale.is_some_and(|is_stale| is_stale())
    }
}

/// Outcome counters for a single pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HydrationReport {
    /// Placeholders in the snapshot taken when the pass started.
    pub discovered: usize,
    pub rendered: usize,
    pub failed: usize,
    /// Placeholders without a source attribute, or no longer present when
    /// their render finished.
    pub skipped: usize,
    /// The pass stopped early because it went stale.
    pub abandoned: bool,
}

/// Swaps diagram placeholders for rendered graphics, one at a time, in
/// document order. A failing diagram only affects its own placeholder.
#[derive(Clone, Default)]
pub struct DiagramHydrator {
    renderer: Option<Arc<dyn DiagramRenderer>>,
}

impl DiagramHydrator {
    pub fn new(renderer: Arc<dyn DiagramRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
        }
    }

    /// Hydrator backed by the process-wide renderer, which may be unavailable.
    pub fn shared() -> Self {
        Self {
            renderer: super::diagram_renderer(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.renderer.is_some()
    }

    pub async fn hydrate(
        &self,
        container: Option<&dyn DiagramContainer>,
        options: HydrateOptions<'_>,
    ) -> HydrationReport {
        let mut report = HydrationReport::default();
        let (Some(container), Some(renderer)) = (container, self.renderer.as_deref()) else {
            return report;
        };

        let started_at = Instant::now();
        let render_id = options.render_id.unwrap_or(0);
        let placeholders = container.pending_placeholders();
        report.discovered = placeholders.len();

        for (index, placeholder) in placeholders.iter().enumerate() {
            if options.stale() {
                report.abandoned = true;
                break;
            }

            let Some(encoded) = placeholder.encoded_source.as_deref().filter(|raw| !raw.is_empty())
            else {
                report.skipped += 1;
                continue;
            };

            let source = diagram_source(encoded);
            let id = format!("mermaid-{}-{index}-{render_id}", unix_millis());
            let outcome = renderer.render(&id, &source).await;

            if options.stale() {
                report.abandoned = true;
                break;
            }

            let update = match outcome {
                Ok(diagram) => PlaceholderUpdate {
                    id: Some(id),
                    class: DIAGRAM_CLASS.to_string(),
                    inner_html: diagram.into_svg(),
                    error: false,
                },
                Err(err) => {
                    warn!(
                        target = "application::diagram::hydrator",
                        op = "hydrate::render",
                        result = "error",
                        index,
                        render_id,
                        error = %err,
                        "Diagram rendering failed"
                    );
                    PlaceholderUpdate {
                        id: None,
                        class: format!("{DIAGRAM_CLASS} {DIAGRAM_ERROR_CLASS}"),
                        inner_html: error_panel(&err.to_string()),
                        error: true,
                    }
                }
            };

            if !container.update_placeholder(encoded, &update) {
                debug!(
                    target = "application::diagram::hydrator",
                    op = "hydrate::relocate",
                    result = "missing",
                    index,
                    render_id,
                    "Placeholder disappeared while rendering"
                );
                report.skipped += 1;
                continue;
            }

            if update.error {
                counter!(METRIC_DIAGRAM_FAILED).increment(1);
                report.failed += 1;
            } else {
                counter!(METRIC_DIAGRAM_RENDERED).increment(1);
                report.rendered += 1;
            }
        }

        if report.abandoned {
            counter!(METRIC_HYDRATION_ABANDONED).increment(1);
        }
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        histogram!(METRIC_HYDRATION_MS).record(elapsed_ms as f64);
        let result = if report.abandoned { "abandoned" } else { "complete" };
        debug!(
            target = "application::diagram::hydrator",
            op = "hydrate::pass",
            result,
            elapsed_ms,
            render_id,
            discovered = report.discovered,
            rendered = report.rendered,
            failed = report.failed,
            skipped = report.skipped,
            "Diagram hydration pass finished"
        );

        report
    }
}

/// Recover the diagram source from its attribute form. A malformed encoding
/// falls back to the raw value.
fn diagram_source(encoded: &str) -> String {
    let decoded = decode_uri_component(encoded).unwrap_or_else(|_| encoded.to_string());
    unescape_entities(decoded.trim())
}

fn error_panel(message: &str) -> String {
    format!(
        "<p class=\"{DIAGRAM_ERROR_CLASS}-title\">{ERROR_TITLE}</p><pre class=\"{DIAGRAM_ERROR_CLASS}-message\">{}</pre>",
        escape_html(message)
    )
}

fn unix_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}
