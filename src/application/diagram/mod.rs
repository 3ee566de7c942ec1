//! Progressive diagram hydration.
//!
//! The renderer leaves `.mermaid` placeholders carrying the encoded diagram
//! source. A hydration pass walks a live container, renders each placeholder
//! through a [`DiagramRenderer`] and swaps in the result. Passes are
//! cancelled cooperatively through a staleness predicate.

mod container;
mod generation;
mod hydrator;
mod mermaid;
mod types;

use std::{path::PathBuf, sync::Arc};

use once_cell::sync::{Lazy, OnceCell};
use thiserror::Error;
use tracing::warn;

use crate::config::{DEFAULT_MERMAID_CACHE_DIR, DEFAULT_MERMAID_CLI_PATH, DEFAULT_MERMAID_THEME};

pub use container::{DiagramContainer, HtmlContainer, PendingPlaceholder, PlaceholderUpdate};
pub use generation::RenderGeneration;
pub use hydrator::{DiagramHydrator, HydrateOptions, HydrationReport};
pub(crate) use hydrator::{
    METRIC_DIAGRAM_FAILED, METRIC_DIAGRAM_RENDERED, METRIC_HYDRATION_ABANDONED,
    METRIC_HYDRATION_MS,
};
pub use mermaid::MermaidCliRenderer;
pub use types::{DiagramRenderError, DiagramRenderer, RenderedDiagram};

#[derive(Debug, Clone)]
pub struct DiagramPipelineConfig {
    pub mermaid_cli_path: PathBuf,
    pub mermaid_cache_dir: PathBuf,
    pub mermaid_theme: String,
}

impl Default for DiagramPipelineConfig {
    fn default() -> Self {
        Self {
            mermaid_cli_path: PathBuf::from(DEFAULT_MERMAID_CLI_PATH),
            mermaid_cache_dir: PathBuf::from(DEFAULT_MERMAID_CACHE_DIR),
            mermaid_theme: DEFAULT_MERMAID_THEME.to_string(),
        }
    }
}

impl From<&crate::config::RenderSettings> for DiagramPipelineConfig {
    fn from(settings: &crate::config::RenderSettings) -> Self {
        Self {
            mermaid_cli_path: settings.mermaid_cli_path.clone(),
            mermaid_cache_dir: settings.mermaid_cache_dir.clone(),
            mermaid_theme: settings.mermaid_theme.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiagramConfigError {
    #[error("diagram renderer already configured")]
    AlreadyConfigured,
}

static DIAGRAM_PIPELINE_CONFIG: OnceCell<DiagramPipelineConfig> = OnceCell::new();

static DIAGRAM_RENDERER: Lazy<Option<Arc<dyn DiagramRenderer>>> = Lazy::new(|| {
    let config = active_diagram_config();
    match MermaidCliRenderer::new(
        config.mermaid_cli_path.clone(),
        config.mermaid_cache_dir.clone(),
        &config.mermaid_theme,
    ) {
        Ok(renderer) => Some(Arc::new(renderer) as Arc<dyn DiagramRenderer>),
        Err(err) => {
            log_mermaid_init_error(&err, &config);
            None
        }
    }
});

/// Set the configuration used to build the shared renderer. Must run before
/// the first call to [`diagram_renderer`].
pub fn configure_diagram_renderer(config: DiagramPipelineConfig) -> Result<(), DiagramConfigError> {
    DIAGRAM_PIPELINE_CONFIG
        .set(config)
        .map_err(|_| DiagramConfigError::AlreadyConfigured)
}

/// Shared diagram renderer, built on first use. `None` when the Mermaid CLI
/// could not be set up; hydration is then a no-op.
pub fn diagram_renderer() -> Option<Arc<dyn DiagramRenderer>> {
    DIAGRAM_RENDERER.as_ref().map(Arc::clone)
}

fn active_diagram_config() -> DiagramPipelineConfig {
    DIAGRAM_PIPELINE_CONFIG.get().cloned().unwrap_or_default()
}

fn log_mermaid_init_error(error: &DiagramRenderError, config: &DiagramPipelineConfig) {
    warn!(
        target = "application::diagram::mermaid",
        cli_path = %config.mermaid_cli_path.display(),
        cache_dir = %config.mermaid_cache_dir.display(),
        error = %error,
        "Mermaid renderer disabled"
    );
}
