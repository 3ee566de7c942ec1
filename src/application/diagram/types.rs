use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagramRenderError {
    #[error("failed to prepare cache directory: {0}")]
    CacheInit(io::Error),
    #[error("failed to write temporary file: {0}")]
    Io(io::Error),
    #[error("mermaid CLI invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("mermaid CLI unavailable: {0}")]
    NotFound(io::Error),
    #[error("failed to read rendered SVG: {0}")]
    Read(io::Error),
    #[error("failed to encode diagram configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The diagram source was rejected; the message is shown to the author as-is.
    #[error("{0}")]
    Syntax(String),
}

impl DiagramRenderError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }
}

/// Payload returned by a diagram renderer: either bare markup or an object
/// carrying an `svg` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RenderedDiagram {
    Graphic { svg: String },
    Markup(String),
}

impl RenderedDiagram {
    pub fn svg(svg: impl Into<String>) -> Self {
        Self::Graphic { svg: svg.into() }
    }

    pub fn into_svg(self) -> String {
        match self {
            RenderedDiagram::Graphic { svg } | RenderedDiagram::Markup(svg) => svg,
        }
    }
}

impl From<String> for RenderedDiagram {
    fn from(markup: String) -> Self {
        Self::Markup(markup)
    }
}

/// External diagram-rendering capability consumed by the hydrator.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, id: &str, source: &str) -> Result<RenderedDiagram, DiagramRenderError>;
}
