//! Document text source consumed by the preview shell.
//!
//! Dialogs are outside this crate; [`FsDocumentSource`] is a headless
//! implementation whose "pickers" answer with preselected paths.

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Extensions accepted when opening a markdown document.
pub const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("`{path}` is not a markdown document")]
    NotMarkdown { path: PathBuf },
}

/// A document picked and loaded in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedDocument {
    pub path: PathBuf,
    pub content: String,
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Pick a markdown file and read it. `None` when nothing was picked.
    async fn open(&self) -> Result<Option<OpenedDocument>, DocumentError>;

    /// Read a document as text. An empty path reads as empty text.
    async fn read(&self, path: &Path) -> Result<String, DocumentError>;

    /// Write text to a document. An empty path is a no-op.
    async fn write(&self, path: &Path, content: &str) -> Result<(), DocumentError>;

    async fn pick_folder(&self) -> Result<Option<PathBuf>, DocumentError>;

    async fn pick_save_path(&self) -> Result<Option<PathBuf>, DocumentError>;
}

pub fn is_markdown_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Filesystem-backed document source with preselected picker answers.
#[derive(Debug, Clone, Default)]
pub struct FsDocumentSource {
    open_path: Option<PathBuf>,
    folder: Option<PathBuf>,
    save_path: Option<PathBuf>,
}

impl FsDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.open_path = Some(path.into());
        self
    }

    pub fn with_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.folder = Some(path.into());
        self
    }

    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn open(&self) -> Result<Option<OpenedDocument>, DocumentError> {
        let Some(path) = self.open_path.clone() else {
            return Ok(None);
        };
        if !is_markdown_path(&path) {
            return Err(DocumentError::NotMarkdown { path });
        }

        let content = self.read(&path).await?;
        Ok(Some(OpenedDocument { path, content }))
    }

    async fn read(&self, path: &Path) -> Result<String, DocumentError> {
        if path.as_os_str().is_empty() {
            return Ok(String::new());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DocumentError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            target = "application::document",
            op = "document::read",
            path = %path.display(),
            bytes = content.len(),
            "Document read"
        );
        Ok(content)
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), DocumentError> {
        if path.as_os_str().is_empty() {
            return Ok(());
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|source| DocumentError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            target = "application::document",
            op = "document::write",
            path = %path.display(),
            bytes = content.len(),
            "Document written"
        );
        Ok(())
    }

    async fn pick_folder(&self) -> Result<Option<PathBuf>, DocumentError> {
        Ok(self.folder.clone())
    }

    async fn pick_save_path(&self) -> Result<Option<PathBuf>, DocumentError> {
        Ok(self.save_path.clone())
    }
}
