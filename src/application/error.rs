use thiserror::Error;

use crate::{
    application::{document::DocumentError, render::RenderError},
    config::LoadError,
    infra::error::InfraError,
};

/// Top-level error for hosts driving the preview pipeline end to end.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code a command-line host should report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 2,
            AppError::Document(_) => 3,
            AppError::Infra(_) | AppError::Render(_) | AppError::Unexpected(_) => 1,
        }
    }
}
