//! Application services: rendering, diagram hydration and document access.

pub mod diagram;
pub mod document;
pub mod error;
pub mod render;
