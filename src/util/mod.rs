//! Small, dependency-light helpers shared across layers.

pub mod encoding;
pub(crate) mod lock;
