//! CLI command implementations.

mod options;
pub(crate) mod render;
pub(crate) mod toc;

pub(crate) use render::RenderArgs;
pub(crate) use toc::TocArgs;
